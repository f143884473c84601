//! Model-swap distances between clustered elements.
//!
//! Two elements behave alike at runtime if each one's fitted models describe
//! the other one's data about as well as its own. For fittings `a` and `b`:
//!
//! ```text
//! dev(a, b) = max(0, (err(b's model on a's data) - err(a's model on a's data)) / err(a's model on a's data))
//! ```
//!
//! and the distance between elements `i` and `j` is
//!
//! ```text
//! d(i, j) = Σ_category Σ_attribute min(dev(a, b), dev(b, a))
//! ```
//!
//! summed with Neumaier compensation. Taking the `min` of both directions
//! makes the matrix symmetric before any clustering sees it.

use crate::error::{Error, Result};
use crate::fitting::FittingService;
use crate::schedule::FittingTable;
use ndarray::Array2;
use rayon::prelude::*;

/// Floor for a fitting's own error when it is not positive.
pub const MIN_QUALITY: f64 = 1e-10;

/// Compensated (Neumaier) running sum.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StableSum {
    sum: f64,
    compensation: f64,
}

impl StableSum {
    /// Empty sum.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a term.
    #[inline]
    pub fn add(&mut self, x: f64) {
        let t = self.sum + x;
        if self.sum.abs() >= x.abs() {
            self.compensation += (self.sum - t) + x;
        } else {
            self.compensation += (x - t) + self.sum;
        }
        self.sum = t;
    }

    /// Current value.
    #[inline]
    pub fn value(&self) -> f64 {
        self.sum + self.compensation
    }
}

impl FromIterator<f64> for StableSum {
    fn from_iter<I: IntoIterator<Item = f64>>(iter: I) -> Self {
        let mut s = Self::new();
        for x in iter {
            s.add(x);
        }
        s
    }
}

/// How much worse `b`'s model explains `a`'s data than `a`'s own model,
/// relative to `a`'s own error. Never negative.
pub fn asymmetric_deviation<S: FittingService>(
    service: &S,
    a: &S::Fitting,
    b: &S::Fitting,
) -> f64 {
    let dist = service.evaluate(b, a);
    if dist == 0.0 {
        return 0.0;
    }
    let mut orig = service.quality(a);
    if orig <= 0.0 {
        orig = MIN_QUALITY;
    }
    let rem = dist - orig;
    if rem <= 0.0 {
        return 0.0;
    }
    (rem / orig).max(0.0)
}

/// Square matrix of pairwise behavior distances.
#[derive(Debug, Clone, PartialEq)]
pub struct DistanceMatrix {
    inner: Array2<f64>,
}

impl DistanceMatrix {
    /// Wrap a square matrix.
    pub fn new(inner: Array2<f64>) -> Result<Self> {
        if inner.nrows() != inner.ncols() {
            return Err(Error::DimensionMismatch {
                expected: inner.nrows(),
                found: inner.ncols(),
            });
        }
        Ok(Self { inner })
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.inner.nrows()
    }

    /// True for a 0×0 matrix.
    pub fn is_empty(&self) -> bool {
        self.inner.nrows() == 0
    }

    /// Distance between `i` and `j`.
    #[inline]
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.inner[[i, j]]
    }

    /// Upper triangle, row-major, length n·(n−1)/2.
    pub fn condensed(&self) -> Vec<f64> {
        let n = self.len();
        let mut out = Vec::with_capacity(n * n.saturating_sub(1) / 2);
        for i in 0..n {
            for j in (i + 1)..n {
                out.push(self.inner[[i, j]]);
            }
        }
        out
    }

    /// Borrow the matrix.
    pub fn as_array(&self) -> &Array2<f64> {
        &self.inner
    }

    /// Take the matrix.
    pub fn into_inner(self) -> Array2<f64> {
        self.inner
    }
}

/// Turns a completed fitting table into a [`DistanceMatrix`].
#[derive(Debug)]
pub struct DistanceBuilder<'a, S> {
    service: &'a S,
}

impl<'a, S: FittingService> DistanceBuilder<'a, S> {
    /// Builder scoring fittings with `service`.
    pub fn new(service: &'a S) -> Self {
        Self { service }
    }

    /// Consume the table. Row `i` is dropped as soon as its distances to all
    /// later rows are filled; earlier rows already released.
    pub fn build(&self, mut table: FittingTable<S::Fitting>) -> Result<DistanceMatrix> {
        let (n, runs, attributes) = table.shape();
        let mut matrix = Array2::<f64>::zeros((n, n));

        for i in 0..n {
            let row_i = table.take_row(i).ok_or_else(|| {
                Error::Consistency(format!("fitting row {i} released before use"))
            })?;
            if row_i.len() != runs || row_i.iter().any(|slot| slot.len() != attributes) {
                return Err(Error::Consistency(format!(
                    "fitting row {i} does not have shape {runs}×{attributes}"
                )));
            }

            let later: Vec<(usize, f64)> = ((i + 1)..n)
                .into_par_iter()
                .map(|j| {
                    let row_j = table.row(j).ok_or_else(|| {
                        Error::Consistency(format!("fitting row {j} released before use"))
                    })?;
                    Ok((j, self.pair_distance(&row_i, row_j)?))
                })
                .collect::<Result<_>>()?;

            for (j, d) in later {
                matrix[[i, j]] = d;
                matrix[[j, i]] = d;
            }
            drop(row_i);
        }

        DistanceMatrix::new(matrix)
    }

    fn pair_distance(&self, a: &[Vec<S::Fitting>], b: &[Vec<S::Fitting>]) -> Result<f64> {
        if a.len() != b.len() {
            return Err(Error::Consistency(format!(
                "rows have {} and {} run slots",
                a.len(),
                b.len()
            )));
        }
        let mut sum = StableSum::new();
        for (slot_a, slot_b) in a.iter().zip(b) {
            if slot_a.len() != slot_b.len() {
                return Err(Error::Consistency(format!(
                    "run slots have {} and {} attributes",
                    slot_a.len(),
                    slot_b.len()
                )));
            }
            for (fa, fb) in slot_a.iter().zip(slot_b) {
                let ab = asymmetric_deviation(self.service, fa, fb);
                let ba = asymmetric_deviation(self.service, fb, fa);
                sum.add(ab.min(ba));
            }
        }
        Ok(sum.value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::DimensionRelationship;
    use crate::data::InstanceRuns;
    use parking_lot::Mutex;
    use proptest::prelude::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Fittings are numbers: own error is `q`, a foreign `p` scores `q + |p - q|`.
    struct Scalar;

    impl FittingService for Scalar {
        type Fitting = f64;

        fn fit(&self, _: &InstanceRuns, _: &DimensionRelationship) -> Result<f64> {
            Err(Error::Model("not used".into()))
        }

        fn evaluate(&self, foreign: &f64, own: &f64) -> f64 {
            own + (foreign - own).abs()
        }

        fn quality(&self, fitting: &f64) -> f64 {
            *fitting
        }
    }

    /// Own error is always zero; foreign error is the gap.
    struct Perfect;

    impl FittingService for Perfect {
        type Fitting = f64;

        fn fit(&self, _: &InstanceRuns, _: &DimensionRelationship) -> Result<f64> {
            Err(Error::Model("not used".into()))
        }

        fn evaluate(&self, foreign: &f64, own: &f64) -> f64 {
            (foreign - own).abs()
        }

        fn quality(&self, _: &f64) -> f64 {
            0.0
        }
    }

    fn table(rows: Vec<Vec<Vec<f64>>>) -> FittingTable<f64> {
        let runs = rows.first().map_or(0, Vec::len);
        let attrs = rows
            .first()
            .and_then(|r| r.first())
            .map_or(0, Vec::len);
        FittingTable::from_rows(rows, runs, attrs).unwrap()
    }

    #[test]
    fn test_deviation_reflexive_zero() {
        for q in [0.0, 1e-300, 0.5, 3.0, 1e9] {
            assert_eq!(asymmetric_deviation(&Scalar, &q, &q), 0.0);
            assert_eq!(asymmetric_deviation(&Perfect, &q, &q), 0.0);
        }
    }

    #[test]
    fn test_deviation_relative_to_own_error() {
        // 2 on own data: 2 + 2 = 4 → (4 - 2) / 2.
        assert!((asymmetric_deviation(&Scalar, &2.0, &4.0) - 1.0).abs() < 1e-12);
        // Asymmetric: 4 on own data scores 6 → (6 - 4) / 4.
        assert!((asymmetric_deviation(&Scalar, &4.0, &2.0) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_zero_own_error_is_clamped() {
        let d = asymmetric_deviation(&Perfect, &1.0, &2.0);
        assert!(d.is_finite());
        assert!((d - (1.0 - MIN_QUALITY) / MIN_QUALITY).abs() / d < 1e-12);
    }

    #[test]
    fn test_stable_sum_beats_naive() {
        let terms = [1.0, 1e100, 1.0, -1e100];
        let naive: f64 = terms.iter().sum();
        let stable: StableSum = terms.iter().copied().collect();
        assert_eq!(naive, 0.0);
        assert_eq!(stable.value(), 2.0);
    }

    #[test]
    fn test_matrix_uses_min_and_sums() -> Result<()> {
        // Two run slots, one attribute each.
        let t = table(vec![vec![vec![2.0], vec![1.0]], vec![vec![4.0], vec![1.0]]]);
        let m = DistanceBuilder::new(&Scalar).build(t)?;
        assert_eq!(m.len(), 2);
        assert_eq!(m.get(0, 0), 0.0);
        assert!((m.get(0, 1) - 0.5).abs() < 1e-12);
        assert_eq!(m.get(0, 1), m.get(1, 0));
        assert_eq!(m.condensed(), vec![m.get(0, 1)]);
        Ok(())
    }

    #[test]
    fn test_empty_table() -> Result<()> {
        let m = DistanceBuilder::new(&Scalar).build(table(vec![]))?;
        assert!(m.is_empty());
        Ok(())
    }

    #[test]
    fn test_non_square_rejected() {
        assert!(DistanceMatrix::new(Array2::zeros((2, 3))).is_err());
    }

    /// Fitting that knows its row and counts how many are alive.
    struct Tracked {
        row: usize,
        live: Arc<AtomicUsize>,
    }

    impl Tracked {
        fn new(row: usize, live: &Arc<AtomicUsize>) -> Self {
            live.fetch_add(1, Ordering::SeqCst);
            Self {
                row,
                live: Arc::clone(live),
            }
        }
    }

    impl Drop for Tracked {
        fn drop(&mut self) {
            self.live.fetch_sub(1, Ordering::SeqCst);
        }
    }

    /// Records `(lower row, upper row, live fittings)` at every evaluation.
    struct LiveCounter {
        live: Arc<AtomicUsize>,
        seen: Mutex<Vec<(usize, usize, usize)>>,
    }

    impl FittingService for LiveCounter {
        type Fitting = Tracked;

        fn fit(&self, _: &InstanceRuns, _: &DimensionRelationship) -> Result<Tracked> {
            Err(Error::Model("not used".into()))
        }

        fn evaluate(&self, foreign: &Tracked, own: &Tracked) -> f64 {
            let (lo, hi) = (foreign.row.min(own.row), foreign.row.max(own.row));
            self.seen
                .lock()
                .push((lo, hi, self.live.load(Ordering::SeqCst)));
            1.0 + hi as f64
        }

        fn quality(&self, _: &Tracked) -> f64 {
            1.0
        }
    }

    #[test]
    fn test_rows_released_once_paired() -> Result<()> {
        let n = 5;
        let live = Arc::new(AtomicUsize::new(0));
        let rows: Vec<Vec<Vec<Tracked>>> = (0..n)
            .map(|r| vec![vec![Tracked::new(r, &live)]])
            .collect();
        let table = FittingTable::from_rows(rows, 1, 1)?;
        assert_eq!(live.load(Ordering::SeqCst), n);

        let counter = LiveCounter {
            live: Arc::clone(&live),
            seen: Mutex::new(Vec::new()),
        };
        let m = DistanceBuilder::new(&counter).build(table)?;

        let seen = counter.seen.lock();
        assert_eq!(seen.len(), 2 * n * (n - 1) / 2);
        // Pairing row i with later rows: rows before i are gone.
        for &(lo, _, alive) in seen.iter() {
            assert_eq!(alive, n - lo, "row {lo} paired with {alive} fittings alive");
        }
        assert!(seen.iter().any(|&(lo, hi, alive)| (lo, hi, alive) == (n - 2, n - 1, 2)));
        assert_eq!(live.load(Ordering::SeqCst), 0);
        assert_eq!(m.len(), n);
        Ok(())
    }

    proptest! {
        #[test]
        fn distance_matrix_is_symmetric_nonnegative_zero_diagonal(
            values in proptest::collection::vec(0.0f64..100.0, 3 * 2 * 2..=3 * 2 * 2 * 5),
        ) {
            let n = values.len() / 4;
            let rows: Vec<Vec<Vec<f64>>> = values
                .chunks(4)
                .take(n)
                .map(|c| vec![vec![c[0], c[1]], vec![c[2], c[3]]])
                .collect();
            let m = DistanceBuilder::new(&Scalar).build(table(rows)).unwrap();
            prop_assert_eq!(m.len(), n);
            for i in 0..n {
                prop_assert_eq!(m.get(i, i), 0.0);
                for j in 0..n {
                    prop_assert!(m.get(i, j) >= 0.0);
                    prop_assert_eq!(m.get(i, j), m.get(j, i));
                }
            }
        }
    }
}
