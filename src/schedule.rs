//! Parallel fitting of every (element, run slot, attribute) triple.
//!
//! # Task Tree
//!
//! ```text
//! schedule
//! ├── element 0 ──┬── run slot 0 ──┬── attribute 0   (leaf: service.fit)
//! │               │                └── attribute 1
//! │               └── run slot 1 ── ...
//! └── element 1 ── ...
//! ```
//!
//! Each level is an indexed rayon parallel iterator, so results are stored at
//! their submission position whatever order tasks finish in. Each level is
//! joined with the same [`JoinMode`]:
//!
//! - **CollectAll**: wait for every child and report every failure.
//! - **FailFast**: stop handing out work at the first failure. Tasks already
//!   running are not interrupted, and the join still blocks until they have
//!   finished; their results are discarded. In-flight leaves therefore delay
//!   the error by at most one leaf's duration per worker.

use crate::attribute::DimensionRelationship;
use crate::error::{Error, FitFailure, FitFailures, Result};
use crate::fitting::FittingService;
use crate::mode::{ElementRuns, RunIndex};
use rayon::prelude::*;

/// How a parent task waits for its children.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JoinMode {
    /// Wait for every child; aggregate all failures.
    #[default]
    CollectAll,
    /// Start no new work after the first observed failure. Returns once the
    /// leaves already running have finished.
    FailFast,
}

impl JoinMode {
    fn join<T, P>(self, tasks: P) -> std::result::Result<Vec<T>, Vec<FitFailure>>
    where
        T: Send,
        P: IndexedParallelIterator<Item = std::result::Result<T, Vec<FitFailure>>>,
    {
        match self {
            JoinMode::FailFast => tasks.collect(),
            JoinMode::CollectAll => {
                let results: Vec<_> = tasks.collect();
                let mut done = Vec::with_capacity(results.len());
                let mut failures = Vec::new();
                for result in results {
                    match result {
                        Ok(value) => done.push(value),
                        Err(mut f) => failures.append(&mut f),
                    }
                }
                if failures.is_empty() {
                    Ok(done)
                } else {
                    Err(failures)
                }
            }
        }
    }
}

type Row<F> = Vec<Vec<F>>;

/// `table[element][run slot][attribute]`, write-once, released row by row.
#[derive(Debug)]
pub struct FittingTable<F> {
    rows: Vec<Option<Row<F>>>,
    runs: usize,
    attributes: usize,
}

impl<F> FittingTable<F> {
    /// Assemble from complete rows. Every row must have `runs` slots of
    /// `attributes` fittings.
    pub fn from_rows(rows: Vec<Row<F>>, runs: usize, attributes: usize) -> Result<Self> {
        for row in &rows {
            if row.len() != runs {
                return Err(Error::DimensionMismatch {
                    expected: runs,
                    found: row.len(),
                });
            }
            if let Some(slot) = row.iter().find(|s| s.len() != attributes) {
                return Err(Error::DimensionMismatch {
                    expected: attributes,
                    found: slot.len(),
                });
            }
        }
        Ok(Self {
            rows: rows.into_iter().map(Some).collect(),
            runs,
            attributes,
        })
    }

    /// `(elements, runs per element, attributes)`.
    pub fn shape(&self) -> (usize, usize, usize) {
        (self.rows.len(), self.runs, self.attributes)
    }

    /// Fitting at a position, `None` if out of range or released.
    pub fn get(&self, element: usize, run: usize, attribute: usize) -> Option<&F> {
        self.rows
            .get(element)?
            .as_ref()?
            .get(run)?
            .get(attribute)
    }

    /// Borrow a whole row, `None` once released.
    pub fn row(&self, element: usize) -> Option<&Row<F>> {
        self.rows.get(element)?.as_ref()
    }

    /// Remove a row from the table, handing it to the caller to drop.
    pub fn take_row(&mut self, element: usize) -> Option<Row<F>> {
        self.rows.get_mut(element)?.take()
    }

    /// Whether a row has been released.
    pub fn is_released(&self, element: usize) -> bool {
        matches!(self.rows.get(element), Some(None))
    }
}

/// Runs the three-level fitting task tree.
#[derive(Debug)]
pub struct FittingScheduler<'a, S> {
    service: &'a S,
    join: JoinMode,
}

impl<'a, S: FittingService> FittingScheduler<'a, S> {
    /// Scheduler over `service`, collecting all failures.
    pub fn new(service: &'a S) -> Self {
        Self {
            service,
            join: JoinMode::CollectAll,
        }
    }

    /// Set the join discipline.
    pub fn with_join(mut self, join: JoinMode) -> Self {
        self.join = join;
        self
    }

    /// Fit every attribute on every run slot of every element.
    ///
    /// Runs on the current rayon pool; call inside `ThreadPool::install` to
    /// use a dedicated one.
    pub fn schedule(
        &self,
        index: &RunIndex,
        attributes: &[DimensionRelationship],
    ) -> Result<FittingTable<S::Fitting>> {
        let categories = index.categories();
        let rows = self
            .join
            .join(
                index
                    .elements()
                    .par_iter()
                    .map(|element| self.fit_element(element, categories, attributes)),
            )
            .map_err(|f| Error::Fitting(FitFailures(f)))?;

        FittingTable::from_rows(rows, categories.len(), attributes.len())
    }

    fn fit_element(
        &self,
        element: &ElementRuns,
        categories: &[String],
        attributes: &[DimensionRelationship],
    ) -> std::result::Result<Row<S::Fitting>, Vec<FitFailure>> {
        self.join.join(
            element
                .runs()
                .par_iter()
                .zip(categories.par_iter())
                .map(|(runs, category)| {
                    self.join.join(attributes.par_iter().map(|attribute| {
                        self.service.fit(runs, attribute).map_err(|e| {
                            vec![FitFailure {
                                element: element.name().to_owned(),
                                category: category.clone(),
                                attribute: attribute.label(),
                                source: Box::new(e),
                            }]
                        })
                    }))
                }),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute;
    use crate::data::{Dimension, Experiment, ExperimentSet, Instance, InstanceRuns, Run};
    use crate::mode::ClusteringMode;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Records which (instance, attribute) it fitted; fails on chosen instances.
    struct Recorder {
        fail_on: Vec<&'static str>,
        calls: AtomicUsize,
    }

    impl FittingService for Recorder {
        type Fitting = (String, usize);

        fn fit(&self, runs: &InstanceRuns, a: &DimensionRelationship) -> Result<Self::Fitting> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            if self.fail_on.contains(&runs.instance()) {
                return Err(Error::Model(format!("refused {}", runs.instance())));
            }
            Ok((runs.instance().to_owned(), a.dependent))
        }

        fn evaluate(&self, _: &Self::Fitting, _: &Self::Fitting) -> f64 {
            0.0
        }

        fn quality(&self, _: &Self::Fitting) -> f64 {
            0.0
        }
    }

    fn recorder(fail_on: Vec<&'static str>) -> Recorder {
        Recorder {
            fail_on,
            calls: AtomicUsize::new(0),
        }
    }

    fn index() -> (RunIndex, Vec<DimensionRelationship>) {
        let dims = vec![
            Dimension::time("t"),
            Dimension::time("fes"),
            Dimension::objective("f"),
        ];
        let run = || Run::from_rows(&[vec![1.0, 1.0, 1.0]]).unwrap();
        let instances = ["i1", "i2", "i3"];
        let experiments = ["ea", "eb"]
            .iter()
            .map(|e| {
                Experiment::new(
                    *e,
                    instances
                        .iter()
                        .map(|i| InstanceRuns::new(*i, vec![run()]))
                        .collect(),
                )
                .unwrap()
            })
            .collect();
        let set = ExperimentSet::new(
            dims.clone(),
            instances.iter().map(|i| Instance::new(*i)).collect(),
            experiments,
        )
        .unwrap();
        (
            ClusteringMode::ByExperiment.index(&set).unwrap(),
            attribute::enumerate(&dims),
        )
    }

    #[test]
    fn test_results_land_at_submission_position() -> Result<()> {
        let (index, attrs) = index();
        let service = recorder(vec![]);
        let table = FittingScheduler::new(&service).schedule(&index, &attrs)?;

        assert_eq!(table.shape(), (2, 3, 2));
        for e in 0..2 {
            for (r, instance) in index.categories().iter().enumerate() {
                for (a, attr) in attrs.iter().enumerate() {
                    assert_eq!(
                        table.get(e, r, a),
                        Some(&(instance.clone(), attr.dependent))
                    );
                }
            }
        }
        Ok(())
    }

    #[test]
    fn test_collect_all_reports_every_failure() {
        let (index, attrs) = index();
        let service = recorder(vec!["i1", "i3"]);
        let err = FittingScheduler::new(&service)
            .schedule(&index, &attrs)
            .unwrap_err();

        // 2 experiments × 2 failing instances × 2 attributes.
        let Error::Fitting(failures) = err else {
            panic!("expected aggregate failure");
        };
        assert_eq!(failures.len(), 8);
        assert_eq!(service.calls.load(Ordering::Relaxed), 12);
        let first = &failures.0[0];
        assert_eq!(
            (first.element.as_str(), first.category.as_str()),
            ("ea", "i1")
        );
    }

    #[test]
    fn test_fail_fast_reports_at_least_one() {
        let (index, attrs) = index();
        let service = recorder(vec!["i2"]);
        let err = FittingScheduler::new(&service)
            .with_join(JoinMode::FailFast)
            .schedule(&index, &attrs)
            .unwrap_err();
        let Error::Fitting(failures) = err else {
            panic!("expected fitting failure");
        };
        assert!(!failures.is_empty());
        assert!(failures.iter().all(|f| f.category == "i2"));
    }

    /// Fails on `i1` at once; sleeps on every other instance.
    struct Slow {
        started: AtomicUsize,
        finished: AtomicUsize,
    }

    impl FittingService for Slow {
        type Fitting = ();

        fn fit(&self, runs: &InstanceRuns, _: &DimensionRelationship) -> Result<()> {
            if runs.instance() == "i1" {
                return Err(Error::Model("refused i1".into()));
            }
            self.started.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(std::time::Duration::from_millis(20));
            self.finished.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn evaluate(&self, _: &(), _: &()) -> f64 {
            0.0
        }

        fn quality(&self, _: &()) -> f64 {
            0.0
        }
    }

    #[test]
    fn test_fail_fast_waits_for_running_leaves() -> Result<()> {
        let (index, attrs) = index();
        let service = Slow {
            started: AtomicUsize::new(0),
            finished: AtomicUsize::new(0),
        };
        let pool = rayon::ThreadPoolBuilder::new().num_threads(4).build()?;
        let result = pool.install(|| {
            FittingScheduler::new(&service)
                .with_join(JoinMode::FailFast)
                .schedule(&index, &attrs)
        });

        assert!(matches!(result, Err(Error::Fitting(_))));
        // Nothing is still running once the join has returned.
        let started = service.started.load(Ordering::SeqCst);
        assert_eq!(service.finished.load(Ordering::SeqCst), started);
        Ok(())
    }

    #[test]
    fn test_take_row_releases() -> Result<()> {
        let mut table = FittingTable::from_rows(vec![vec![vec![1u8]], vec![vec![2u8]]], 1, 1)?;
        assert!(!table.is_released(0));
        assert_eq!(table.take_row(0), Some(vec![vec![1u8]]));
        assert!(table.is_released(0));
        assert_eq!(table.get(0, 0, 0), None);
        assert_eq!(table.get(1, 0, 0), Some(&2u8));
        assert_eq!(table.take_row(0), None);
        Ok(())
    }

    #[test]
    fn test_ragged_rows_rejected() {
        let result = FittingTable::from_rows(vec![vec![vec![1u8], vec![]]], 2, 1);
        assert!(result.is_err());
    }
}
