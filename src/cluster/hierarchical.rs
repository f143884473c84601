//! Hierarchical (agglomerative) clustering over a distance matrix.
//!
//! Bottom-up clustering that builds a **dendrogram** by iteratively
//! merging the closest clusters. Behavior distances are not Euclidean, so
//! the input is the matrix itself, never coordinates.
//!
//! # Linkage Methods
//!
//! | Linkage | Formula | Effect |
//! |---------|---------|--------|
//! | Single | min(d(a,b)) for a∈A, b∈B | Chaining; elongated clusters |
//! | Complete | max(d(a,b)) | Compact clusters |
//! | Average | mean(d(a,b)) | Balanced compromise |
//! | Ward | Δ variance | Minimizes within-cluster variance |
//!
//! # Choosing k
//!
//! With [`ClusterCount::Range`] every cut in the range is scored by its mean
//! silhouette against the original distances:
//!
//! ```text
//! s(i) = (b(i) - a(i)) / max(a(i), b(i))
//! ```
//!
//! where a(i) is the mean distance to i's own cluster and b(i) the smallest
//! mean distance to another cluster. Singletons score 0. The best mean wins;
//! ties go to the smaller k.

use super::dendrogram::Dendrogram;
use super::traits::DistanceClusterer;
use crate::distance::DistanceMatrix;
use crate::error::{Error, Result};
use crate::logging::Logger;
use kodama::{linkage as kodama_linkage, Method as KodamaMethod};

/// Linkage method for hierarchical clustering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Linkage {
    /// Single linkage: minimum distance between clusters.
    Single,
    /// Complete linkage: maximum distance between clusters.
    Complete,
    /// Average linkage: mean distance between clusters.
    Average,
    /// Ward's method: minimize within-cluster variance.
    Ward,
}

/// How many clusters to cut the dendrogram into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClusterCount {
    /// Exactly `k`, capped at the number of items.
    Exact(usize),
    /// Best silhouette among `min..=max`, capped at the number of items.
    Range {
        /// Smallest candidate.
        min: usize,
        /// Largest candidate.
        max: usize,
    },
}

/// Agglomerative clusterer backed by `kodama`.
#[derive(Debug, Clone)]
pub struct HierarchicalClusterer {
    linkage: Linkage,
    count: ClusterCount,
}

impl Default for HierarchicalClusterer {
    fn default() -> Self {
        Self::new()
    }
}

impl HierarchicalClusterer {
    /// Average linkage, 2 to 8 clusters by silhouette.
    pub fn new() -> Self {
        Self {
            linkage: Linkage::Average,
            count: ClusterCount::Range { min: 2, max: 8 },
        }
    }

    /// Set linkage method.
    pub fn with_linkage(mut self, linkage: Linkage) -> Self {
        self.linkage = linkage;
        self
    }

    /// Set cluster count policy.
    pub fn with_count(mut self, count: ClusterCount) -> Self {
        self.count = count;
        self
    }

    /// Fit and return the full dendrogram.
    pub fn fit_dendrogram(&self, distances: &DistanceMatrix) -> Result<Dendrogram> {
        let n = distances.len();
        if n == 0 {
            return Err(Error::EmptyInput);
        }

        let mut condensed = distances.condensed();
        if let Some(bad) = condensed.iter().find(|d| !d.is_finite() || **d < 0.0) {
            return Err(Error::Clusterer(format!(
                "distance {bad} is not a finite non-negative number"
            )));
        }

        let method = match self.linkage {
            Linkage::Single => KodamaMethod::Single,
            Linkage::Complete => KodamaMethod::Complete,
            Linkage::Average => KodamaMethod::Average,
            Linkage::Ward => KodamaMethod::Ward,
        };

        let dend = kodama_linkage(&mut condensed, n, method);

        let mut dendro = Dendrogram::new(n);
        for step in dend.steps() {
            dendro.add_merge(step.cluster1, step.cluster2, step.dissimilarity, step.size);
        }
        Ok(dendro)
    }

    fn candidates(&self, n: usize) -> Result<(usize, usize)> {
        match self.count {
            ClusterCount::Exact(0) => Err(Error::InvalidParameter {
                name: "count",
                message: "cluster count must be at least 1",
            }),
            ClusterCount::Exact(k) => Ok((k.min(n), k.min(n))),
            ClusterCount::Range { min, max } if min == 0 || min > max => {
                Err(Error::InvalidParameter {
                    name: "count",
                    message: "range must satisfy 1 <= min <= max",
                })
            }
            ClusterCount::Range { min, max } => Ok((min.min(n), max.min(n))),
        }
    }
}

impl DistanceClusterer for HierarchicalClusterer {
    fn cluster(
        &self,
        distances: &DistanceMatrix,
        _logger: Option<&dyn Logger>,
    ) -> Result<Vec<usize>> {
        let n = distances.len();
        let (lo, hi) = self.candidates(n)?;
        match n {
            0 => return Ok(Vec::new()),
            1 => return Ok(vec![0]),
            _ => {}
        }

        let dendro = self.fit_dendrogram(distances)?;
        if lo == hi {
            return dendro.cut_to_k(lo);
        }

        let mut best: Option<(f64, Vec<usize>)> = None;
        for k in lo..=hi {
            let labels = dendro.cut_to_k(k)?;
            let score = silhouette(distances, &labels);
            tracing::debug!(k, score, "silhouette of cut");
            if best.as_ref().map_or(true, |(s, _)| score > *s) {
                best = Some((score, labels));
            }
        }
        best.map(|(_, labels)| labels)
            .ok_or_else(|| Error::Clusterer("no candidate cluster count".into()))
    }
}

/// Mean silhouette of `labels` under `distances`. 0 for fewer than 2 clusters.
pub fn silhouette(distances: &DistanceMatrix, labels: &[usize]) -> f64 {
    let n = labels.len();
    let k = labels.iter().max().map_or(0, |m| m + 1);
    if k < 2 || n != distances.len() {
        return 0.0;
    }

    let mut sizes = vec![0usize; k];
    for &l in labels {
        sizes[l] += 1;
    }

    let mut total = 0.0;
    let mut sums = vec![0.0; k];
    for i in 0..n {
        if sizes[labels[i]] < 2 {
            continue;
        }
        sums.iter_mut().for_each(|s| *s = 0.0);
        for j in 0..n {
            if i != j {
                sums[labels[j]] += distances.get(i, j);
            }
        }
        let own = labels[i];
        let a = sums[own] / (sizes[own] - 1) as f64;
        let b = (0..k)
            .filter(|&c| c != own && sizes[c] > 0)
            .map(|c| sums[c] / sizes[c] as f64)
            .fold(f64::INFINITY, f64::min);
        let scale = a.max(b);
        if scale > 0.0 && b.is_finite() {
            total += (b - a) / scale;
        }
    }
    total / n as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    /// Items on a line; distance is the gap.
    fn line(xs: &[f64]) -> DistanceMatrix {
        let n = xs.len();
        DistanceMatrix::new(Array2::from_shape_fn((n, n), |(i, j)| (xs[i] - xs[j]).abs()))
            .unwrap()
    }

    #[test]
    fn test_two_groups_exact() -> Result<()> {
        let d = line(&[0.0, 0.1, 10.0, 10.1]);
        let labels = HierarchicalClusterer::new()
            .with_count(ClusterCount::Exact(2))
            .cluster(&d, None)?;
        assert_eq!(labels, vec![0, 0, 1, 1]);
        Ok(())
    }

    #[test]
    fn test_range_picks_natural_groups() -> Result<()> {
        let d = line(&[0.0, 0.2, 0.1, 50.0, 50.1, 100.0, 100.2]);
        let labels = HierarchicalClusterer::new()
            .with_count(ClusterCount::Range { min: 2, max: 5 })
            .cluster(&d, None)?;
        assert_eq!(labels, vec![0, 0, 0, 1, 1, 2, 2]);
        Ok(())
    }

    #[test]
    fn test_every_linkage_separates_groups() -> Result<()> {
        let d = line(&[0.0, 0.1, 10.0, 10.1]);
        for linkage in [Linkage::Single, Linkage::Complete, Linkage::Average, Linkage::Ward] {
            let labels = HierarchicalClusterer::new()
                .with_linkage(linkage)
                .with_count(ClusterCount::Exact(2))
                .cluster(&d, None)?;
            assert_eq!(labels, vec![0, 0, 1, 1], "{linkage:?}");
        }
        Ok(())
    }

    #[test]
    fn test_tiny_inputs() -> Result<()> {
        let c = HierarchicalClusterer::new();
        assert!(c.cluster(&line(&[]), None)?.is_empty());
        assert_eq!(c.cluster(&line(&[3.0]), None)?, vec![0]);
        // k capped at n.
        let labels = c
            .clone()
            .with_count(ClusterCount::Exact(10))
            .cluster(&line(&[0.0, 1.0, 5.0]), None)?;
        assert_eq!(labels, vec![0, 1, 2]);
        Ok(())
    }

    #[test]
    fn test_invalid_counts() {
        let d = line(&[0.0, 1.0]);
        for count in [
            ClusterCount::Exact(0),
            ClusterCount::Range { min: 0, max: 3 },
            ClusterCount::Range { min: 4, max: 3 },
        ] {
            let result = HierarchicalClusterer::new().with_count(count).cluster(&d, None);
            assert!(matches!(result, Err(Error::InvalidParameter { .. })));
        }
    }

    #[test]
    fn test_non_finite_distance_rejected() {
        let mut m = Array2::zeros((2, 2));
        m[[0, 1]] = f64::INFINITY;
        m[[1, 0]] = f64::INFINITY;
        let d = DistanceMatrix::new(m).unwrap();
        let result = HierarchicalClusterer::new()
            .with_count(ClusterCount::Exact(1))
            .cluster(&d, None);
        assert!(matches!(result, Err(Error::Clusterer(_))));
    }

    #[test]
    fn test_silhouette_bounds() {
        let d = line(&[0.0, 0.1, 10.0, 10.1]);
        let good = silhouette(&d, &[0, 0, 1, 1]);
        let bad = silhouette(&d, &[0, 1, 0, 1]);
        assert!(good > 0.9 && good <= 1.0);
        assert!(bad < 0.0);
        assert_eq!(silhouette(&d, &[0, 0, 0, 0]), 0.0);
    }
}
