//! Merge history of agglomerative clustering.
//!
//! Ids follow the SciPy convention: leaves are `0..n`, merge `i` creates
//! cluster `n + i`.

use crate::error::{Error, Result};

/// A dendrogram representing hierarchical cluster merges, in merge order.
#[derive(Debug, Clone)]
pub struct Dendrogram {
    merges: Vec<Merge>,
    n_items: usize,
}

/// A single merge operation in the dendrogram.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Merge {
    /// First cluster being merged (id).
    pub cluster_a: usize,
    /// Second cluster being merged (id).
    pub cluster_b: usize,
    /// Dissimilarity at which the merge occurred.
    pub distance: f64,
    /// Size of resulting cluster.
    pub size: usize,
}

impl Dendrogram {
    /// Create an empty dendrogram over `n_items` leaves.
    pub fn new(n_items: usize) -> Self {
        Self {
            merges: Vec::with_capacity(n_items.saturating_sub(1)),
            n_items,
        }
    }

    /// Record the next merge.
    pub fn add_merge(&mut self, cluster_a: usize, cluster_b: usize, distance: f64, size: usize) {
        self.merges.push(Merge {
            cluster_a,
            cluster_b,
            distance,
            size,
        });
    }

    /// Labels for exactly `k` clusters: apply the first `n - k` merges.
    ///
    /// Labels are contiguous from 0, numbered by first appearance in item
    /// order, so item 0 is always in cluster 0.
    pub fn cut_to_k(&self, k: usize) -> Result<Vec<usize>> {
        let n = self.n_items;
        if n == 0 {
            return Ok(Vec::new());
        }
        if k == 0 || k > n {
            return Err(Error::InvalidParameter {
                name: "k",
                message: "must be between 1 and the number of items",
            });
        }
        let n_merges = n - k;
        if n_merges > self.merges.len() {
            return Err(Error::Clusterer(format!(
                "dendrogram has {} merges, {} needed for {} clusters",
                self.merges.len(),
                n_merges,
                k
            )));
        }

        // Union-find over leaves and merge nodes.
        let mut parent: Vec<usize> = (0..n + n_merges).collect();
        for (i, merge) in self.merges.iter().take(n_merges).enumerate() {
            let node = n + i;
            for child in [merge.cluster_a, merge.cluster_b] {
                if child >= node {
                    return Err(Error::Clusterer(format!(
                        "merge {i} refers to cluster {child} before it exists"
                    )));
                }
                let root = find(&mut parent, child);
                parent[root] = node;
            }
        }

        let mut label_of_root = vec![usize::MAX; parent.len()];
        let mut next = 0;
        let mut labels = Vec::with_capacity(n);
        for item in 0..n {
            let root = find(&mut parent, item);
            if label_of_root[root] == usize::MAX {
                label_of_root[root] = next;
                next += 1;
            }
            labels.push(label_of_root[root]);
        }
        Ok(labels)
    }

    /// Number of original items.
    pub fn n_items(&self) -> usize {
        self.n_items
    }

    /// Number of merges recorded.
    pub fn n_merges(&self) -> usize {
        self.merges.len()
    }

    /// Iterate over merges.
    pub fn merges(&self) -> impl Iterator<Item = &Merge> {
        self.merges.iter()
    }

    /// Merge distances, in merge order.
    pub fn distances(&self) -> Vec<f64> {
        self.merges.iter().map(|m| m.distance).collect()
    }
}

fn find(parent: &mut [usize], mut x: usize) -> usize {
    while parent[x] != x {
        parent[x] = parent[parent[x]];
        x = parent[x];
    }
    x
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain() -> Dendrogram {
        // ((0 1) 2) (3 4), then everything.
        let mut d = Dendrogram::new(5);
        d.add_merge(0, 1, 0.1, 2); // 5
        d.add_merge(3, 4, 0.2, 2); // 6
        d.add_merge(5, 2, 0.3, 3); // 7
        d.add_merge(7, 6, 0.9, 5); // 8
        d
    }

    #[test]
    fn test_cut_counts() -> Result<()> {
        let d = chain();
        assert_eq!(d.cut_to_k(5)?, vec![0, 1, 2, 3, 4]);
        assert_eq!(d.cut_to_k(4)?, vec![0, 0, 1, 2, 3]);
        assert_eq!(d.cut_to_k(3)?, vec![0, 0, 1, 2, 2]);
        assert_eq!(d.cut_to_k(2)?, vec![0, 0, 0, 1, 1]);
        assert_eq!(d.cut_to_k(1)?, vec![0; 5]);
        Ok(())
    }

    #[test]
    fn test_tied_distances_still_exact_k() -> Result<()> {
        let mut d = Dendrogram::new(4);
        d.add_merge(0, 1, 1.0, 2);
        d.add_merge(2, 3, 1.0, 2);
        d.add_merge(4, 5, 1.0, 4);
        assert_eq!(d.cut_to_k(3)?, vec![0, 0, 1, 2]);
        Ok(())
    }

    #[test]
    fn test_invalid_k() {
        let d = chain();
        assert!(d.cut_to_k(0).is_err());
        assert!(d.cut_to_k(6).is_err());
        assert_eq!(Dendrogram::new(0).cut_to_k(1).ok(), Some(vec![]));
    }

    #[test]
    fn test_incomplete_history() {
        let mut d = Dendrogram::new(3);
        d.add_merge(0, 1, 0.5, 2);
        assert!(matches!(d.cut_to_k(1), Err(Error::Clusterer(_))));
        assert_eq!(d.n_merges(), 1);
        assert_eq!(d.distances(), vec![0.5]);
    }
}
