//! Rebuilding named clusters from a label array.

use crate::clustering::{Cluster, DataSelection};
use crate::data::{ExperimentSet, NamedElement};
use crate::error::{Error, Result};
use crate::mode::ClusteringMode;

/// Bijective base-26 name: 0 → "A", 25 → "Z", 26 → "AA", 27 → "AB", ...
pub fn cluster_name(index: usize) -> String {
    let mut letters = Vec::new();
    let mut n = index + 1;
    while n > 0 {
        n -= 1;
        letters.push(b'A' + (n % 26) as u8);
        n /= 26;
    }
    letters.reverse();
    letters.into_iter().map(char::from).collect()
}

/// Materializes clusters of one mode from elements of the unfiltered set.
#[derive(Debug)]
pub struct PartitionBuilder<'a> {
    mode: ClusteringMode,
    original: &'a ExperimentSet,
}

impl<'a> PartitionBuilder<'a> {
    /// Resolve members of `mode`'s element kind in `original`.
    pub fn new(mode: ClusteringMode, original: &'a ExperimentSet) -> Self {
        Self { mode, original }
    }

    /// Group `names[i]` by `labels[i]`.
    ///
    /// Cluster indices are visited from 0 upward until one has no members,
    /// so labels must be contiguous. Every name must resolve in the original
    /// set and every element must end up in exactly one cluster.
    pub fn build(&self, names: &[String], labels: &[usize]) -> Result<Vec<Cluster>> {
        if names.len() != labels.len() {
            return Err(Error::Consistency(format!(
                "{} labels for {} clustered elements",
                labels.len(),
                names.len()
            )));
        }

        let mut clusters = Vec::new();
        let mut placed = 0;
        for index in 0.. {
            let mut selection = DataSelection::new();
            for (name, _) in names.iter().zip(labels).filter(|(_, &l)| l == index) {
                let element = self.mode.resolve(self.original, name)?;
                if element.kind() != self.mode.element_kind() {
                    return Err(Error::Consistency(format!(
                        "'{}' resolved to a {:?}, expected a {:?}",
                        element.name(),
                        element.kind(),
                        self.mode.element_kind()
                    )));
                }
                selection.add(element);
            }
            if selection.is_empty() {
                break;
            }
            placed += selection.len();
            clusters.push(Cluster::new(cluster_name(index), selection));
        }

        if placed != names.len() {
            let missing: Vec<&str> = names
                .iter()
                .zip(labels)
                .filter(|(_, &l)| l >= clusters.len())
                .map(|(n, _)| n.as_str())
                .collect();
            return Err(Error::Consistency(format!(
                "placed {} of {} elements into {} clusters; unplaced: {}",
                placed,
                names.len(),
                clusters.len(),
                missing.join(", ")
            )));
        }
        Ok(clusters)
    }
}
