//! Clustering traits.

use crate::distance::DistanceMatrix;
use crate::error::Result;
use crate::logging::Logger;

/// Partitions items given only their pairwise distances.
pub trait DistanceClusterer: Sync {
    /// Return one label per row of `distances`.
    ///
    /// Labels are contiguous from 0 and every item is labeled.
    fn cluster(&self, distances: &DistanceMatrix, logger: Option<&dyn Logger>)
        -> Result<Vec<usize>>;
}
