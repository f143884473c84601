//! Distance-matrix clustering.
//!
//! Behavior distances come from swapping fitted models between elements, so
//! there are no coordinates to average: only algorithms that work from a
//! pairwise matrix apply. [`DistanceClusterer`] is the seam; the bundled
//! implementation is agglomerative clustering via `kodama`.
//!
//! ## Usage
//!
//! ```rust
//! use kin::cluster::{ClusterCount, DistanceClusterer, HierarchicalClusterer};
//! use kin::DistanceMatrix;
//! use ndarray::array;
//!
//! let d = DistanceMatrix::new(array![
//!     [0.0, 0.1, 9.0],
//!     [0.1, 0.0, 9.5],
//!     [9.0, 9.5, 0.0],
//! ])
//! .unwrap();
//!
//! let labels = HierarchicalClusterer::new()
//!     .with_count(ClusterCount::Exact(2))
//!     .cluster(&d, None)
//!     .unwrap();
//! assert_eq!(labels, vec![0, 0, 1]);
//! ```

mod dendrogram;
mod hierarchical;
mod traits;

pub use dendrogram::{Dendrogram, Merge};
pub use hierarchical::{silhouette, ClusterCount, HierarchicalClusterer, Linkage};
pub use traits::DistanceClusterer;
