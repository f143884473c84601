//! # kin
//!
//! Group the experiments (algorithm setups) or the benchmark instances of an
//! optimization-benchmarking study by how the algorithms *behave at runtime*:
//! their measured progress curves, not their static metadata.
//!
//! The pipeline fits a model of every (non-time, time) dimension relation on
//! every run slot of every element in parallel, scores how well each
//! element's models explain the other elements' data, and partitions the
//! resulting distance matrix into alphabetically named clusters.
//!
//! ```rust
//! use kin::{
//!     BehaviorClusteringEngine, ClusteringMode, Dimension, Experiment, ExperimentSet,
//!     HierarchicalClusterer, Instance, InstanceRuns, LeastSquaresFitter, Run,
//! };
//! use std::sync::Arc;
//!
//! let curve = |slope: f64| {
//!     let rows: Vec<Vec<f64>> = (0..8).map(|i| vec![slope * i as f64, i as f64]).collect();
//!     InstanceRuns::new("i1", vec![Run::from_rows(&rows).unwrap()])
//! };
//! let set = Arc::new(
//!     ExperimentSet::new(
//!         vec![Dimension::time("FEs"), Dimension::objective("f")],
//!         vec![Instance::new("i1")],
//!         vec![
//!             Experiment::new("fast", vec![curve(1.0)]).unwrap(),
//!             Experiment::new("slow", vec![curve(5.0)]).unwrap(),
//!         ],
//!     )
//!     .unwrap(),
//! );
//!
//! let engine = BehaviorClusteringEngine::new(LeastSquaresFitter, HierarchicalClusterer::new());
//! let clustering = engine.compute(&set, ClusteringMode::ByExperiment, None).unwrap();
//! assert_eq!(clustering.total_members(), 2);
//! ```

pub mod attribute;
pub mod cluster;
/// Clustering results.
pub mod clustering;
pub mod data;
pub mod distance;
pub mod engine;
/// Error types used across `kin`.
pub mod error;
pub mod fitting;
pub mod logging;
pub mod mode;
pub mod partition;
pub mod schedule;


pub use attribute::DimensionRelationship;
pub use cluster::{ClusterCount, DistanceClusterer, HierarchicalClusterer, Linkage};
pub use clustering::{Cluster, Clustering, DataSelection};
pub use data::{
    Dimension, ElementKind, ElementRef, Experiment, ExperimentSet, Instance, InstanceRuns,
    NamedElement, Run,
};
pub use distance::{asymmetric_deviation, DistanceBuilder, DistanceMatrix, StableSum};
pub use engine::{BehaviorClusteringEngine, EngineConfig};
pub use error::{Error, FitFailure, FitFailures, Result};
pub use fitting::{FittingService, LeastSquaresFitter, LineFit};
pub use logging::{Logger, TracingLogger};
pub use mode::{ClusteringMode, RunIndex};
pub use partition::{cluster_name, PartitionBuilder};
pub use schedule::{FittingScheduler, FittingTable, JoinMode};
