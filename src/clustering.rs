//! Clustering results: named, materialized subsets of the original set.

use crate::data::{ElementRef, Experiment, ExperimentSet, Instance, NamedElement};
use crate::mode::ClusteringMode;
use std::sync::Arc;

/// A materialized subset of instances and/or experiments.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataSelection {
    instances: Vec<Arc<Instance>>,
    experiments: Vec<Arc<Experiment>>,
}

impl DataSelection {
    /// Empty selection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an element by its concrete kind.
    pub fn add(&mut self, element: ElementRef) {
        match element {
            ElementRef::Instance(i) => self.instances.push(i),
            ElementRef::Experiment(e) => self.experiments.push(e),
        }
    }

    /// Selected instances.
    pub fn instances(&self) -> &[Arc<Instance>] {
        &self.instances
    }

    /// Selected experiments.
    pub fn experiments(&self) -> &[Arc<Experiment>] {
        &self.experiments
    }

    /// Whether an element of either kind is named `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.instances.iter().any(|i| i.name() == name)
            || self.experiments.iter().any(|e| e.name() == name)
    }

    /// Number of selected elements.
    pub fn len(&self) -> usize {
        self.instances.len() + self.experiments.len()
    }

    /// True if nothing is selected.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One named cluster.
#[derive(Debug, Clone, PartialEq)]
pub struct Cluster {
    name: String,
    selection: DataSelection,
}

impl Cluster {
    pub(crate) fn new(name: String, selection: DataSelection) -> Self {
        Self { name, selection }
    }

    /// Alphabetic identifier ("A", "B", ...).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.selection.len()
    }

    /// True for an empty cluster. Never the case for engine output.
    pub fn is_empty(&self) -> bool {
        self.selection.is_empty()
    }

    /// Members.
    pub fn selection(&self) -> &DataSelection {
        &self.selection
    }

    /// Member names in insertion order.
    pub fn member_names(&self) -> Vec<&str> {
        self.selection
            .instances
            .iter()
            .map(|i| i.name())
            .chain(self.selection.experiments.iter().map(|e| e.name()))
            .collect()
    }
}

/// Immutable result of one clustering computation.
#[derive(Debug)]
pub struct Clustering {
    owner: Arc<ExperimentSet>,
    mode: ClusteringMode,
    clusters: Vec<Cluster>,
}

impl Clustering {
    pub(crate) fn new(owner: Arc<ExperimentSet>, mode: ClusteringMode, clusters: Vec<Cluster>) -> Self {
        Self {
            owner,
            mode,
            clusters,
        }
    }

    /// The unfiltered experiment set that was clustered.
    pub fn owner(&self) -> &Arc<ExperimentSet> {
        &self.owner
    }

    /// What was clustered.
    pub fn mode(&self) -> ClusteringMode {
        self.mode
    }

    /// Clusters in label order.
    pub fn clusters(&self) -> &[Cluster] {
        &self.clusters
    }

    /// Number of clusters.
    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    /// True if nothing was clustered.
    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }

    /// Iterate over clusters.
    pub fn iter(&self) -> impl Iterator<Item = &Cluster> {
        self.clusters.iter()
    }

    /// Cluster containing the element named `name`.
    pub fn cluster_of(&self, name: &str) -> Option<&Cluster> {
        self.clusters.iter().find(|c| c.selection.contains(name))
    }

    /// Members over all clusters.
    pub fn total_members(&self) -> usize {
        self.clusters.iter().map(Cluster::len).sum()
    }
}
