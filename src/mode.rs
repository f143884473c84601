//! Clustering modes and run indexing.
//!
//! Clustering experiments indexes each experiment's runs by instance;
//! clustering instances indexes each instance's runs by experiment. The two
//! lookups differ on purpose:
//!
//! | Mode | Elements | Categories | Slot lookup |
//! |------|----------|------------|-------------|
//! | [`ByExperiment`](ClusteringMode::ByExperiment) | experiments | instance names | binary search in the experiment's sorted list |
//! | [`ByInstance`](ClusteringMode::ByInstance) | instances | experiment names | linear scan of each experiment |
//!
//! Experiments enumerate the instances they ran, sorted. Nothing enumerates
//! the experiments an instance appears in, so the by-instance side scans.

use crate::data::{ElementKind, ElementRef, ExperimentSet, InstanceRuns, NamedElement};
use crate::error::{Error, Result};
use core::fmt;
use std::sync::Arc;

/// Which kind of element gets clustered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClusteringMode {
    /// Cluster experiments; runs are indexed by instance.
    ByExperiment,
    /// Cluster instances; runs are indexed by experiment.
    ByInstance,
}

impl ClusteringMode {
    /// Kind of the clustered elements.
    pub fn element_kind(self) -> ElementKind {
        match self {
            ClusteringMode::ByExperiment => ElementKind::Experiment,
            ClusteringMode::ByInstance => ElementKind::Instance,
        }
    }

    /// Kind of the run-category axis.
    pub fn category_kind(self) -> ElementKind {
        match self {
            ClusteringMode::ByExperiment => ElementKind::Instance,
            ClusteringMode::ByInstance => ElementKind::Experiment,
        }
    }

    /// Build the run index over `set`.
    pub fn index(self, set: &ExperimentSet) -> Result<RunIndex> {
        match self {
            ClusteringMode::ByExperiment => index_by_experiment(set),
            ClusteringMode::ByInstance => index_by_instance(set),
        }
    }

    /// Find the element called `name` in `original`.
    pub fn resolve(self, original: &ExperimentSet, name: &str) -> Result<ElementRef> {
        let found = match self {
            ClusteringMode::ByExperiment => original
                .experiment(name)
                .cloned()
                .map(ElementRef::Experiment),
            ClusteringMode::ByInstance => original.instance(name).cloned().map(ElementRef::Instance),
        };
        found.ok_or_else(|| {
            Error::Consistency(format!(
                "clustered {:?} '{}' does not exist in the original experiment set",
                self.element_kind(),
                name
            ))
        })
    }
}

impl fmt::Display for ClusteringMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClusteringMode::ByExperiment => write!(f, "by experiment"),
            ClusteringMode::ByInstance => write!(f, "by instance"),
        }
    }
}

/// One clustered element and its runs, one slot per category.
#[derive(Debug, Clone)]
pub struct ElementRuns {
    name: String,
    runs: Vec<Arc<InstanceRuns>>,
}

impl ElementRuns {
    /// Element name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// `runs()[c]` holds the runs for category `c`.
    pub fn runs(&self) -> &[Arc<InstanceRuns>] {
        &self.runs
    }
}

/// Elements to cluster and the sorted category axis their runs are indexed by.
#[derive(Debug, Clone)]
pub struct RunIndex {
    mode: ClusteringMode,
    categories: Vec<String>,
    elements: Vec<ElementRuns>,
}

impl RunIndex {
    /// Mode this index was built for.
    pub fn mode(&self) -> ClusteringMode {
        self.mode
    }

    /// Sorted, deduplicated category names.
    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    /// Elements in set order.
    pub fn elements(&self) -> &[ElementRuns] {
        &self.elements
    }

    /// Element names in index order.
    pub fn names(&self) -> Vec<String> {
        self.elements.iter().map(|e| e.name.clone()).collect()
    }

    /// Number of clustered elements.
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// True when there is nothing to cluster.
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}

fn sorted_names<'a>(names: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut out: Vec<String> = names.map(str::to_owned).collect();
    out.sort_unstable();
    out.dedup();
    out
}

fn index_by_experiment(set: &ExperimentSet) -> Result<RunIndex> {
    let categories = sorted_names(set.instances().iter().map(|i| i.name()));

    let mut elements = Vec::with_capacity(set.experiments().len());
    for experiment in set.experiments() {
        let mut runs = Vec::with_capacity(categories.len());
        for instance in &categories {
            // Every experiment lists the instances it ran; a miss means the
            // set was not restricted to shared instances.
            let slot = experiment.runs_for(instance).ok_or_else(|| {
                Error::Consistency(format!(
                    "experiment '{}' has no runs on instance '{}'",
                    experiment.name(),
                    instance
                ))
            })?;
            runs.push(Arc::clone(slot));
        }
        elements.push(ElementRuns {
            name: experiment.name().to_owned(),
            runs,
        });
    }

    Ok(RunIndex {
        mode: ClusteringMode::ByExperiment,
        categories,
        elements,
    })
}

fn index_by_instance(set: &ExperimentSet) -> Result<RunIndex> {
    let categories = sorted_names(set.experiments().iter().map(|e| e.name()));

    let mut elements = Vec::with_capacity(set.instances().len());
    for instance in set.instances() {
        let mut runs = Vec::with_capacity(categories.len());
        for name in &categories {
            let experiment = set.experiment(name).ok_or_else(|| {
                Error::Consistency(format!("experiment '{name}' vanished from its own set"))
            })?;
            let slot = experiment
                .runs()
                .iter()
                .find(|r| r.instance() == instance.name())
                .ok_or_else(|| {
                    Error::Consistency(format!(
                        "instance '{}' is treated as shared but experiment '{}' has no runs on it",
                        instance.name(),
                        experiment.name()
                    ))
                })?;
            runs.push(Arc::clone(slot));
        }
        elements.push(ElementRuns {
            name: instance.name().to_owned(),
            runs,
        });
    }

    Ok(RunIndex {
        mode: ClusteringMode::ByInstance,
        categories,
        elements,
    })
}
