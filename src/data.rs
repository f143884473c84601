//! In-memory experiment-set data model.
//!
//! An [`ExperimentSet`] holds the measurement [`Dimension`]s, the benchmark
//! [`Instance`]s and the [`Experiment`]s (algorithm setups). Each experiment
//! owns one [`InstanceRuns`] per instance it was run on, and each of those
//! holds the measured progress curves ([`Run`]s) as points × dimensions.
//!
//! ```text
//! ExperimentSet
//! ├── dimensions: [FEs, time, objective]
//! ├── instances:  [i1, i2, ...]
//! └── experiments
//!     └── Experiment "ea"
//!         └── InstanceRuns "i1"
//!             └── Run: Array2<f64> (points × dimensions)
//! ```

use crate::error::{Error, Result};
use ndarray::{Array2, ArrayView1};
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_SET_ID: AtomicU64 = AtomicU64::new(1);

/// Anything with a unique name inside its set.
pub trait NamedElement {
    /// The element's name.
    fn name(&self) -> &str;
}

/// One measurement dimension (column) of every run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dimension {
    name: String,
    is_time_measure: bool,
}

impl Dimension {
    /// A time-like dimension (runtime, function evaluations, ...).
    pub fn time(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_time_measure: true,
        }
    }

    /// A non-time dimension (objective value, ...).
    pub fn objective(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_time_measure: false,
        }
    }

    /// Dimension name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether this dimension measures elapsed time.
    pub fn is_time_measure(&self) -> bool {
        self.is_time_measure
    }
}

/// One measured progress curve: a row per logged point, a column per dimension.
#[derive(Debug, Clone, PartialEq)]
pub struct Run {
    points: Array2<f64>,
}

impl Run {
    /// Wrap a points × dimensions matrix.
    pub fn new(points: Array2<f64>) -> Self {
        Self { points }
    }

    /// Build from row vectors; every row must have the same length.
    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self> {
        let d = rows.first().map_or(0, Vec::len);
        let mut flat = Vec::with_capacity(rows.len() * d);
        for row in rows {
            if row.len() != d {
                return Err(Error::DimensionMismatch {
                    expected: d,
                    found: row.len(),
                });
            }
            flat.extend_from_slice(row);
        }
        let points = Array2::from_shape_vec((rows.len(), d), flat)
            .map_err(|e| Error::Model(e.to_string()))?;
        Ok(Self { points })
    }

    /// Number of logged points.
    pub fn n_points(&self) -> usize {
        self.points.nrows()
    }

    /// Number of dimensions per point.
    pub fn n_dimensions(&self) -> usize {
        self.points.ncols()
    }

    /// All values of one dimension.
    pub fn column(&self, dimension: usize) -> ArrayView1<'_, f64> {
        self.points.column(dimension)
    }

    /// The raw matrix.
    pub fn points(&self) -> &Array2<f64> {
        &self.points
    }
}

/// All runs of one experiment on one instance.
#[derive(Debug, Clone, PartialEq)]
pub struct InstanceRuns {
    instance: String,
    runs: Vec<Run>,
}

impl InstanceRuns {
    /// Runs of some experiment on `instance`.
    pub fn new(instance: impl Into<String>, runs: Vec<Run>) -> Self {
        Self {
            instance: instance.into(),
            runs,
        }
    }

    /// Name of the instance these runs were performed on.
    pub fn instance(&self) -> &str {
        &self.instance
    }

    /// The runs.
    pub fn runs(&self) -> &[Run] {
        &self.runs
    }
}

/// A benchmark instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Instance {
    name: String,
}

impl Instance {
    /// Create an instance.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl NamedElement for Instance {
    fn name(&self) -> &str {
        &self.name
    }
}

/// An algorithm setup together with its runs, sorted by instance name.
#[derive(Debug, Clone, PartialEq)]
pub struct Experiment {
    name: String,
    runs: Vec<Arc<InstanceRuns>>,
}

impl Experiment {
    /// Create an experiment. Fails if an instance is listed twice.
    pub fn new(name: impl Into<String>, runs: Vec<InstanceRuns>) -> Result<Self> {
        let name = name.into();
        let mut runs: Vec<Arc<InstanceRuns>> = runs.into_iter().map(Arc::new).collect();
        runs.sort_by(|a, b| a.instance.cmp(&b.instance));
        if let Some(pair) = runs.windows(2).find(|w| w[0].instance == w[1].instance) {
            return Err(Error::Consistency(format!(
                "experiment '{}' lists instance '{}' twice",
                name, pair[0].instance
            )));
        }
        Ok(Self { name, runs })
    }

    /// Per-instance runs, sorted by instance name.
    pub fn runs(&self) -> &[Arc<InstanceRuns>] {
        &self.runs
    }

    /// Binary search for the runs on `instance`.
    pub fn runs_for(&self, instance: &str) -> Option<&Arc<InstanceRuns>> {
        self.runs
            .binary_search_by(|r| r.instance.as_str().cmp(instance))
            .ok()
            .map(|i| &self.runs[i])
    }
}

impl NamedElement for Experiment {
    fn name(&self) -> &str {
        &self.name
    }
}

/// Which kind of named element something is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    /// A benchmark instance.
    Instance,
    /// An experiment (algorithm setup).
    Experiment,
}

/// A resolved element of an experiment set.
#[derive(Debug, Clone, PartialEq)]
pub enum ElementRef {
    /// A benchmark instance.
    Instance(Arc<Instance>),
    /// An experiment.
    Experiment(Arc<Experiment>),
}

impl ElementRef {
    /// Concrete kind.
    pub fn kind(&self) -> ElementKind {
        match self {
            ElementRef::Instance(_) => ElementKind::Instance,
            ElementRef::Experiment(_) => ElementKind::Experiment,
        }
    }
}

impl NamedElement for ElementRef {
    fn name(&self) -> &str {
        match self {
            ElementRef::Instance(i) => i.name(),
            ElementRef::Experiment(e) => e.name(),
        }
    }
}

/// Dimensions, instances and experiments of one benchmark study.
#[derive(Debug)]
pub struct ExperimentSet {
    id: u64,
    dimensions: Vec<Dimension>,
    instances: Vec<Arc<Instance>>,
    experiments: Vec<Arc<Experiment>>,
}

impl ExperimentSet {
    /// Assemble and validate a set.
    ///
    /// Names must be unique per kind, every run must have one column per
    /// dimension and every [`InstanceRuns`] must name a listed instance.
    pub fn new(
        dimensions: Vec<Dimension>,
        instances: Vec<Instance>,
        experiments: Vec<Experiment>,
    ) -> Result<Self> {
        let mut seen = HashSet::new();
        for instance in &instances {
            if !seen.insert(instance.name()) {
                return Err(Error::Consistency(format!(
                    "instance '{}' is listed twice",
                    instance.name()
                )));
            }
        }

        let mut seen_experiments = HashSet::new();
        for experiment in &experiments {
            if !seen_experiments.insert(experiment.name()) {
                return Err(Error::Consistency(format!(
                    "experiment '{}' is listed twice",
                    experiment.name()
                )));
            }
            for runs in experiment.runs() {
                if !seen.contains(runs.instance()) {
                    return Err(Error::Consistency(format!(
                        "experiment '{}' has runs on unknown instance '{}'",
                        experiment.name(),
                        runs.instance()
                    )));
                }
                if let Some(run) = runs.runs().iter().find(|r| r.n_dimensions() != dimensions.len()) {
                    return Err(Error::DimensionMismatch {
                        expected: dimensions.len(),
                        found: run.n_dimensions(),
                    });
                }
            }
        }

        Ok(Self::assemble(
            dimensions,
            instances.into_iter().map(Arc::new).collect(),
            experiments.into_iter().map(Arc::new).collect(),
        ))
    }

    fn assemble(
        dimensions: Vec<Dimension>,
        instances: Vec<Arc<Instance>>,
        experiments: Vec<Arc<Experiment>>,
    ) -> Self {
        Self {
            id: NEXT_SET_ID.fetch_add(1, Ordering::Relaxed),
            dimensions,
            instances,
            experiments,
        }
    }

    /// Process-unique identity of this set.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Measurement dimensions in column order.
    pub fn dimensions(&self) -> &[Dimension] {
        &self.dimensions
    }

    /// Benchmark instances.
    pub fn instances(&self) -> &[Arc<Instance>] {
        &self.instances
    }

    /// Experiments.
    pub fn experiments(&self) -> &[Arc<Experiment>] {
        &self.experiments
    }

    /// Look up an instance by name.
    pub fn instance(&self, name: &str) -> Option<&Arc<Instance>> {
        self.instances.iter().find(|i| i.name() == name)
    }

    /// Look up an experiment by name.
    pub fn experiment(&self, name: &str) -> Option<&Arc<Experiment>> {
        self.experiments.iter().find(|e| e.name() == name)
    }

    /// Restrict to the instances every experiment was run on.
    ///
    /// Experiments keep only their runs on those instances. The result is a
    /// new set with its own [`id`](Self::id).
    pub fn shared_instances(&self) -> Self {
        let instances: Vec<Arc<Instance>> = self
            .instances
            .iter()
            .filter(|i| {
                self.experiments
                    .iter()
                    .all(|e| e.runs_for(i.name()).is_some())
            })
            .cloned()
            .collect();
        let keep: HashSet<&str> = instances.iter().map(|i| i.name()).collect();

        let experiments = self
            .experiments
            .iter()
            .map(|e| {
                Arc::new(Experiment {
                    name: e.name.clone(),
                    runs: e
                        .runs
                        .iter()
                        .filter(|r| keep.contains(r.instance()))
                        .cloned()
                        .collect(),
                })
            })
            .collect();

        Self::assemble(self.dimensions.clone(), instances, experiments)
    }
}
