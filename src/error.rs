use core::fmt;
use thiserror::Error;

/// Result alias for `kin`.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by the clustering pipeline and its collaborators.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// Input was empty.
    #[error("empty input provided")]
    EmptyInput,

    /// Matrix dimension mismatch (usize).
    #[error("dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch {
        /// Expected dimension.
        expected: usize,
        /// Found dimension.
        found: usize,
    },

    /// Invalid parameter value.
    #[error("invalid parameter '{name}': {message}")]
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// Error message.
        message: &'static str,
    },

    /// The data handed to the engine violated an assumption it depends on.
    ///
    /// Fatal: the computation is aborted and no partial result exists.
    #[error("internal consistency failure: {0}")]
    Consistency(String),

    /// A fitting service could not model one (runs, attribute) pair.
    #[error("model fitting failed: {0}")]
    Model(String),

    /// One or more fitting tasks failed.
    #[error("{0}")]
    Fitting(#[source] FitFailures),

    /// The distance-based clustering algorithm failed.
    #[error("clustering algorithm failed: {0}")]
    Clusterer(String),

    /// The worker pool could not be created.
    #[error("worker pool: {0}")]
    ThreadPool(String),
}

impl From<rayon::ThreadPoolBuildError> for Error {
    fn from(e: rayon::ThreadPoolBuildError) -> Self {
        Error::ThreadPool(e.to_string())
    }
}

/// A single failed leaf of the fitting task tree.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{element} on {category} [{attribute}]: {source}")]
pub struct FitFailure {
    /// Name of the clustered element whose runs were being modeled.
    pub element: String,
    /// Name of the run category (instance or experiment).
    pub category: String,
    /// Attribute label, see [`crate::DimensionRelationship::label`].
    pub attribute: String,
    /// What the fitting service reported.
    pub source: Box<Error>,
}

/// All leaf failures observed by a join, in submission order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FitFailures(pub Vec<FitFailure>);

impl FitFailures {
    /// Number of failed tasks.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True if nothing failed.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over failures.
    pub fn iter(&self) -> impl Iterator<Item = &FitFailure> {
        self.0.iter()
    }
}

impl fmt::Display for FitFailures {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} fitting task(s) failed", self.0.len())?;
        for failure in &self.0 {
            write!(f, "; {failure}")?;
        }
        Ok(())
    }
}

impl std::error::Error for FitFailures {
    /// The first failure in submission order.
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.0
            .first()
            .map(|f| f as &(dyn std::error::Error + 'static))
    }
}
