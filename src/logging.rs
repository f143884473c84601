//! Milestone logging.

/// Receives coarse progress milestones. Passing no logger only silences them.
pub trait Logger: Send + Sync {
    /// Record one milestone.
    fn log(&self, message: &str);
}

/// Forwards milestones to `tracing` at info level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn log(&self, message: &str) {
        tracing::info!(target: "kin", "{message}");
    }
}

/// Log through `logger` when there is one.
#[inline]
pub(crate) fn milestone(logger: Option<&dyn Logger>, message: impl FnOnce() -> String) {
    if let Some(logger) = logger {
        logger.log(&message());
    }
}
