//! Core logging types: task entries, status, and the [`Log`] trait.
use std::time::Duration;

/// Task execution result for summary reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskEntry {
    /// Task name, `(unnamed)` for tasks without one.
    pub name: String,
    /// Final status of the task.
    pub status: TaskStatus,
    /// Optional detail message (e.g., the failing command).
    pub message: Option<String>,
    /// Wall-clock time spent on the task.
    pub elapsed: Duration,
}

/// Status of a completed task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    /// Hooks and sync all succeeded.
    Ok,
    /// A hook or the sync failed, or a command could not be run.
    Failed,
    /// The operator declined a confirmation-gated step.
    Declined,
    /// The remote endpoint could not be connected to.
    Unreachable,
}

impl TaskStatus {
    /// Whether this status counts against the run's exit code.
    #[must_use]
    pub const fn is_failure(self) -> bool {
        !matches!(self, Self::Ok)
    }
}

/// Abstraction over logging backends.
///
/// [`Logger`](super::logger::Logger) routes everything through `tracing`;
/// tests substitute a capturing implementation.
pub trait Log: Send + Sync {
    /// Log a stage header (task banners).
    fn stage(&self, msg: &str);
    /// Log an informational message.
    fn info(&self, msg: &str);
    /// Log a debug message (may be suppressed on console).
    fn debug(&self, msg: &str);
    /// Log a warning message.
    fn warn(&self, msg: &str);
    /// Log an error message.
    fn error(&self, msg: &str);
    /// Echo one line of command output.
    fn output(&self, line: &str);
    /// Record a task result for the summary.
    fn record_task(
        &self,
        name: &str,
        status: TaskStatus,
        message: Option<&str>,
        elapsed: Duration,
    );
}
