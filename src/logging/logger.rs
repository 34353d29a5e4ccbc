//! Structured logger with summary collection.
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use super::subscriber::{OUTPUT_TARGET, STAGE_TARGET};
use super::types::{Log, TaskEntry, TaskStatus};
use super::utils::{horizontal_rule, log_file_path};

/// Implement the display methods of [`Log`] by delegating to inherent methods
/// of the same name on the implementing type.
macro_rules! forward_log_methods {
    ($($method:ident),+ $(,)?) => {
        $(
            fn $method(&self, msg: &str) {
                self.$method(msg);
            }
        )+
    };
}

/// Logger routing messages through `tracing` and collecting task results.
///
/// All messages are also written to `$XDG_CACHE_HOME/rsync-runner/<command>.log`
/// (default `~/.cache/rsync-runner/<command>.log`) by the file layer installed
/// in [`init_subscriber`](super::subscriber::init_subscriber).
#[derive(Debug)]
pub struct Logger {
    tasks: Mutex<Vec<TaskEntry>>,
    log_file: Option<PathBuf>,
}

impl Logger {
    /// Create a new logger. The log file itself is created by the subscriber.
    #[must_use]
    pub fn new(command: &str) -> Self {
        Self {
            tasks: Mutex::new(Vec::new()),
            log_file: log_file_path(command),
        }
    }

    /// Return the log file path, if available.
    #[must_use]
    pub const fn log_path(&self) -> Option<&PathBuf> {
        self.log_file.as_ref()
    }

    /// Return a clone of all recorded task entries.
    #[must_use]
    pub fn task_entries(&self) -> Vec<TaskEntry> {
        self.tasks.lock().map_or_else(|_| vec![], |g| g.clone())
    }

    /// Log an error message.
    pub fn error(&self, msg: &str) {
        tracing::error!("{msg}");
    }

    /// Log a warning message.
    pub fn warn(&self, msg: &str) {
        tracing::warn!("{msg}");
    }

    /// Log a task banner.
    pub fn stage(&self, msg: &str) {
        tracing::info!(target: STAGE_TARGET, "{msg}");
    }

    /// Log an informational message.
    pub fn info(&self, msg: &str) {
        tracing::info!("{msg}");
    }

    /// Log a debug message (suppressed on console unless verbose; always
    /// written to the log file).
    pub fn debug(&self, msg: &str) {
        tracing::debug!("{msg}");
    }

    /// Echo one line of command output.
    pub fn output(&self, msg: &str) {
        tracing::info!(target: OUTPUT_TARGET, "{msg}");
    }

    /// Record a task result for the summary.
    pub fn record_task(
        &self,
        name: &str,
        status: TaskStatus,
        message: Option<&str>,
        elapsed: Duration,
    ) {
        if let Ok(mut guard) = self.tasks.lock() {
            guard.push(TaskEntry {
                name: name.to_string(),
                status,
                message: message.map(String::from),
                elapsed,
            });
        }
    }

    /// Print the summary of all recorded tasks.
    pub fn print_summary(&self) {
        let tasks = self.task_entries();
        if tasks.is_empty() {
            return;
        }

        self.info(&horizontal_rule());
        self.stage("Summary");

        let mut ok = 0u32;
        let mut failed = 0u32;
        let mut declined = 0u32;
        let mut unreachable = 0u32;

        for task in &tasks {
            let (icon, color) = match task.status {
                TaskStatus::Ok => {
                    ok += 1;
                    ("✓", "\x1b[32m")
                }
                TaskStatus::Failed => {
                    failed += 1;
                    ("✗", "\x1b[31m")
                }
                TaskStatus::Declined => {
                    declined += 1;
                    ("○", "\x1b[33m")
                }
                TaskStatus::Unreachable => {
                    unreachable += 1;
                    ("!", "\x1b[31m")
                }
            };

            let suffix = task
                .message
                .as_ref()
                .map_or_else(String::new, |msg| format!(" ({msg})"));

            self.info(&format!(
                "{color}{icon} {} {:.2}s{suffix}\x1b[0m",
                task.name,
                task.elapsed.as_secs_f64()
            ));
        }

        let total = ok + failed + declined + unreachable;
        self.info(&format!(
            "{total} tasks: \x1b[32m{ok} ok\x1b[0m, \x1b[31m{failed} failed\x1b[0m, \x1b[33m{declined} declined\x1b[0m, \x1b[31m{unreachable} unreachable\x1b[0m"
        ));

        if let Some(path) = &self.log_file {
            self.info(&format!("\x1b[2mlog: {}\x1b[0m", path.display()));
        }
    }
}

impl Log for Logger {
    forward_log_methods!(stage, info, debug, warn, error, output);

    fn record_task(
        &self,
        name: &str,
        status: TaskStatus,
        message: Option<&str>,
        elapsed: Duration,
    ) {
        self.record_task(name, status, message, elapsed);
    }
}
