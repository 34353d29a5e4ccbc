//! Shared state handed to every task: log, transports, connector, options.
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use chrono::NaiveDateTime;

use crate::config::data_store::DataStore;
use crate::logging::Log;
use crate::operations::{FileSystemOps, SystemFileSystemOps};
use crate::session::Connector;
use crate::transport::{Confirm, Transport};

/// Run-wide switches taken from the command line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Run every command without asking.
    pub force: bool,
    /// Only run the task with this name.
    pub task_filter: Option<String>,
    /// Skip pre and post hooks entirely.
    pub disable_hooks: bool,
}

impl RunOptions {
    /// Whether a task named `name` is selected by the `--task` filter.
    #[must_use]
    pub fn selects(&self, name: Option<&str>) -> bool {
        self.task_filter
            .as_deref()
            .is_none_or(|wanted| name == Some(wanted))
    }
}

/// Source of the current local time.
pub type Clock = fn() -> NaiveDateTime;

/// The local wall-clock time.
#[must_use]
pub fn local_now() -> NaiveDateTime {
    chrono::Local::now().naive_local()
}

/// Shared context for task execution.
pub struct Context {
    /// Logger for output and task recording.
    pub log: Arc<dyn Log>,
    /// Transport for commands on this machine.
    pub local: Arc<dyn Transport>,
    /// Source of remote transports.
    pub connector: Arc<dyn Connector>,
    /// Confirmation prompt.
    pub confirm: Arc<dyn Confirm>,
    /// Connection parameters interpolated into database hooks.
    pub data_store: DataStore,
    /// Command-line switches.
    pub options: RunOptions,
    /// User's home directory path.
    pub home: PathBuf,
    /// Filesystem operation abstraction (injectable for testing).
    pub fs_ops: Arc<dyn FileSystemOps>,
    /// Clock used for snapshot names.
    pub clock: Clock,
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("log", &"<dyn Log>")
            .field("local", &self.local)
            .field("connector", &self.connector)
            .field("data_store", &self.data_store)
            .field("options", &self.options)
            .field("home", &self.home)
            .field("fs_ops", &"<dyn FileSystemOps>")
            .finish_non_exhaustive()
    }
}

impl Context {
    /// Creates a new context for a run.
    ///
    /// # Errors
    ///
    /// Returns an error if the `HOME` environment variable is not set.
    pub fn new(
        log: Arc<dyn Log>,
        local: Arc<dyn Transport>,
        connector: Arc<dyn Connector>,
        confirm: Arc<dyn Confirm>,
        options: RunOptions,
    ) -> Result<Self> {
        let home = std::env::var("HOME")
            .map_err(|_| anyhow::anyhow!("HOME environment variable is not set"))?;

        Ok(Self {
            log,
            local,
            connector,
            confirm,
            data_store: DataStore::from_env(),
            options,
            home: PathBuf::from(home),
            fs_ops: Arc::new(SystemFileSystemOps),
            clock: local_now,
        })
    }

    /// Create a copy of this context with a different [`FileSystemOps`] implementation.
    #[cfg(test)]
    #[must_use]
    pub fn with_fs_ops(self, fs_ops: Arc<dyn FileSystemOps>) -> Self {
        Self { fs_ops, ..self }
    }

    /// Create a copy of this context with different data-store parameters.
    #[cfg(test)]
    #[must_use]
    pub fn with_data_store(self, data_store: DataStore) -> Self {
        Self { data_store, ..self }
    }
}
