//! Domain-specific error types for the task runner.
//!
//! Internal modules return typed errors built with [`thiserror`] while the
//! binary converts them to [`anyhow::Error`] at the CLI boundary via `?`.
//!
//! # Error hierarchy
//!
//! ```text
//! RunnerError
//! ├── Config(ConfigError)  : document lookup, parsing, normalization
//! ├── Session(SessionError): remote endpoint validation and authentication
//! └── Exec(ExecError)      : process spawn and transport faults
//! ```
//!
//! Only [`ConfigError`] values for which [`ConfigError::is_fatal`] returns
//! `true` abort a whole run; everything else is scoped to a single task.

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type for the runner.
#[derive(Error, Debug)]
pub enum RunnerError {
    /// Configuration-related error.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Remote session error.
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// Command execution error.
    #[error("Execution error: {0}")]
    Exec(#[from] ExecError),
}

/// Errors that arise while locating, parsing, or normalizing the config document.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Neither the requested file nor the default `rsync.yml` exists.
    #[error("Missing rsync.yml file with config (looked for {})", .0.display())]
    MissingConfig(PathBuf),

    /// The document could not be parsed.
    #[error("Unable to parse the YAML document {}: {message}", path.display())]
    Parse {
        /// Path of the document.
        path: PathBuf,
        /// Parser message.
        message: String,
    },

    /// A task definition has no `src`.
    #[error("Missing rsync src (source) config in task {task}")]
    MissingSource {
        /// Task name, or its position in the document when unnamed.
        task: String,
    },

    /// `dest.copies` (or the `--copies` override) is zero.
    #[error("Invalid copies value {copies} in task {task}: must be at least 1")]
    InvalidCopies {
        /// Task name, or its position in the document when unnamed.
        task: String,
        /// The rejected value.
        copies: u32,
    },

    /// A `:latest` source path could not be resolved to a directory.
    #[error("Unable to resolve :latest in {path}: {reason}")]
    LatestUnresolved {
        /// The unresolved source path.
        path: String,
        /// Why resolution failed.
        reason: String,
    },

    /// An I/O error occurred while reading the document.
    #[error("IO error reading config file {}: {source}", path.display())]
    Io {
        /// Path to the file that could not be read.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}

impl ConfigError {
    /// Whether this error must abort the whole run rather than a single task.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        !matches!(self, Self::LatestUnresolved { .. })
    }
}

/// Errors that arise when establishing or using a remote session.
#[derive(Error, Debug)]
pub enum SessionError {
    /// A required `ssh` field is absent (or the key file does not exist).
    #[error("Missing SSH {0}")]
    MissingEndpointField(&'static str),

    /// Key-based authentication was rejected or the host was unreachable.
    #[error("SSH login to {destination} failed: {message}")]
    AuthenticationFailed {
        /// `user@host:port` of the endpoint.
        destination: String,
        /// Message reported by the ssh client.
        message: String,
    },

    /// The ssh client could not be run.
    #[error("Unable to run ssh for {destination}: {source}")]
    Exec {
        /// `user@host:port` of the endpoint.
        destination: String,
        /// Underlying execution error.
        source: ExecError,
    },
}

/// Errors that arise when a command cannot be executed at all.
///
/// A command that runs and exits non-zero is *not* an error; it is reported
/// through its exit status instead.
#[derive(Error, Debug)]
pub enum ExecError {
    /// The process could not be spawned or waited on.
    #[error("Unable to execute local command: {command}; Message: {source}")]
    Spawn {
        /// The command line.
        command: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The process was terminated by a signal and has no exit code.
    #[error("Command terminated by signal: {0}")]
    Terminated(String),

    /// The remote transport failed while running a command.
    #[error("Unable to execute SSH command: {command}; Message: {message}")]
    Remote {
        /// The command line.
        command: String,
        /// Reason reported by the transport.
        message: String,
    },
}
