//! Command transports and the confirmation-gated dispatcher.
//!
//! A [`Transport`] runs one shell command line somewhere (the local machine
//! or the far side of a remote session) and reports its exit status and
//! output lines. The [`Dispatcher`] sits in front of a task's transports: it
//! asks for confirmation when required and routes each command by its
//! `remote` flag.
pub mod confirm;
pub mod local;
pub mod remote;

pub use confirm::{Confirm, StdinPrompt};
pub use local::LocalProcessTransport;
pub use remote::RemoteSessionTransport;

use crate::error::ExecError;
use crate::exec::ExecResult;

/// Exit status and output of a command that ran to completion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Process exit code.
    pub status: i32,
    /// Standard output split into lines after trimming; empty when the
    /// command printed nothing.
    pub lines: Vec<String>,
}

impl CommandOutput {
    /// Build from a finished process, rejecting processes without an exit
    /// code.
    ///
    /// # Errors
    ///
    /// Returns [`ExecError::Terminated`] if the process was killed by a signal.
    pub fn from_exec(command: &str, result: &ExecResult) -> Result<Self, ExecError> {
        let status = result
            .code
            .ok_or_else(|| ExecError::Terminated(command.to_string()))?;
        Ok(Self {
            status,
            lines: split_lines(&result.stdout),
        })
    }

    /// Whether the command exited with status zero.
    #[must_use]
    pub const fn success(&self) -> bool {
        self.status == 0
    }
}

/// Trim `text` and split it into lines. Empty output yields no lines.
#[must_use]
pub fn split_lines(text: &str) -> Vec<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }
    trimmed.lines().map(str::to_string).collect()
}

/// Runs shell command lines.
pub trait Transport: Send + Sync + std::fmt::Debug {
    /// Run `command`. With `stream`, output is echoed to the console as it
    /// arrives while still being collected.
    ///
    /// # Errors
    ///
    /// Returns an [`ExecError`] when the command cannot be run at all. A
    /// command that runs and exits non-zero is reported through
    /// [`CommandOutput::status`] instead.
    fn execute(&self, command: &str, stream: bool) -> Result<CommandOutput, ExecError>;
}

/// Per-command execution options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecOptions {
    /// Run through the task's remote session.
    pub remote: bool,
    /// Ask before running (skipped in force mode).
    pub confirm: bool,
    /// Echo output live.
    pub stream: bool,
}

impl ExecOptions {
    /// Options for a command that runs without confirmation.
    #[must_use]
    pub const fn quiet(remote: bool) -> Self {
        Self {
            remote,
            confirm: false,
            stream: false,
        }
    }

    /// Options for a confirmation-gated command.
    #[must_use]
    pub const fn confirmed(remote: bool) -> Self {
        Self {
            remote,
            confirm: true,
            stream: false,
        }
    }

    /// Also echo output live.
    #[must_use]
    pub const fn streamed(mut self) -> Self {
        self.stream = true;
        self
    }
}

/// Result of a dispatched command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The command ran.
    Completed(CommandOutput),
    /// The operator declined to run it.
    Declined,
}

impl Outcome {
    /// Whether the command ran and exited with status zero. A declined
    /// command is never a success.
    #[must_use]
    pub const fn success(&self) -> bool {
        matches!(self, Self::Completed(output) if output.success())
    }

    /// Output lines of a completed command.
    #[must_use]
    pub fn lines(&self) -> &[String] {
        match self {
            Self::Completed(output) => &output.lines,
            Self::Declined => &[],
        }
    }
}

/// Routes commands to the local or remote transport of one task, asking for
/// confirmation first when required.
#[derive(Debug, Clone, Copy)]
pub struct Dispatcher<'a> {
    local: &'a dyn Transport,
    remote: Option<&'a dyn Transport>,
    confirm: &'a dyn Confirm,
    force: bool,
}

impl<'a> Dispatcher<'a> {
    /// Create a dispatcher. `remote` is `None` for tasks that never touch a
    /// remote endpoint.
    #[must_use]
    pub fn new(
        local: &'a dyn Transport,
        remote: Option<&'a dyn Transport>,
        confirm: &'a dyn Confirm,
        force: bool,
    ) -> Self {
        Self {
            local,
            remote,
            confirm,
            force,
        }
    }

    /// Run `command` according to `opts`.
    ///
    /// # Errors
    ///
    /// Returns [`ExecError::Remote`] if a remote command is requested with no
    /// session, and otherwise whatever the selected transport returns.
    pub fn execute(&self, command: &str, opts: ExecOptions) -> Result<Outcome, ExecError> {
        let transport = if opts.remote {
            self.remote.ok_or_else(|| ExecError::Remote {
                command: command.to_string(),
                message: "no remote session for this task".to_string(),
            })?
        } else {
            self.local
        };

        if opts.confirm && !self.force && !self.confirm.confirm(command, opts.remote) {
            return Ok(Outcome::Declined);
        }

        transport
            .execute(command, opts.stream)
            .map(Outcome::Completed)
    }
}
