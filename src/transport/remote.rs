//! Transport for commands that run on the far side of a remote session.
use std::io::Write as _;
use std::sync::Arc;

use super::{CommandOutput, Transport};
use crate::error::ExecError;
use crate::exec::Executor;
use crate::session::Session;

/// Exit status `ssh` uses for its own failures.
const SSH_FAILURE_STATUS: i32 = 255;

/// Runs commands through an established [`Session`].
#[derive(Debug, Clone)]
pub struct RemoteSessionTransport {
    session: Arc<Session>,
    executor: Arc<dyn Executor>,
}

impl RemoteSessionTransport {
    /// Create a transport bound to `session`.
    #[must_use]
    pub fn new(session: Arc<Session>, executor: Arc<dyn Executor>) -> Self {
        Self { session, executor }
    }
}

impl Transport for RemoteSessionTransport {
    fn execute(&self, command: &str, stream: bool) -> Result<CommandOutput, ExecError> {
        let args = self.session.command_args(command);
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        let result = self
            .executor
            .run_unchecked("ssh", &args)
            .map_err(|e| ExecError::Remote {
                command: command.to_string(),
                message: e.to_string(),
            })?;

        if result.code == Some(SSH_FAILURE_STATUS) {
            return Err(ExecError::Remote {
                command: command.to_string(),
                message: result.stderr.trim().to_string(),
            });
        }
        if stream && !result.stdout.is_empty() {
            let mut out = std::io::stdout().lock();
            out.write_all(result.stdout.as_bytes()).ok();
            out.flush().ok();
        }
        CommandOutput::from_exec(command, &result)
    }
}
