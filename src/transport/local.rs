//! Transport for commands that run on this machine.
use std::io::Write as _;
use std::sync::Arc;

use super::{CommandOutput, Transport};
use crate::error::ExecError;
use crate::exec::Executor;

/// Runs commands on this machine through `sh -c`, without a timeout.
#[derive(Debug, Clone)]
pub struct LocalProcessTransport {
    executor: Arc<dyn Executor>,
}

impl LocalProcessTransport {
    /// Create a transport spawning processes through `executor`.
    #[must_use]
    pub fn new(executor: Arc<dyn Executor>) -> Self {
        Self { executor }
    }
}

impl Transport for LocalProcessTransport {
    fn execute(&self, command: &str, stream: bool) -> Result<CommandOutput, ExecError> {
        let result = if stream {
            let mut echo = |chunk: &str| {
                let mut out = std::io::stdout().lock();
                out.write_all(chunk.as_bytes()).ok();
                out.flush().ok();
            };
            self.executor.run_shell(command, Some(&mut echo as &mut dyn FnMut(&str)))?
        } else {
            self.executor.run_shell(command, None)?
        };
        CommandOutput::from_exec(command, &result)
    }
}
