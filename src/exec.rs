//! Child process execution.
//!
//! [`Executor`] is the seam between the runner and the operating system:
//! the local transport and the session manager both go through it, so tests
//! can substitute a recording implementation.
use std::io::{self, Read, Write as _};
use std::process::{Command, Output, Stdio};

use crate::error::ExecError;

/// Result of a command execution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecResult {
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
    /// Whether the process exited with status zero.
    pub success: bool,
    /// Exit code, `None` when the process was killed by a signal.
    pub code: Option<i32>,
}

impl From<Output> for ExecResult {
    fn from(output: Output) -> Self {
        Self {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            success: output.status.success(),
            code: output.status.code(),
        }
    }
}

/// Callback receiving output chunks as they are read from a running process.
pub type OutputSink<'a> = &'a mut dyn FnMut(&str);

/// Abstraction over process execution.
pub trait Executor: Send + Sync + std::fmt::Debug {
    /// Run `program` with `args`, returning its result whatever the exit code.
    ///
    /// # Errors
    ///
    /// Returns [`ExecError::Spawn`] if the program cannot be started.
    fn run_unchecked(&self, program: &str, args: &[&str]) -> Result<ExecResult, ExecError>;

    /// Run a shell command line through `sh -c` with no timeout.
    ///
    /// Standard output is drained incrementally; every chunk is handed to
    /// `sink` (when given) before being accumulated into the result. When a
    /// sink is given, standard error is echoed live as well.
    ///
    /// # Errors
    ///
    /// Returns [`ExecError::Spawn`] if the shell cannot be started or its
    /// output cannot be read.
    fn run_shell(&self, command: &str, sink: Option<OutputSink<'_>>)
    -> Result<ExecResult, ExecError>;

    /// Check if a program is available on `PATH`.
    fn which(&self, program: &str) -> bool;
}

/// Production [`Executor`] backed by [`std::process::Command`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemExecutor;

fn spawn_error(command: &str, source: io::Error) -> ExecError {
    ExecError::Spawn {
        command: command.to_string(),
        source,
    }
}

/// Read `reader` to the end, forwarding each chunk to `sink`.
fn drain(reader: &mut impl Read, mut sink: Option<OutputSink<'_>>) -> io::Result<Vec<u8>> {
    let mut collected = Vec::new();
    let mut chunk = [0u8; 8192];
    loop {
        let n = match reader.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        let data = chunk.get(..n).unwrap_or_default();
        if let Some(sink) = sink.as_mut() {
            sink(&String::from_utf8_lossy(data));
        }
        collected.extend_from_slice(data);
    }
    Ok(collected)
}

impl Executor for SystemExecutor {
    fn run_unchecked(&self, program: &str, args: &[&str]) -> Result<ExecResult, ExecError> {
        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| spawn_error(program, e))?;
        Ok(ExecResult::from(output))
    }

    fn run_shell(
        &self,
        command: &str,
        sink: Option<OutputSink<'_>>,
    ) -> Result<ExecResult, ExecError> {
        let mut child = Command::new("sh")
            .arg("-c")
            .arg(command)
            .stdin(Stdio::inherit())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| spawn_error(command, e))?;

        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| spawn_error(command, io::Error::other("stdout was not captured")))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| spawn_error(command, io::Error::other("stderr was not captured")))?;
        let echo_stderr = sink.is_some();

        // Both pipes must drain concurrently; stderr gets a scoped thread.
        let (out, err) = std::thread::scope(|scope| {
            let handle = scope.spawn(move || {
                let mut echo = |chunk: &str| {
                    let mut handle = io::stderr().lock();
                    handle.write_all(chunk.as_bytes()).ok();
                    handle.flush().ok();
                };
                let sink: Option<OutputSink<'_>> = if echo_stderr {
                    Some(&mut echo as &mut dyn FnMut(&str))
                } else {
                    None
                };
                drain(&mut stderr, sink)
            });
            let out = drain(&mut stdout, sink);
            let err = handle
                .join()
                .unwrap_or_else(|_| Err(io::Error::other("stderr reader panicked")));
            (out, err)
        });

        let status = child.wait().map_err(|e| spawn_error(command, e))?;
        let stdout = out.map_err(|e| spawn_error(command, e))?;
        let stderr = err.map_err(|e| spawn_error(command, e))?;

        Ok(ExecResult {
            stdout: String::from_utf8_lossy(&stdout).to_string(),
            stderr: String::from_utf8_lossy(&stderr).to_string(),
            success: status.success(),
            code: status.code(),
        })
    }

    fn which(&self, program: &str) -> bool {
        which::which(program).is_ok()
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn run_shell_captures_stdout() {
        let result = SystemExecutor.run_shell("echo hello", None).unwrap();
        assert!(result.success, "echo should succeed");
        assert_eq!(result.code, Some(0));
        assert_eq!(result.stdout.trim(), "hello");
    }

    #[test]
    fn run_shell_reports_exit_code() {
        let result = SystemExecutor.run_shell("exit 3", None).unwrap();
        assert!(!result.success);
        assert_eq!(result.code, Some(3));
    }

    #[test]
    fn run_shell_captures_stderr_separately() {
        let result = SystemExecutor
            .run_shell("echo out; echo err 1>&2", None)
            .unwrap();
        assert_eq!(result.stdout.trim(), "out");
        assert_eq!(result.stderr.trim(), "err");
    }

    #[test]
    fn run_shell_streams_to_sink_and_still_accumulates() {
        let mut streamed = String::new();
        let mut sink = |chunk: &str| streamed.push_str(chunk);
        let result = SystemExecutor
            .run_shell("printf 'a\\nb\\n'", Some(&mut sink))
            .unwrap();
        assert_eq!(streamed, "a\nb\n");
        assert_eq!(result.stdout, "a\nb\n");
    }

    #[test]
    fn run_shell_drains_large_stderr_without_blocking() {
        let result = SystemExecutor
            .run_shell("head -c 200000 /dev/zero | tr '\\0' x 1>&2; echo done", None)
            .unwrap();
        assert_eq!(result.stdout.trim(), "done");
        assert_eq!(result.stderr.len(), 200_000);
    }

    #[test]
    fn run_unchecked_failure() {
        let result = SystemExecutor.run_unchecked("false", &[]).unwrap();
        assert!(!result.success, "non-zero exit should set success=false");
    }

    #[test]
    fn run_unchecked_missing_program_is_spawn_error() {
        let err = SystemExecutor
            .run_unchecked("this-program-does-not-exist-12345", &[])
            .unwrap_err();
        assert!(matches!(err, ExecError::Spawn { .. }));
    }

    #[test]
    fn which_finds_known_program() {
        assert!(SystemExecutor.which("sh"), "sh should be found on Unix");
    }

    #[test]
    fn which_missing_program() {
        assert!(!SystemExecutor.which("this-program-does-not-exist-12345"));
    }
}
