//! Interactive confirmation before commands with side effects.
use std::io::{self, BufRead, Write as _};
use std::sync::Mutex;

/// Asks the operator whether a command may run.
#[cfg_attr(test, mockall::automock)]
pub trait Confirm: Send + Sync + std::fmt::Debug {
    /// Return `true` to run `command`.
    fn confirm(&self, command: &str, remote: bool) -> bool;
}

/// Prompts on standard output and reads the answer from a line reader
/// (standard input in production). Anything but `y`/`yes` declines.
#[derive(Debug)]
pub struct StdinPrompt<R = io::BufReader<io::Stdin>> {
    input: Mutex<R>,
}

impl StdinPrompt {
    /// Prompt on the process's standard input.
    #[must_use]
    pub fn new() -> Self {
        Self::with_reader(io::BufReader::new(io::stdin()))
    }
}

impl Default for StdinPrompt {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: BufRead> StdinPrompt<R> {
    /// Prompt using answers read from `input`.
    pub fn with_reader(input: R) -> Self {
        Self {
            input: Mutex::new(input),
        }
    }
}

/// Whether an answer accepts the prompt; the default is no.
fn accepts(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

impl<R: BufRead + Send + std::fmt::Debug> Confirm for StdinPrompt<R> {
    fn confirm(&self, command: &str, remote: bool) -> bool {
        let mut out = io::stdout().lock();
        writeln!(out).ok();
        writeln!(out, "{command}").ok();
        writeln!(out, "(remote: {})", if remote { "yes" } else { "no" }).ok();
        write!(out, "Are you sure you want to execute: [y/N] ").ok();
        out.flush().ok();
        drop(out);

        let mut answer = String::new();
        let mut input = self
            .input
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        match input.read_line(&mut answer) {
            Ok(0) | Err(_) => false,
            Ok(_) => accepts(&answer),
        }
    }
}
