//! Run a task document.
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context as _, Result};

use crate::cli::Cli;
use crate::config::{self, Document, Located};
use crate::error::RunnerError;
use crate::exec::{Executor, SystemExecutor};
use crate::logging::{Log, Logger};
use crate::operations::SystemFileSystemOps;
use crate::session::{Connector, SessionManager};
use crate::tasks::{self, Context};
use crate::transport::{LocalProcessTransport, StdinPrompt};

/// Exit status used when the run is interrupted with Ctrl-C.
const INTERRUPTED_EXIT_CODE: i32 = 130;

/// Load the task document and run every selected task.
///
/// # Errors
///
/// Returns an error if the document cannot be found or parsed, a definition
/// is invalid, or any task did not succeed.
pub fn run(cli: &Cli, log: &Arc<Logger>) -> Result<()> {
    let started = Instant::now();
    let version = option_env!("RSYNC_RUNNER_VERSION").unwrap_or(env!("CARGO_PKG_VERSION"));
    log.debug(&format!("rsync-runner {version}"));

    let executor: Arc<dyn Executor> = Arc::new(SystemExecutor);
    if !executor.which("rsync") {
        log.warn("rsync not found on PATH");
    }

    let cwd = std::env::current_dir().context("unable to determine working directory")?;
    let located = config::locate(cli.file.as_deref(), &cwd).map_err(RunnerError::from)?;
    if let Located::Fallback { requested, path } = &located {
        log.warn(&format!(
            "{} not found, using {}",
            requested.display(),
            path.display()
        ));
    }
    let doc = Document::load(located.path()).map_err(RunnerError::from)?;
    log.debug(&format!(
        "{} task(s) in {}",
        doc.tasks.len(),
        doc.path.display()
    ));

    let sessions = Arc::new(
        SessionManager::new(Arc::clone(&executor), Arc::new(SystemFileSystemOps))
            .context("unable to create the session socket directory")?,
    );
    let interrupted = Arc::clone(&sessions);
    ctrlc::set_handler(move || {
        interrupted.close_all();
        std::process::exit(INTERRUPTED_EXIT_CODE);
    })
    .context("unable to install the interrupt handler")?;

    let ctx = Context::new(
        Arc::clone(log) as Arc<dyn Log>,
        Arc::new(LocalProcessTransport::new(Arc::clone(&executor))),
        Arc::clone(&sessions) as Arc<dyn Connector>,
        Arc::new(StdinPrompt::new()),
        cli.run_options(),
    )?;

    let result = tasks::run_document(&ctx, &doc, &cli.overrides());
    sessions.close_all();
    let summary = result.map_err(RunnerError::from)?;

    log.print_summary();
    log.info(&format!(
        "Done. Script execution time {:.2}s",
        started.elapsed().as_secs_f64()
    ));

    let failures = summary.failures();
    if failures > 0 {
        anyhow::bail!("{failures} task(s) did not succeed");
    }
    Ok(())
}
