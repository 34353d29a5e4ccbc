//! Command-line interface.
use std::path::PathBuf;

use clap::Parser;

use crate::config::normalize::Overrides;
use crate::tasks::RunOptions;

/// Run the rsync tasks described in a YAML document.
#[derive(Parser, Debug)]
#[command(
    name = "rsync-runner",
    about = "Batch runner for declarative rsync tasks with snapshot rotation",
    version = option_env!("RSYNC_RUNNER_VERSION").unwrap_or(env!("CARGO_PKG_VERSION"))
)]
pub struct Cli {
    /// Task document (defaults to ./rsync.yml)
    pub file: Option<PathBuf>,

    /// Run every command without asking for confirmation
    #[arg(short, long)]
    pub force: bool,

    /// Only run the task with this name
    #[arg(short, long, value_name = "NAME")]
    pub task: Option<String>,

    /// Skip pre- and post-rsync commands
    #[arg(long = "disable-pre-post")]
    pub disable_pre_post: bool,

    /// Override the number of snapshots kept by every task
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u32).range(1..))]
    pub copies: Option<u32>,

    /// Override every destination path (placeholders :config-stem and :task-name)
    #[arg(long = "dest-path", value_name = "TEMPLATE")]
    pub dest_path: Option<String>,

    /// Show debug output and pass -v to rsync
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Run-wide switches for the task runner.
    #[must_use]
    pub fn run_options(&self) -> RunOptions {
        RunOptions {
            force: self.force,
            task_filter: self.task.clone(),
            disable_hooks: self.disable_pre_post,
        }
    }

    /// Per-task overrides applied during normalization.
    #[must_use]
    pub fn overrides(&self) -> Overrides {
        Overrides {
            copies: self.copies,
            dest_path: self.dest_path.clone(),
            verbose: self.verbose,
        }
    }
}
