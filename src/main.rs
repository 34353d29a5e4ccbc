//! `rsync-runner` binary entry point.
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;

use rsync_runner::{cli, commands, logging};

fn main() -> Result<()> {
    let _ = enable_ansi_support::enable_ansi_support();
    let args = cli::Cli::parse();
    logging::init_subscriber(args.verbose, "run");
    let log = Arc::new(logging::Logger::new("run"));
    commands::run::run(&args, &log)
}
