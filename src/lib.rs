//! Batch runner for declarative rsync tasks.
//!
//! A YAML document lists tasks, each pairing a source with a destination plus
//! optional pre/post commands. Tasks run in order and steps with side effects
//! ask for confirmation unless forced. Remote steps share one authenticated
//! SSH control master per endpoint. Destinations may keep dated snapshots
//! hard-linked against each other.
//!
//! The public API is organised into these layers:
//!
//! - **[`config`]**: locate, parse and normalize the task document
//! - **[`transport`]** and **[`session`]**: run commands locally or over SSH
//! - **[`rotation`]**: dated snapshot naming, linking and pruning
//! - **[`tasks`]**: the per-task runner and its shared context
//! - **[`commands`]**: top-level orchestration behind the CLI
#![deny(clippy::or_fun_call)]
#![deny(clippy::bool_to_int_with_if)]

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod exec;
pub mod logging;
pub mod operations;
pub mod rotation;
pub mod session;
pub mod tasks;
pub mod transport;
