//! Per-task state machine and the document driver.
//!
//! A task moves through connect, pre-hooks, destination preparation, sync,
//! prune and post-hooks. Every failure is scoped to its task; only fatal
//! document errors end the run early.
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::context::Context;
use super::hooks::{HookOutcome, run_hooks};
use super::sync;
use crate::config::Document;
use crate::config::normalize::{Normalizer, Overrides, ResolvedPlan, task_label};
use crate::config::template::quote_path;
use crate::error::ConfigError;
use crate::logging::{TaskStatus, horizontal_rule};
use crate::rotation;
use crate::transport::{Dispatcher, ExecOptions, Outcome, Transport};

/// Result of one task, as recorded in the summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskReport {
    /// Task name, `(unnamed)` when the definition has none.
    pub name: String,
    /// Final status.
    pub status: TaskStatus,
    /// Short reason for a non-ok status.
    pub message: Option<String>,
    /// Wall time spent on the task.
    pub elapsed: Duration,
}

/// Reports of every task that ran, in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// One report per selected task.
    pub reports: Vec<TaskReport>,
    /// Wall time of the whole document.
    pub elapsed: Duration,
}

impl RunSummary {
    /// Count the tasks that did not succeed.
    #[must_use]
    pub fn failures(&self) -> usize {
        self.reports
            .iter()
            .filter(|r| r.status.is_failure())
            .count()
    }
}

/// Run every selected task of `doc` in order.
///
/// # Errors
///
/// Returns a fatal [`ConfigError`] raised while normalizing a definition.
/// Task-scoped errors are reported and the run continues.
pub fn run_document(
    ctx: &Context,
    doc: &Document,
    overrides: &Overrides,
) -> Result<RunSummary, ConfigError> {
    let started = Instant::now();
    let normalizer = Normalizer::new(&doc.path, &ctx.home, overrides, ctx.fs_ops.as_ref());
    let mut reports = Vec::new();

    for (index, def) in doc.tasks.iter().enumerate() {
        let name = def.name.as_deref().filter(|n| !n.is_empty());
        if !ctx.options.selects(name) {
            ctx.log
                .debug(&format!("skipping task {}: not selected", def.label(index)));
            continue;
        }

        match normalizer.normalize(def, index) {
            Ok(plan) => reports.push(run_task(ctx, &plan)),
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                let task_started = Instant::now();
                let label = task_label(name);
                start(ctx, &label);
                ctx.log.error(&format!("{e}"));
                let report = TaskReport {
                    name: name.unwrap_or("(unnamed)").to_string(),
                    status: TaskStatus::Failed,
                    message: Some(e.to_string()),
                    elapsed: task_started.elapsed(),
                };
                finish(ctx, &label, &report);
                reports.push(report);
            }
        }
    }

    Ok(RunSummary {
        reports,
        elapsed: started.elapsed(),
    })
}

/// Run one resolved task and record its outcome.
pub fn run_task(ctx: &Context, plan: &ResolvedPlan) -> TaskReport {
    let started = Instant::now();
    let label = plan.label();
    start(ctx, &label);

    let (status, message) = execute(ctx, plan);
    let report = TaskReport {
        name: plan.display_name().to_string(),
        status,
        message,
        elapsed: started.elapsed(),
    };
    finish(ctx, &label, &report);
    report
}

fn start(ctx: &Context, label: &str) {
    ctx.log.info(&horizontal_rule());
    ctx.log.stage(&format!("Rsync task {label}started"));
}

fn finish(ctx: &Context, label: &str, report: &TaskReport) {
    ctx.log.stage(&format!(
        "Rsync task {label}finished in {:.2}s",
        report.elapsed.as_secs_f64()
    ));
    ctx.log.record_task(
        &report.name,
        report.status,
        report.message.as_deref(),
        report.elapsed,
    );
}

fn hook_status(outcome: &HookOutcome) -> (TaskStatus, Option<String>) {
    match outcome {
        HookOutcome::Completed => (TaskStatus::Ok, None),
        HookOutcome::Failed { command } => (TaskStatus::Failed, Some(format!("{command} failed"))),
        HookOutcome::Declined { command } => {
            (TaskStatus::Declined, Some(format!("{command} declined")))
        }
    }
}

fn execute(ctx: &Context, plan: &ResolvedPlan) -> (TaskStatus, Option<String>) {
    let name = plan.display_name();

    let remote: Option<Arc<dyn Transport>> = if plan.needs_remote() {
        match ctx.connector.connect(&plan.ssh) {
            Ok(transport) => Some(transport),
            Err(e) => {
                ctx.log.error(&format!(
                    "Task: {name}; Unable to ssh connect, continue with another task."
                ));
                ctx.log.error(&format!("{e}"));
                return (TaskStatus::Unreachable, Some(e.to_string()));
            }
        }
    } else {
        None
    };
    let dispatcher = Dispatcher::new(
        ctx.local.as_ref(),
        remote.as_deref(),
        ctx.confirm.as_ref(),
        ctx.options.force,
    );

    if !ctx.options.disable_hooks {
        let outcome = run_hooks(&dispatcher, &plan.pre_hooks, &ctx.data_store, ctx.log.as_ref());
        if outcome != HookOutcome::Completed {
            ctx.log.error(&format!(
                "Pre rsync command(s) {name} failed, continue with another task."
            ));
            return hook_status(&outcome);
        }
    }

    let mkdir = format!("mkdir -p {}", quote_path(&plan.dest.path));
    match dispatcher.execute(&mkdir, ExecOptions::quiet(plan.dest.remote)) {
        Ok(outcome) if outcome.success() => {}
        Ok(_) => ctx
            .log
            .warn(&format!("unable to create destination {}", plan.dest.path)),
        Err(e) => ctx.log.warn(&format!("{e}")),
    }

    let rotation = plan
        .rotates()
        .then(|| rotation::prepare(&dispatcher, &plan.dest, (ctx.clock)(), ctx.log.as_ref()));
    let dest_path = rotation
        .as_ref()
        .map_or(plan.dest.path.as_str(), |r| r.snapshot_path.as_str());
    let command = sync::command(
        plan,
        dest_path,
        rotation.as_ref().and_then(|r| r.link_dest.as_deref()),
    );

    let (mut status, mut message) = match dispatcher
        .execute(&command, ExecOptions::confirmed(false).streamed())
    {
        Ok(Outcome::Completed(output)) if output.success() => {
            if let Some(rotation) = &rotation {
                rotation::prune(&dispatcher, &plan.dest, &rotation.listing, ctx.log.as_ref());
            }
            (TaskStatus::Ok, None)
        }
        Ok(Outcome::Completed(output)) => {
            ctx.log.error(&format!(
                "Rsync {name} failed. Exit code {}.",
                output.status
            ));
            (
                TaskStatus::Failed,
                Some(format!("rsync exit code {}", output.status)),
            )
        }
        Ok(Outcome::Declined) => {
            ctx.log.warn(&format!("Rsync {name} declined."));
            (TaskStatus::Declined, Some("sync declined".to_string()))
        }
        Err(e) => {
            ctx.log.error(&format!("Rsync {name} failed. {e}"));
            (TaskStatus::Failed, Some(e.to_string()))
        }
    };

    if !ctx.options.disable_hooks {
        let outcome = run_hooks(&dispatcher, &plan.post_hooks, &ctx.data_store, ctx.log.as_ref());
        if outcome != HookOutcome::Completed {
            ctx.log.error(&format!(
                "Post rsync command(s) {name} failed, continue with another task."
            ));
            if status == TaskStatus::Ok {
                (status, message) = hook_status(&outcome);
            }
        }
    }

    (status, message)
}
