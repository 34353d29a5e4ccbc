//! Pre/post rsync commands.
use crate::config::data_store::{DataStore, is_database_invocation};
use crate::config::normalize::Hook;
use crate::logging::Log;
use crate::transport::{Dispatcher, ExecOptions, Outcome};

/// How a list of hooks ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookOutcome {
    /// Every hook ran and exited zero.
    Completed,
    /// A hook exited non-zero or could not be run.
    Failed {
        /// The rendered command.
        command: String,
    },
    /// The operator declined a hook.
    Declined {
        /// The rendered command.
        command: String,
    },
}

/// The command actually run for `hook`: local database client invocations
/// get the data-store parameters interpolated.
#[must_use]
pub fn render(hook: &Hook, data_store: &DataStore) -> String {
    if !hook.remote && is_database_invocation(&hook.command) {
        data_store.interpolate(&hook.command)
    } else {
        hook.command.clone()
    }
}

fn yes_no(remote: bool) -> &'static str {
    if remote { "yes" } else { "no" }
}

/// Run `hooks` in order, stopping at the first one that fails or is
/// declined. Output lines are echoed through `log`.
pub fn run_hooks(
    dispatcher: &Dispatcher<'_>,
    hooks: &[Hook],
    data_store: &DataStore,
    log: &dyn Log,
) -> HookOutcome {
    for hook in hooks {
        let command = render(hook, data_store);
        log.debug(&format!("running hook: {command} (remote: {})", yes_no(hook.remote)));
        match dispatcher.execute(&command, ExecOptions::confirmed(hook.remote)) {
            Ok(Outcome::Completed(output)) => {
                for line in &output.lines {
                    log.output(line);
                }
                if !output.success() {
                    log.error(&format!(
                        "Command failed with exit code {}: {command} (remote: {})",
                        output.status,
                        yes_no(hook.remote)
                    ));
                    return HookOutcome::Failed { command };
                }
            }
            Ok(Outcome::Declined) => {
                log.warn(&format!("Command declined: {command}"));
                return HookOutcome::Declined { command };
            }
            Err(e) => {
                log.error(&format!("{e} (remote: {})", yes_no(hook.remote)));
                return HookOutcome::Failed { command };
            }
        }
    }
    HookOutcome::Completed
}
