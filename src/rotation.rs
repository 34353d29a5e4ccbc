//! Dated snapshot rotation with hard-link deduplication.
//!
//! When a destination keeps more than one copy, every run syncs into a fresh
//! `YYMMDD_HHMMSS/` directory beneath the base destination, hard-linking
//! unchanged files against the newest existing snapshot via `--link-dest`.
//! After a successful sync the oldest snapshots are removed so that exactly
//! `copies` remain, the new one included.
use chrono::NaiveDateTime;

use crate::config::normalize::Destination;
use crate::config::template::{quote_path, shell_quote};
use crate::logging::Log;
use crate::transport::{Dispatcher, ExecOptions, Outcome};

/// `strftime` format of snapshot directory names.
pub const SNAPSHOT_FORMAT: &str = "%y%m%d_%H%M%S";

/// Name of a snapshot taken at `at`.
#[must_use]
pub fn snapshot_name(at: NaiveDateTime) -> String {
    at.format(SNAPSHOT_FORMAT).to_string()
}

/// `<base>/<name>/`.
#[must_use]
pub fn snapshot_path(base: &str, name: &str) -> String {
    format!("{}/{name}/", base.trim_end_matches('/'))
}

/// Shell command listing the immediate subdirectories of `base`.
#[must_use]
pub fn list_command(base: &str) -> String {
    format!("cd {} && ls -1d */ 2>/dev/null", quote_path(base))
}

/// Shell command removing the snapshot `name` beneath `base`.
#[must_use]
pub fn remove_command(base: &str, name: &str) -> String {
    format!("rm -Rf {}", quote_path(&snapshot_path(base, name)))
}

/// Directory names from an `ls -1d */` listing, sorted ascending.
#[must_use]
pub fn parse_listing(lines: &[String]) -> Vec<String> {
    let mut names: Vec<String> = lines
        .iter()
        .map(|line| line.trim().trim_end_matches('/').to_string())
        .filter(|name| !name.is_empty())
        .collect();
    names.sort();
    names
}

/// `--link-dest` flag pointing at the newest existing snapshot, relative to
/// the new snapshot directory.
#[must_use]
pub fn link_dest_param(listing: &[String]) -> Option<String> {
    listing
        .last()
        .map(|last| format!("--link-dest={}", shell_quote(&format!("../{last}"))))
}

/// Snapshots to remove, oldest first, so that `copies` remain once the new
/// snapshot is counted.
#[must_use]
pub fn prune_set(listing: &[String], copies: u32) -> Vec<String> {
    let keep_existing = usize::try_from(copies.saturating_sub(1)).unwrap_or(usize::MAX);
    let excess = listing.len().saturating_sub(keep_existing);
    listing.iter().take(excess).cloned().collect()
}

/// Per-run rotation state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rotation {
    /// Where this run syncs to.
    pub snapshot_path: String,
    /// `--link-dest` flag, when a previous snapshot exists.
    pub link_dest: Option<String>,
    /// Existing snapshots before this run, sorted ascending.
    pub listing: Vec<String>,
}

/// List the existing snapshots of `dest` and choose the new snapshot path.
///
/// A listing that fails, is declined or cannot run counts as empty.
pub fn prepare(
    dispatcher: &Dispatcher<'_>,
    dest: &Destination,
    now: NaiveDateTime,
    log: &dyn Log,
) -> Rotation {
    let command = list_command(&dest.path);
    let listing = match dispatcher.execute(&command, ExecOptions::quiet(dest.remote)) {
        Ok(Outcome::Completed(output)) if output.success() => parse_listing(&output.lines),
        Ok(_) => Vec::new(),
        Err(e) => {
            log.debug(&format!("snapshot listing failed: {e}"));
            Vec::new()
        }
    };
    log.debug(&format!(
        "{} existing snapshot(s) in {}",
        listing.len(),
        dest.path
    ));
    Rotation {
        snapshot_path: snapshot_path(&dest.path, &snapshot_name(now)),
        link_dest: link_dest_param(&listing),
        listing,
    }
}

/// Remove the snapshots beyond the retention count. Each removal is
/// confirmation-gated; returns the names actually removed.
pub fn prune(
    dispatcher: &Dispatcher<'_>,
    dest: &Destination,
    listing: &[String],
    log: &dyn Log,
) -> Vec<String> {
    let mut removed = Vec::new();
    for name in prune_set(listing, dest.copies) {
        let command = remove_command(&dest.path, &name);
        match dispatcher.execute(&command, ExecOptions::confirmed(dest.remote)) {
            Ok(outcome) if outcome.success() => {
                log.info(&format!("removed old snapshot {name}"));
                removed.push(name);
            }
            Ok(Outcome::Declined) => log.warn(&format!("removal of {name} declined")),
            Ok(Outcome::Completed(output)) => log.error(&format!(
                "Command failed with exit code {}: {command}",
                output.status
            )),
            Err(e) => log.error(&format!("{e}")),
        }
    }
    removed
}
