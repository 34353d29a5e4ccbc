//! Rendering of the rsync invocation.
use crate::config::normalize::{ResolvedPlan, SshSettings};
use crate::config::template::{quote_path, shell_quote};

/// `--rsh` flag making rsync reach remote endpoints with the task's port and key.
#[must_use]
pub fn rsh_param(ssh: &SshSettings) -> String {
    let mut rsh = format!("ssh -p{}", ssh.port);
    if let Some(key) = &ssh.private_key {
        rsh.push_str(" -i ");
        rsh.push_str(key);
    }
    format!("--rsh={}", shell_quote(&rsh))
}

/// Path argument for one side of the transfer: `user@host:path` when remote.
#[must_use]
pub fn endpoint_spec(path: &str, remote: bool, ssh: &SshSettings) -> String {
    if !remote {
        return quote_path(path);
    }
    let host = ssh.host.as_deref().unwrap_or_default();
    let login = ssh
        .username
        .as_deref()
        .map_or_else(|| host.to_string(), |user| format!("{user}@{host}"));
    format!("{login}:{}", quote_path(path))
}

/// Effective rsync flags: the plan's params, then the link-dest flag, the
/// excludes and, when an endpoint is remote and no `--rsh` was given, the
/// remote shell flag.
#[must_use]
pub fn params(plan: &ResolvedPlan, link_dest: Option<&str>) -> Vec<String> {
    let mut params = plan.params.clone();
    params.extend(link_dest.map(str::to_string));
    params.extend(
        plan.src
            .exclude
            .iter()
            .map(|pattern| format!("--exclude {}", shell_quote(pattern))),
    );
    let has_rsh = params.iter().any(|p| p.contains("--rsh"));
    if !has_rsh && (plan.src.remote || plan.dest.remote) {
        params.push(rsh_param(&plan.ssh));
    }
    params
}

/// Full `rsync <params> <src> <dest>` command line, syncing into `dest_path`.
#[must_use]
pub fn command(plan: &ResolvedPlan, dest_path: &str, link_dest: Option<&str>) -> String {
    format!(
        "rsync {} {} {}",
        params(plan, link_dest).join(" "),
        endpoint_spec(&plan.src.path, plan.src.remote, &plan.ssh),
        endpoint_spec(dest_path, plan.dest.remote, &plan.ssh),
    )
}
