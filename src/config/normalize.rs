//! Expansion of raw task definitions into fully-resolved plans.
use std::path::{Path, PathBuf};

use super::task::{DestBlock, Endpoint, HookDefinition, SourceBlock, TaskDefinition};
use super::template::{expand_leading_tilde, expand_tilde_words, insert};
use crate::error::ConfigError;
use crate::operations::FileSystemOps;

/// Baseline rsync flags used when a task sets no `params`.
pub const DEFAULT_PARAMS: &str = "-aW --inplace --delete --stats --info=progress2";
/// Default SSH port.
pub const DEFAULT_SSH_PORT: u16 = 22;
/// Default SSH connect/command timeout in seconds.
pub const DEFAULT_SSH_TIMEOUT_SECS: u64 = 5 * 60;
/// Token in a local source path replaced by the newest child directory.
pub const LATEST_TOKEN: &str = ":latest";

/// Resolved `ssh` settings. Host, user and key stay optional here; the
/// session manager rejects a connection attempt without them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshSettings {
    /// Host name or address.
    pub host: Option<String>,
    /// Login user.
    pub username: Option<String>,
    /// Port, [`DEFAULT_SSH_PORT`] unless set.
    pub port: u16,
    /// Identity file, tilde-expanded.
    pub private_key: Option<String>,
    /// Connect and command timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for SshSettings {
    fn default() -> Self {
        Self {
            host: None,
            username: None,
            port: DEFAULT_SSH_PORT,
            private_key: None,
            timeout_secs: DEFAULT_SSH_TIMEOUT_SECS,
        }
    }
}

/// Resolved source endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    /// Source path with `:latest` resolved.
    pub path: String,
    /// Whether the path lives on the ssh host.
    pub remote: bool,
    /// Patterns passed as `--exclude`.
    pub exclude: Vec<String>,
}

/// Resolved destination endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    /// Base destination path.
    pub path: String,
    /// Whether the path lives on the ssh host.
    pub remote: bool,
    /// Number of dated snapshots to retain; `1` disables rotation.
    pub copies: u32,
}

/// A pre/post rsync command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hook {
    /// Shell command line.
    pub command: String,
    /// Run over the task's ssh session.
    pub remote: bool,
}

/// A task with every default filled in and every path resolved.
///
/// Plans are immutable once built; per-run adjustments (rotated destination,
/// extra rsync flags) live in the runner's own run state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPlan {
    /// Task name; `None` for unnamed tasks.
    pub name: Option<String>,
    /// Connection settings.
    pub ssh: SshSettings,
    /// Where to copy from.
    pub src: Source,
    /// Where to copy to.
    pub dest: Destination,
    /// rsync parameters.
    pub params: Vec<String>,
    /// Commands run before the sync.
    pub pre_hooks: Vec<Hook>,
    /// Commands run after the sync.
    pub post_hooks: Vec<Hook>,
}

impl ResolvedPlan {
    /// Quoted task name followed by a space, or empty for unnamed tasks.
    ///
    /// Suited to messages of the form `Rsync task {label}started`.
    #[must_use]
    pub fn label(&self) -> String {
        task_label(self.name.as_deref())
    }

    /// Task name for summaries; unnamed tasks are shown as `(unnamed)`.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("(unnamed)")
    }

    /// Whether any step of this task needs the remote session.
    #[must_use]
    pub fn needs_remote(&self) -> bool {
        self.ssh.host.is_some()
            || self.src.remote
            || self.dest.remote
            || self
                .pre_hooks
                .iter()
                .chain(&self.post_hooks)
                .any(|h| h.remote)
    }

    /// Whether snapshot rotation applies.
    #[must_use]
    pub const fn rotates(&self) -> bool {
        self.dest.copies > 1
    }
}

/// Quoted task name followed by a space, or empty when there is no name.
#[must_use]
pub fn task_label(name: Option<&str>) -> String {
    name.filter(|n| !n.is_empty())
        .map_or_else(String::new, |n| format!("\"{n}\" "))
}

/// Process-level overrides applied to every task of a document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overrides {
    /// Replaces every task's `dest.copies`.
    pub copies: Option<u32>,
    /// Destination template with `:config-stem` and `:task-name` placeholders.
    pub dest_path: Option<String>,
    /// Adds `-v` to the default rsync flags.
    pub verbose: bool,
}

/// Turns [`TaskDefinition`]s of one document into [`ResolvedPlan`]s.
#[derive(Debug)]
pub struct Normalizer<'a> {
    config_stem: String,
    home: String,
    overrides: &'a Overrides,
    fs_ops: &'a dyn FileSystemOps,
}

/// Document file name minus its last extension (`backups.yml` → `backups`).
#[must_use]
pub fn config_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default()
}

impl<'a> Normalizer<'a> {
    /// Create a normalizer for the document at `config_path`.
    #[must_use]
    pub fn new(
        config_path: &Path,
        home: &Path,
        overrides: &'a Overrides,
        fs_ops: &'a dyn FileSystemOps,
    ) -> Self {
        Self {
            config_stem: config_stem(config_path),
            home: home.to_string_lossy().to_string(),
            overrides,
            fs_ops,
        }
    }

    /// Resolve one task definition. `index` is its position in the document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingSource`] when `src` is absent,
    /// [`ConfigError::InvalidCopies`] for a zero snapshot count, and
    /// [`ConfigError::LatestUnresolved`] when a `:latest` source has no
    /// child directory to resolve to.
    pub fn normalize(&self, def: &TaskDefinition, index: usize) -> Result<ResolvedPlan, ConfigError> {
        let name = def.name.clone().filter(|n| !n.is_empty());

        let src = match &def.src {
            None => {
                return Err(ConfigError::MissingSource {
                    task: def.label(index),
                });
            }
            Some(Endpoint::Path(path)) => Source {
                path: path.clone(),
                remote: false,
                exclude: Vec::new(),
            },
            Some(Endpoint::Block(SourceBlock {
                path,
                remote,
                exclude,
            })) => Source {
                path: path.clone(),
                remote: *remote,
                exclude: exclude.to_vec(),
            },
        };

        let dest_block = match &def.dest {
            None => DestBlock::default(),
            Some(Endpoint::Path(path)) => DestBlock {
                path: Some(path.clone()),
                ..DestBlock::default()
            },
            Some(Endpoint::Block(block)) => block.clone(),
        };
        let copies = self.overrides.copies.or(dest_block.copies).unwrap_or(1);
        if copies == 0 {
            return Err(ConfigError::InvalidCopies {
                task: def.label(index),
                copies,
            });
        }
        let mut dest = Destination {
            path: self.dest_path(name.as_deref(), dest_block.path.as_deref()),
            remote: dest_block.remote,
            copies,
        };

        let ssh_def = def.ssh.clone().unwrap_or_default();
        let mut ssh = SshSettings {
            host: ssh_def.host,
            username: ssh_def.username,
            port: ssh_def.port.unwrap_or(DEFAULT_SSH_PORT),
            private_key: ssh_def.private_key,
            timeout_secs: ssh_def.timeout.unwrap_or(DEFAULT_SSH_TIMEOUT_SECS),
        };

        let params = def.params.as_ref().map_or_else(
            || {
                let mut params = vec![DEFAULT_PARAMS.to_string()];
                if self.overrides.verbose {
                    params.push("-v".to_string());
                }
                params
            },
            super::task::OneOrMany::to_vec,
        );

        let mut pre_hooks = normalize_hooks(def.pre_hooks.as_slice());
        let mut post_hooks = normalize_hooks(def.post_hooks.as_slice());

        let mut src = src;
        ssh.private_key = ssh
            .private_key
            .map(|key| expand_leading_tilde(&key, &self.home));
        if !src.remote {
            src.path = expand_leading_tilde(&src.path, &self.home);
            if src.path.contains(LATEST_TOKEN) {
                src.path = self.resolve_latest(&src.path)?;
            }
        }
        if !dest.remote {
            dest.path = expand_leading_tilde(&dest.path, &self.home);
        }
        for hook in pre_hooks.iter_mut().chain(post_hooks.iter_mut()) {
            if !hook.remote {
                hook.command = expand_tilde_words(&hook.command, &self.home);
            }
        }

        Ok(ResolvedPlan {
            name,
            ssh,
            src,
            dest,
            params,
            pre_hooks,
            post_hooks,
        })
    }

    /// Pick the destination path: the override template, then the explicit
    /// path, then `~/<stem>/<name>/`.
    fn dest_path(&self, name: Option<&str>, explicit: Option<&str>) -> String {
        if let Some(template) = &self.overrides.dest_path {
            return insert(
                template,
                [
                    ("config-stem", self.config_stem.as_str()),
                    ("task-name", name.unwrap_or_default()),
                ],
            );
        }
        if let Some(path) = explicit.filter(|p| !p.is_empty()) {
            return path.to_string();
        }
        let mut path = format!("~/{}/", self.config_stem);
        if let Some(name) = name {
            path.push_str(name);
            path.push('/');
        }
        path
    }

    /// Replace `:latest` with the lexicographically-last child directory of
    /// the directory preceding the token.
    fn resolve_latest(&self, path: &str) -> Result<String, ConfigError> {
        let unresolved = |reason: String| ConfigError::LatestUnresolved {
            path: path.to_string(),
            reason,
        };
        let parent = path.split(LATEST_TOKEN).next().unwrap_or_default();
        let dir = if parent.is_empty() {
            PathBuf::from(".")
        } else {
            PathBuf::from(parent)
        };
        let entries = self
            .fs_ops
            .read_dir(&dir)
            .map_err(|e| unresolved(format!("{e:#}")))?;
        let latest = entries
            .iter()
            .filter(|p| self.fs_ops.is_dir(p))
            .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().to_string()))
            .max()
            .ok_or_else(|| unresolved(format!("no directories in {}", dir.display())))?;
        Ok(path.replace(LATEST_TOKEN, &latest))
    }
}

fn normalize_hooks(hooks: &[HookDefinition]) -> Vec<Hook> {
    hooks
        .iter()
        .map(|hook| match hook {
            HookDefinition::Command(command) => Hook {
                command: command.clone(),
                remote: false,
            },
            HookDefinition::Block { command, remote } => Hook {
                command: command.clone(),
                remote: *remote,
            },
        })
        .collect()
}
