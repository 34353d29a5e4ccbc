// Shared helpers for integration tests.
//
// Provides a temporary-directory-backed workspace for task documents and
// their source/destination trees, a capturing logger, and a context builder
// wired to real local processes.
//
// Used by all integration test binaries that declare `mod common;`.
#![allow(dead_code)]

use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rsync_runner::config::data_store::DataStore;
use rsync_runner::exec::SystemExecutor;
use rsync_runner::logging::{Log, TaskStatus};
use rsync_runner::operations::SystemFileSystemOps;
use rsync_runner::session::SessionManager;
use rsync_runner::tasks::context::Clock;
use rsync_runner::tasks::{Context, RunOptions};
use rsync_runner::transport::{LocalProcessTransport, StdinPrompt};

/// [`Log`] keeping every message in memory.
#[derive(Debug, Default)]
pub struct MemoryLog {
    lines: Mutex<Vec<String>>,
    tasks: Mutex<Vec<(String, TaskStatus)>>,
}

impl MemoryLog {
    fn push(&self, line: String) {
        self.lines.lock().expect("log lock").push(line);
    }

    /// Whether any message contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.lines
            .lock()
            .expect("log lock")
            .iter()
            .any(|l| l.contains(needle))
    }

    /// Recorded `(name, status)` pairs.
    pub fn tasks(&self) -> Vec<(String, TaskStatus)> {
        self.tasks.lock().expect("log lock").clone()
    }
}

impl Log for MemoryLog {
    fn stage(&self, msg: &str) {
        self.push(format!("==> {msg}"));
    }
    fn info(&self, msg: &str) {
        self.push(msg.to_string());
    }
    fn debug(&self, msg: &str) {
        self.push(format!("[debug] {msg}"));
    }
    fn warn(&self, msg: &str) {
        self.push(format!("[warn] {msg}"));
    }
    fn error(&self, msg: &str) {
        self.push(format!("[error] {msg}"));
    }
    fn output(&self, line: &str) {
        self.push(format!("| {line}"));
    }
    fn record_task(&self, name: &str, status: TaskStatus, _: Option<&str>, _: Duration) {
        self.tasks
            .lock()
            .expect("log lock")
            .push((name.to_string(), status));
    }
}

/// An isolated workspace backed by a [`tempfile::TempDir`].
pub struct Workspace {
    /// Temporary directory holding documents and trees.
    pub root: tempfile::TempDir,
}

impl Workspace {
    /// Create an empty workspace.
    pub fn new() -> Self {
        Self {
            root: tempfile::tempdir().expect("create temp dir"),
        }
    }

    /// Workspace root.
    pub fn path(&self) -> &Path {
        self.root.path()
    }

    /// Absolute path of `rel` inside the workspace.
    pub fn join(&self, rel: &str) -> PathBuf {
        self.root.path().join(rel)
    }

    /// Write `content` to `rel`, creating parent directories.
    pub fn write(&self, rel: &str, content: &str) -> PathBuf {
        let path = self.join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create parent dir");
        }
        std::fs::write(&path, content).expect("write file");
        path
    }

    /// Immediate subdirectory names of `rel`, sorted.
    pub fn subdirs(&self, rel: &str) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(self.join(rel))
            .expect("read dir")
            .filter_map(Result::ok)
            .filter(|e| e.path().is_dir())
            .map(|e| e.file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        names
    }
}

/// Whether `rsync` can be run on this machine.
pub fn rsync_available() -> bool {
    which::which("rsync").is_ok()
}

/// Build a [`Context`] running real local commands, with `home` set to the
/// workspace and confirmation answers read from `answers`.
pub fn context(
    ws: &Workspace,
    log: &Arc<MemoryLog>,
    options: RunOptions,
    answers: &str,
    clock: Clock,
) -> Context {
    let executor = Arc::new(SystemExecutor);
    let sessions = SessionManager::new(executor.clone(), Arc::new(SystemFileSystemOps))
        .expect("create session manager");
    Context {
        log: log.clone(),
        local: Arc::new(LocalProcessTransport::new(executor)),
        connector: Arc::new(sessions),
        confirm: Arc::new(StdinPrompt::with_reader(Cursor::new(answers.to_string()))),
        data_store: DataStore::default(),
        options,
        home: ws.path().to_path_buf(),
        fs_ops: Arc::new(SystemFileSystemOps),
        clock,
    }
}
