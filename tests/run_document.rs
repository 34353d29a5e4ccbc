#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::wildcard_imports,
    clippy::indexing_slicing
)]
//! Integration tests running whole task documents against real local
//! processes in a temporary workspace.

mod common;

#[cfg(unix)]
use std::os::unix::fs::MetadataExt as _;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};

use common::{MemoryLog, Workspace, context, rsync_available};
use rsync_runner::config::data_store::DataStore;
use rsync_runner::config::normalize::Overrides;
use rsync_runner::config::{self, Document, Located};
use rsync_runner::error::ConfigError;
use rsync_runner::logging::TaskStatus;
use rsync_runner::tasks::{self, RunOptions};

fn at(second: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 6, 1)
        .unwrap()
        .and_hms_opt(12, 0, second)
        .unwrap()
}

fn first_run() -> NaiveDateTime {
    at(1)
}

fn second_run() -> NaiveDateTime {
    at(2)
}

fn third_run() -> NaiveDateTime {
    at(3)
}

fn forced() -> RunOptions {
    RunOptions {
        force: true,
        ..RunOptions::default()
    }
}

// ---------------------------------------------------------------------------
// Snapshot rotation
// ---------------------------------------------------------------------------

/// Three runs with `copies: 2` leave the two newest snapshots, and unchanged
/// files in the newest are hard links into the previous one.
#[cfg(unix)]
#[test]
#[ignore = "requires rsync on PATH; run with --ignored"]
fn rotation_keeps_copies_and_links_unchanged_files() {
    assert!(rsync_available(), "rsync not found on PATH");
    let ws = Workspace::new();
    ws.write("src/index.html", "<h1>hello</h1>\n");
    let doc_path = ws.write(
        "rsync.yml",
        &format!(
            "name: www\nsrc: {}/src/\ndest:\n  path: {}/backup\n  copies: 2\n",
            ws.path().display(),
            ws.path().display()
        ),
    );
    let doc = Document::load(&doc_path).unwrap();

    for clock in [first_run as fn() -> NaiveDateTime, second_run, third_run] {
        let log = Arc::new(MemoryLog::default());
        let ctx = context(&ws, &log, forced(), "", clock);
        let summary = tasks::run_document(&ctx, &doc, &Overrides::default()).unwrap();
        assert_eq!(summary.failures(), 0, "run at {} failed", clock());
    }

    assert_eq!(
        ws.subdirs("backup"),
        vec!["250601_120002".to_string(), "250601_120003".to_string()]
    );
    let previous = std::fs::metadata(ws.join("backup/250601_120002/index.html")).unwrap();
    let newest = std::fs::metadata(ws.join("backup/250601_120003/index.html")).unwrap();
    assert_eq!(previous.ino(), newest.ino());
}

/// Without rotation the destination receives the tree directly.
#[test]
#[ignore = "requires rsync on PATH; run with --ignored"]
fn single_copy_syncs_into_destination() {
    assert!(rsync_available(), "rsync not found on PATH");
    let ws = Workspace::new();
    ws.write("src/a/b.txt", "b\n");
    let doc_path = ws.write(
        "backups.yml",
        &format!(
            "- name: tree\n  src: {}/src/\n  dest: {}/out/\n",
            ws.path().display(),
            ws.path().display()
        ),
    );
    let doc = Document::load(&doc_path).unwrap();
    let log = Arc::new(MemoryLog::default());
    let ctx = context(&ws, &log, forced(), "", first_run);
    tasks::run_document(&ctx, &doc, &Overrides::default()).unwrap();

    assert_eq!(
        std::fs::read_to_string(ws.join("out/a/b.txt")).unwrap(),
        "b\n"
    );
    assert_eq!(log.tasks(), vec![("tree".to_string(), TaskStatus::Ok)]);
    assert!(log.contains("==> Rsync task \"tree\" started"));
}

// ---------------------------------------------------------------------------
// Hooks, confirmation and filtering
// ---------------------------------------------------------------------------

/// Post-hooks run whether or not the sync itself succeeded.
#[test]
fn hooks_run_before_and_after_sync() {
    let ws = Workspace::new();
    std::fs::create_dir_all(ws.join("src")).unwrap();
    let root = ws.path().display().to_string();
    let doc_path = ws.write(
        "rsync.yml",
        &format!(
            "name: hooks\nsrc: {root}/src/\ndest: {root}/out/\npre-rsync-cmd: echo pre > {root}/pre.txt\npost-rsync-cmd:\n  - echo post > {root}/post.txt\n"
        ),
    );
    let doc = Document::load(&doc_path).unwrap();
    let log = Arc::new(MemoryLog::default());
    let ctx = context(&ws, &log, forced(), "", first_run);
    tasks::run_document(&ctx, &doc, &Overrides::default()).unwrap();

    assert_eq!(std::fs::read_to_string(ws.join("pre.txt")).unwrap(), "pre\n");
    assert_eq!(
        std::fs::read_to_string(ws.join("post.txt")).unwrap(),
        "post\n"
    );
}

/// A declined pre-hook stops the task before anything else runs.
#[test]
fn declined_hook_skips_the_rest_of_the_task() {
    let ws = Workspace::new();
    let root = ws.path().display().to_string();
    let doc_path = ws.write(
        "rsync.yml",
        &format!(
            "name: ask\nsrc: {root}/src/\ndest: {root}/out/\npre-rsync-cmd: touch {root}/pre.txt\n"
        ),
    );
    let doc = Document::load(&doc_path).unwrap();
    let log = Arc::new(MemoryLog::default());
    let ctx = context(&ws, &log, RunOptions::default(), "n\n", first_run);
    let summary = tasks::run_document(&ctx, &doc, &Overrides::default()).unwrap();

    assert_eq!(summary.failures(), 1);
    assert_eq!(log.tasks(), vec![("ask".to_string(), TaskStatus::Declined)]);
    assert!(!ws.join("pre.txt").exists());
    assert!(!ws.join("out").exists());
    assert!(log.contains("==> Rsync task \"ask\" finished in"));
}

/// Tasks excluded by `--task` leave no trace at all.
#[test]
fn filtered_tasks_have_no_side_effects() {
    let ws = Workspace::new();
    let root = ws.path().display().to_string();
    let doc_path = ws.write(
        "rsync.yml",
        &format!(
            "- name: www\n  src: {root}/src/\n  dest: {root}/out/\n  pre-rsync-cmd: touch {root}/www.txt\n- src: {root}/src/\n  dest: {root}/anon/\n"
        ),
    );
    let doc = Document::load(&doc_path).unwrap();
    let log = Arc::new(MemoryLog::default());
    let options = RunOptions {
        force: true,
        task_filter: Some("db".to_string()),
        ..RunOptions::default()
    };
    let ctx = context(&ws, &log, options, "", first_run);
    let summary = tasks::run_document(&ctx, &doc, &Overrides::default()).unwrap();

    assert!(summary.reports.is_empty());
    assert!(!ws.join("www.txt").exists());
    assert!(!ws.join("out").exists());
    assert!(!ws.join("anon").exists());
    assert!(!log.contains("Rsync task"));
}

/// Local mysql invocations receive the data-store parameters.
#[test]
fn mysql_hook_sees_connection_parameters() {
    let ws = Workspace::new();
    let root = ws.path().display().to_string();
    let doc_path = ws.write(
        "rsync.yml",
        &format!(
            "name: shop\nsrc: {root}/src/\ndest: {root}/out/\npre-rsync-cmd: echo mysqldump -h:host -u:user shop > {root}/dump.txt\n"
        ),
    );
    let doc = Document::load(&doc_path).unwrap();
    let log = Arc::new(MemoryLog::default());
    let mut ctx = context(&ws, &log, forced(), "", first_run);
    ctx.data_store = DataStore::default().with("host", "db1").with("user", "root");
    tasks::run_document(&ctx, &doc, &Overrides::default()).unwrap();

    assert_eq!(
        std::fs::read_to_string(ws.join("dump.txt")).unwrap(),
        "mysqldump -hdb1 -uroot shop\n"
    );
}

/// `--dest-path` placeholders use the document stem and task name.
#[test]
fn dest_path_override_is_expanded() {
    let ws = Workspace::new();
    let root = ws.path().display().to_string();
    let doc_path = ws.write(
        "nightly.yml",
        &format!("name: www\nsrc: {root}/src/\n"),
    );
    let doc = Document::load(&doc_path).unwrap();
    let log = Arc::new(MemoryLog::default());
    let ctx = context(&ws, &log, forced(), "", first_run);
    let overrides = Overrides {
        dest_path: Some(format!("{root}/:config-stem/:task-name/")),
        ..Overrides::default()
    };
    tasks::run_document(&ctx, &doc, &overrides).unwrap();

    assert!(ws.join("nightly/www").is_dir());
}

// ---------------------------------------------------------------------------
// Document errors
// ---------------------------------------------------------------------------

/// A missing requested document falls back to `rsync.yml`.
#[test]
fn missing_document_falls_back_to_default() {
    let ws = Workspace::new();
    ws.write("rsync.yml", "src: /srv/\n");
    let located = config::locate(Some(std::path::Path::new("nope.yml")), ws.path()).unwrap();
    assert!(matches!(located, Located::Fallback { .. }));
    assert!(located.path().ends_with("rsync.yml"));

    let empty = Workspace::new();
    assert!(matches!(
        config::locate(None, empty.path()),
        Err(ConfigError::MissingConfig(_))
    ));
}

/// A definition without `src` rejects the whole document.
#[test]
fn missing_source_is_fatal() {
    let ws = Workspace::new();
    let doc_path = ws.write("rsync.yml", "- name: ok\n  src: /srv/\n- name: broken\n");
    let err = Document::load(&doc_path).unwrap_err();
    assert!(matches!(err, ConfigError::MissingSource { .. }));
}
