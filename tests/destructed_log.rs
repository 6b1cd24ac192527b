#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::indexing_slicing
)]
//! Integration tests for the destructed-files log on a real filesystem.

mod common;

use std::sync::Arc;

use chrono::Duration;
use common::{Workspace, fixed_time};
use dotsync_cli::destructed::{BACKUPS_DIR_NAME, DestructedFilesLog, DestructionReason, LOG_FILE_NAME};
use dotsync_cli::operations::SystemFileSystemOps;

fn open(ws: &Workspace) -> DestructedFilesLog {
    DestructedFilesLog::open(ws.state().join(LOG_FILE_NAME), Arc::new(SystemFileSystemOps))
        .expect("open log")
}

#[test]
fn preserved_files_survive_a_new_process() {
    let ws = Workspace::new();
    let zshrc = ws.home_file(".zshrc", "export PATH=$HOME/bin:$PATH\n");
    let backups = ws.state().join(BACKUPS_DIR_NAME);

    {
        let mut log = open(&ws);
        log.preserve(&zshrc, "linux-arch-desk", DestructionReason::SymlinkReplace, &backups)
            .unwrap();
    }
    std::fs::write(&zshrc, "clobbered\n").unwrap();

    let log = open(&ws);
    let entry = log.find_destructed_file(&zshrc).unwrap().clone();
    assert_eq!(entry.reason, DestructionReason::SymlinkReplace);
    assert!(entry.checksum.is_some());
    assert!(log.restore_destructed_file(&entry));
    assert_eq!(
        std::fs::read_to_string(&zshrc).unwrap(),
        "export PATH=$HOME/bin:$PATH\n"
    );
}

#[test]
fn directories_are_preserved_whole() {
    let ws = Workspace::new();
    ws.home_file(".config/nvim/init.lua", "vim.opt.number = true\n");
    ws.home_file(".config/nvim/lua/keys.lua", "-- keys\n");
    let nvim = ws.home().join(".config/nvim");
    let backups = ws.state().join(BACKUPS_DIR_NAME);

    let mut log = open(&ws);
    let entry = log
        .preserve(&nvim, "linux-arch-desk", DestructionReason::Overwrite, &backups)
        .unwrap()
        .clone();
    std::fs::remove_dir_all(&nvim).unwrap();

    assert!(log.restore_destructed_file(&entry));
    assert_eq!(
        std::fs::read_to_string(nvim.join("lua/keys.lua")).unwrap(),
        "-- keys\n"
    );
}

#[test]
fn latest_entry_wins_for_repeated_paths() {
    let ws = Workspace::new();
    let gitconfig = ws.home_file(".gitconfig", "v1\n");
    let backups = ws.state().join(BACKUPS_DIR_NAME);
    let mut log = open(&ws);

    log.preserve_at(
        &gitconfig,
        "linux-arch-desk",
        DestructionReason::Overwrite,
        &backups,
        fixed_time("2026-01-01T00:00:00Z"),
    )
    .unwrap();
    std::fs::write(&gitconfig, "v2\n").unwrap();
    log.preserve_at(
        &gitconfig,
        "linux-arch-desk",
        DestructionReason::Manual,
        &backups,
        fixed_time("2026-02-01T00:00:00Z"),
    )
    .unwrap();

    let latest = log.find_destructed_file(&gitconfig).unwrap();
    assert_eq!(latest.reason, DestructionReason::Manual);
    assert_eq!(std::fs::read_to_string(&latest.backup_path).unwrap(), "v2\n");
}

#[test]
fn cleanup_purges_only_expired_backups() {
    let ws = Workspace::new();
    let old = ws.home_file(".old", "old\n");
    let fresh = ws.home_file(".fresh", "fresh\n");
    let backups = ws.state().join(BACKUPS_DIR_NAME);
    let now = fixed_time("2026-06-01T12:00:00Z");
    let mut log = open(&ws);

    let old_backup = log
        .preserve_at(&old, "m", DestructionReason::Overwrite, &backups, now - Duration::days(120))
        .unwrap()
        .backup_path
        .clone();
    let fresh_backup = log
        .preserve_at(&fresh, "m", DestructionReason::Overwrite, &backups, now - Duration::days(3))
        .unwrap()
        .backup_path
        .clone();

    let report = log.cleanup_old_destructed_files_at(90, now).unwrap();
    assert_eq!((report.removed, report.retained), (1, 0));
    assert!(!std::path::Path::new(&old_backup).exists());
    assert!(std::path::Path::new(&fresh_backup).exists());

    let reopened = open(&ws);
    assert_eq!(reopened.entries().len(), 1);
    assert_eq!(reopened.entries()[0].original_path, fresh.display().to_string());
}
