//! Command: inspect, restore and purge the destructed-files log.
use anyhow::{Context as _, Result};
use std::path::{Path, PathBuf};

use super::CommandSetup;
use crate::cli::{DestructedCommand, GlobalOpts, ListOpts};
use crate::destructed::{DestructedFileEntry, DestructedFilesLog, DestructionReason};
use crate::logging::Logger;

/// Run a `destructed` subcommand.
///
/// # Errors
///
/// Returns an error if settings or the log cannot be loaded, a requested
/// entry does not exist, or a restore fails.
pub fn run(global: &GlobalOpts, command: &DestructedCommand, log: &Logger) -> Result<()> {
    let setup = CommandSetup::init(global, log)?;
    let mut destructed = setup.open_log()?;

    match command {
        DestructedCommand::List(opts) => list(&destructed, opts, log),
        DestructedCommand::Find { path } => {
            let path = absolute(path)?;
            let entry = destructed
                .find_destructed_file(&path)
                .with_context(|| format!("no destructed entry for {}", path.display()))?;
            log.info(&describe(entry));
        }
        DestructedCommand::Restore { path } => restore(&setup, &mut destructed, &absolute(path)?, log)?,
        DestructedCommand::Cleanup { max_age_days } => {
            let days = max_age_days.unwrap_or(setup.settings.destructed.max_age_days);
            log.stage(&format!("Removing entries older than {days} day(s)"));
            let report = destructed.cleanup_old_destructed_files(days)?;
            log.info(&format!(
                "{} removed, {} kept because their backup could not be deleted",
                report.removed, report.retained
            ));
        }
    }
    log.print_summary();
    Ok(())
}

fn list(destructed: &DestructedFilesLog, opts: &ListOpts, log: &Logger) {
    let mut entries = match opts.machine.as_deref() {
        Some(machine) => destructed.by_machine(machine),
        None => destructed.entries().iter().collect(),
    };
    if let Some(reason) = opts.reason {
        keep_only(&mut entries, &destructed.by_reason(reason));
    }
    if opts.restoreable {
        keep_only(&mut entries, &destructed.restoreable());
    }

    log.stage(&format!(
        "{} of {} entries in {}",
        entries.len(),
        destructed.entries().len(),
        destructed.path().display()
    ));
    for entry in entries {
        log.info(&describe(entry));
    }
}

/// Intersect two selections borrowed from the same log.
fn keep_only(entries: &mut Vec<&DestructedFileEntry>, subset: &[&DestructedFileEntry]) {
    entries.retain(|e| subset.iter().any(|s| std::ptr::eq(*s, *e)));
}

/// Preserve whatever is at `path` now, then copy the logged backup back.
fn restore(
    setup: &CommandSetup,
    destructed: &mut DestructedFilesLog,
    path: &Path,
    log: &Logger,
) -> Result<()> {
    let entry = destructed
        .find_destructed_file(path)
        .cloned()
        .with_context(|| format!("no destructed entry for {}", path.display()))?;
    if !entry.restoreable {
        anyhow::bail!("{} is logged as not restoreable", path.display());
    }

    log.stage(&format!("Restoring {}", path.display()));
    if path.exists() && !path.is_symlink() {
        let machine = setup.this_machine(None);
        let current = destructed.preserve(
            path,
            &machine.machine_id,
            DestructionReason::Overwrite,
            &setup.backups_dir(),
        )?;
        log.info(&format!("current content saved to {}", current.backup_path));
    }

    if !destructed.restore_destructed_file(&entry) {
        anyhow::bail!("could not restore {} from {}", path.display(), entry.backup_path);
    }
    log.info(&format!("restored from {}", entry.backup_path));
    Ok(())
}

fn describe(entry: &DestructedFileEntry) -> String {
    format!(
        "{}  {}  {}  {} -> {}{}",
        entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
        entry.machine_id,
        entry.reason,
        entry.original_path,
        entry.backup_path,
        if entry.restoreable { "" } else { "  (not restoreable)" }
    )
}

fn absolute(path: &Path) -> Result<PathBuf> {
    std::path::absolute(path).with_context(|| format!("resolving {}", path.display()))
}
