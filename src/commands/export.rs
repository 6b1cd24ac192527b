//! Command: screen a freshly generated config and export it to a repository.
use anyhow::{Context as _, Result};
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::CommandSetup;
use crate::cli::{ExportOpts, GlobalOpts};
use crate::logging::Logger;
use crate::operations::SystemFileSystemOps;
use crate::schema::{BackupConfig, SchemaStore};
use crate::secrets::SecretScanner;
use crate::secrets::screen::screen_candidates;
use crate::tracking;

/// Run the export command.
///
/// # Errors
///
/// Returns an error if the input cannot be read, no repository is
/// configured, or the schema document cannot be written.
pub fn run(global: &GlobalOpts, opts: &ExportOpts, log: &Logger) -> Result<()> {
    let setup = CommandSetup::init(global, log)?;
    let repo = resolve_repo(opts, &setup)?;
    let scanner = setup.settings.scanner()?;

    log.stage("Loading machine config");
    let content = std::fs::read_to_string(&opts.input)
        .with_context(|| format!("reading {}", opts.input.display()))?;
    let mut config: BackupConfig = serde_json::from_str(&content)
        .with_context(|| format!("parsing {}", opts.input.display()))?;
    log.info(&format!(
        "{} machine(s) in {}",
        config.dotfiles.len(),
        opts.input.display()
    ));

    log.stage("Screening tracked files");
    prepare(&mut config, &scanner, &setup.home, log);

    for warning in config.validate() {
        log.warn(&format!(
            "{} [{}]: {}",
            warning.source, warning.item, warning.message
        ));
    }

    log.stage("Exporting schema");
    let store = SchemaStore::new(&repo, Arc::new(SystemFileSystemOps));
    let result = store.export(&config);
    if !result.success {
        anyhow::bail!(
            "export to {} failed: {}",
            result.path.display(),
            result.error.unwrap_or_default()
        );
    }
    if result.merged {
        log.info(&format!("merged into {}", result.path.display()));
    } else {
        log.info(&format!("wrote {}", result.path.display()));
    }
    log.print_summary();
    Ok(())
}

fn resolve_repo(opts: &ExportOpts, setup: &CommandSetup) -> Result<PathBuf> {
    opts.repo
        .clone()
        .or_else(|| setup.settings.repo_path(&setup.home))
        .context("no repository given: pass --repo or set `repo` in the settings file")
}

/// Deduplicate and screen every machine's tracked files in place.
fn prepare(config: &mut BackupConfig, scanner: &SecretScanner, home: &Path, log: &Logger) {
    let now = Utc::now();
    for (id, machine) in &mut config.dotfiles {
        let candidates = std::mem::take(&mut machine.tracked_files);
        let total = candidates.len();
        let added = tracking::add_tracked_files(machine, candidates);
        if added < total {
            log.warn(&format!(
                "{id}: dropped {} duplicate tracked file(s)",
                total - added
            ));
        }

        let report = screen_candidates(std::mem::take(&mut machine.tracked_files), scanner, home, now);
        machine.tracked_files = report.files;
        for path in &report.demoted {
            log.warn(&format!("{id}: {path} will not be committed"));
        }
        log.info(&format!(
            "{id}: {} tracked file(s), {} demoted",
            machine.tracked_files.len(),
            report.demoted.len()
        ));
    }
}
