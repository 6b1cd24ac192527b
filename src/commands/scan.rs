//! Command: scan files for secrets.
use anyhow::Result;
use std::path::PathBuf;

use super::CommandSetup;
use crate::cli::{GlobalOpts, ScanOpts};
use crate::logging::Logger;
use crate::secrets::screen::collect_files;
use crate::secrets::{
    Action, ScanResult, is_known_secret_file, recommended_action, summarize,
};

/// Scan every file under `opts.paths` and report matches.
///
/// # Errors
///
/// Returns an error if settings or patterns are invalid, or if any file
/// contains secrets (so the command can gate a commit).
pub fn run(global: &GlobalOpts, opts: &ScanOpts, log: &Logger) -> Result<()> {
    let setup = CommandSetup::init(global, log)?;
    let scanner = setup.settings.scanner()?;
    log.debug(&format!("{} patterns loaded", scanner.pattern_count()));

    log.stage("Scanning for secrets");
    let files = expand_paths(&opts.paths);
    let mut results = Vec::with_capacity(files.len());
    let mut known = 0usize;
    for file in &files {
        let result = scanner.scan_file(file);
        if is_known_secret_file(file) {
            if !result.contains_secrets {
                known += 1;
            }
            log.warn(&format!("{}: known secret file, never commit it", file.display()));
        }
        report(&result, log);
        results.push(result);
    }

    let summary = summarize(&results);
    log.stage("Summary");
    log.info(&format!(
        "{} file(s), {} scanned, {} unscanned",
        summary.total_files, summary.scanned, summary.unscanned
    ));
    log.info(&format!(
        "{} match(es) in {} file(s): {} critical, {} high, {} medium, {} low",
        summary.total_matches,
        summary.files_with_secrets,
        summary.critical,
        summary.high,
        summary.medium,
        summary.low
    ));
    log.print_summary();

    let flagged = summary.files_with_secrets + known;
    if flagged > 0 {
        anyhow::bail!("{flagged} file(s) must not be committed");
    }
    Ok(())
}

/// Files to scan: directories are expanded recursively, other paths are
/// kept as given so that missing files are reported.
fn expand_paths(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            collect_files(path, &mut files);
        } else {
            files.push(path.clone());
        }
    }
    files
}

fn report(result: &ScanResult, log: &Logger) {
    let path = result.path.as_deref().unwrap_or("<input>");
    if !result.scanned {
        for issue in &result.errors {
            log.warn(&format!("{path}: not scanned ({issue})"));
        }
        return;
    }
    for m in &result.matches {
        log.finding(&format!(
            "{path}:{}:{} {} [{}] {}",
            m.line, m.column, m.pattern, m.severity, m.context
        ));
    }
    match recommended_action(result) {
        Action::Safe => log.debug(&format!("{path}: clean")),
        action => log.warn(&format!("{path}: {}", action.as_str())),
    }
}
