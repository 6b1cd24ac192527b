//! Consistency checks for a schema document.
//!
//! Warnings never block an export; the command layer logs them.
use std::collections::{BTreeSet, HashSet};

use super::types::{BackupConfig, machine_id};

/// A validation warning found in a schema document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationWarning {
    /// Document section (`systems`, `dotfiles`).
    pub source: String,
    /// Machine id or path that triggered the warning.
    pub item: String,
    /// Human-readable warning message.
    pub message: String,
}

impl ValidationWarning {
    /// Build a warning from its source, item and message.
    #[must_use]
    pub fn new(
        source: impl Into<String>,
        item: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            item: item.into(),
            message: message.into(),
        }
    }
}

/// A check over one section of the document.
pub trait DocumentValidator {
    /// Validate `config` and return any warnings found.
    fn validate(&self, config: &BackupConfig) -> Vec<ValidationWarning>;

    /// Section name used as the warning source.
    fn name(&self) -> &'static str;
}

/// Checks the `systems` list and its pairing with `dotfiles`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemsValidator;

impl DocumentValidator for SystemsValidator {
    fn validate(&self, config: &BackupConfig) -> Vec<ValidationWarning> {
        let mut warnings = Vec::new();
        let mut seen = HashSet::new();

        for system in &config.systems {
            let id = &system.machine_id;
            if !seen.insert(id.as_str()) {
                warnings.push(ValidationWarning::new(self.name(), id, "duplicate machine id"));
            }
            let expected = machine_id(&system.os, &system.distro, &system.nickname);
            if *id != expected {
                warnings.push(ValidationWarning::new(
                    self.name(),
                    id,
                    format!("machine id does not match its components (expected '{expected}')"),
                ));
            }
            if !config.dotfiles.contains_key(id) {
                warnings.push(ValidationWarning::new(
                    self.name(),
                    id,
                    "system has no dotfiles entry",
                ));
            }
        }

        for id in config.dotfiles.keys() {
            if !seen.contains(id.as_str()) {
                warnings.push(ValidationWarning::new(
                    "dotfiles",
                    id,
                    "dotfiles entry has no matching system",
                ));
            }
        }
        warnings
    }

    fn name(&self) -> &'static str {
        "systems"
    }
}

/// Checks the tracked files of every machine.
#[derive(Debug, Default, Clone, Copy)]
pub struct TrackedFilesValidator;

impl DocumentValidator for TrackedFilesValidator {
    fn validate(&self, config: &BackupConfig) -> Vec<ValidationWarning> {
        let mut warnings = Vec::new();

        for (id, machine) in &config.dotfiles {
            let prefix = format!("{id}/");
            let mut sources = BTreeSet::new();

            for file in &machine.tracked_files {
                if !sources.insert(file.source_path.as_str()) {
                    warnings.push(ValidationWarning::new(
                        self.name(),
                        &file.source_path,
                        format!("duplicate source path for {id}"),
                    ));
                }
                if !file.repo_path.starts_with(&prefix) {
                    warnings.push(ValidationWarning::new(
                        self.name(),
                        &file.source_path,
                        format!("repo path '{}' is outside '{prefix}'", file.repo_path),
                    ));
                }
                if file.tracked
                    && let Some(scan) = file.secret_scan
                    && scan.outcome.is_unsafe()
                {
                    warnings.push(ValidationWarning::new(
                        self.name(),
                        &file.source_path,
                        "git-tracked despite a failed secret scan",
                    ));
                }
            }
        }
        warnings
    }

    fn name(&self) -> &'static str {
        "dotfiles"
    }
}

impl BackupConfig {
    /// Run every document check.
    #[must_use]
    pub fn validate(&self) -> Vec<ValidationWarning> {
        let validators: [&dyn DocumentValidator; 2] = [&SystemsValidator, &TrackedFilesValidator];
        validators.iter().flat_map(|v| v.validate(self)).collect()
    }
}
