//! Tracked-file registry: which files belong to a machine's backup manifest.
//!
//! Deduplication is by exact source path and is first-write-wins: a later
//! candidate for a path that is already tracked is dropped, never merged.
//! The registry does not screen for secrets itself; callers decide the
//! `tracked` flag (see [`crate::secrets::screen`]) before handing candidates
//! over.
use std::collections::HashSet;

use crate::schema::types::{ExtraFields, MachineConfig, TrackedFile};

/// Repository location of `file_name` for `machine_id`.
///
/// Pure: the merge engine relies on equal inputs giving equal outputs.
#[must_use]
pub fn generate_repo_path(file_name: &str, machine_id: &str) -> String {
    format!("{machine_id}/{file_name}")
}

impl TrackedFile {
    /// Build a candidate with its repo path derived from `machine_id`.
    ///
    /// New candidates are symlink-eligible and git-tracked until screening
    /// says otherwise.
    #[must_use]
    pub fn new(name: &str, source_path: &str, machine_id: &str) -> Self {
        Self {
            name: name.to_string(),
            source_path: source_path.to_string(),
            repo_path: generate_repo_path(name, machine_id),
            symlink: true,
            tracked: true,
            symlink_created: None,
            symlink_created_at: None,
            symlink_target: None,
            backup_path: None,
            secret_scan: None,
            extra: ExtraFields::new(),
        }
    }
}

/// Append `candidates` to the machine's tracked files, skipping any whose
/// source path is already present (including repeats within `candidates`).
///
/// Returns the number of entries added.
pub fn add_tracked_files(
    machine: &mut MachineConfig,
    candidates: impl IntoIterator<Item = TrackedFile>,
) -> usize {
    let mut seen: HashSet<String> = machine
        .tracked_files
        .iter()
        .map(|f| f.source_path.clone())
        .collect();

    let before = machine.tracked_files.len();
    for candidate in candidates {
        if seen.insert(candidate.source_path.clone()) {
            machine.tracked_files.push(candidate);
        } else {
            tracing::debug!("already tracked: {}", candidate.source_path);
        }
    }
    machine.tracked_files.len() - before
}

/// Remove tracked files whose source path exactly matches one of `source_paths`.
///
/// Returns the number of entries removed.
pub fn remove_tracked_files<S: AsRef<str>>(
    machine: &mut MachineConfig,
    source_paths: &[S],
) -> usize {
    let doomed: HashSet<&str> = source_paths.iter().map(AsRef::as_ref).collect();
    let before = machine.tracked_files.len();
    machine
        .tracked_files
        .retain(|f| !doomed.contains(f.source_path.as_str()));
    before - machine.tracked_files.len()
}
