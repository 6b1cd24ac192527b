//! Schema document types.
//!
//! Everything here serializes with `camelCase` keys. Optional fields are
//! skipped when absent so a document written by this crate parses back to an
//! identical value. The document, its systems, machines and tracked files
//! keep keys they do not model in an `extra` map, so fields written by other
//! tools or newer versions survive a parse, merge and rewrite.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Current schema version written by this crate.
pub const SCHEMA_VERSION: &str = "1.0.0";

/// Unmodelled JSON keys of one object.
pub type ExtraFields = serde_json::Map<String, serde_json::Value>;

/// The schema document stored at the root of the shared repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupConfig {
    /// Schema version string.
    pub version: String,
    /// Document timestamps.
    pub metadata: SchemaMetadata,
    /// Destination repository description.
    #[serde(default)]
    pub repo: RepoInfo,
    /// Every machine that has exported into this repository, in first-seen order.
    #[serde(default)]
    pub systems: Vec<SystemMetadata>,
    /// Per-machine configuration keyed by machine identifier.
    #[serde(default)]
    pub dotfiles: BTreeMap<String, MachineConfig>,
    /// Keys this crate does not model, carried through unchanged.
    #[serde(flatten)]
    pub extra: ExtraFields,
}

impl BackupConfig {
    /// Create an empty document stamped with `now`.
    #[must_use]
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            version: SCHEMA_VERSION.to_string(),
            metadata: SchemaMetadata {
                created_at: now,
                updated_at: now,
            },
            repo: RepoInfo::default(),
            systems: Vec::new(),
            dotfiles: BTreeMap::new(),
            extra: ExtraFields::new(),
        }
    }

    /// Insert or replace one machine, keeping `systems` and `dotfiles` in step.
    pub fn upsert_machine(&mut self, system: SystemMetadata, machine: MachineConfig) {
        let id = system.machine_id.clone();
        match self.systems.iter_mut().find(|s| s.machine_id == id) {
            Some(existing) => *existing = system,
            None => self.systems.push(system),
        }
        self.dotfiles.insert(id, machine);
    }

    /// Look up the system entry for `machine_id`.
    #[must_use]
    pub fn system(&self, machine_id: &str) -> Option<&SystemMetadata> {
        self.systems.iter().find(|s| s.machine_id == machine_id)
    }
}

/// Created / updated timestamps of the schema document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaMetadata {
    /// When the document was first written.
    pub created_at: DateTime<Utc>,
    /// When the document was last merged or written.
    pub updated_at: DateTime<Utc>,
}

/// Description of the shared backup repository.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepoInfo {
    /// Hosting type (e.g. `github`, `gitlab`, `local`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo_type: Option<String>,
    /// Repository name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo_name: Option<String>,
    /// Clone URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo_url: Option<String>,
    /// Owning account.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo_owner: Option<String>,
    /// Branch backups are pushed to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    /// `public` or `private`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<String>,
    /// Hosting-provider access token. Session-only, never serialized.
    #[serde(skip)]
    pub token: Option<String>,
}

/// Desktop session details, when the machine has one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DesktopMetadata {
    /// Desktop environment (`gnome`, `kde`, `aqua`, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,
    /// Session type (`wayland`, `x11`, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_type: Option<String>,
}

/// One physical machine participating in the repository.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemMetadata {
    /// OS class: `linux`, `macos` or `windows`.
    pub os: String,
    /// Distribution id (`arch`, `ubuntu`, `darwin`, ...).
    pub distro: String,
    /// User-chosen nickname, stable across runs.
    pub nickname: String,
    /// `<os>-<distro>-<nickname>`.
    pub machine_id: String,
    /// Login shell id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shell: Option<String>,
    /// Shell RC file name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shell_config_file: Option<String>,
    /// Desktop session details.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desktop: Option<DesktopMetadata>,
    /// Keys this crate does not model, carried through unchanged.
    #[serde(flatten)]
    pub extra: ExtraFields,
}

/// Build a machine identifier from its three components.
///
/// Components are lower-cased and runs of whitespace become a single `-`.
#[must_use]
pub fn machine_id(os: &str, distro: &str, nickname: &str) -> String {
    [os, distro, nickname]
        .iter()
        .map(|part| {
            part.split_whitespace()
                .collect::<Vec<_>>()
                .join("-")
                .to_lowercase()
        })
        .collect::<Vec<_>>()
        .join("-")
}

/// Outcome of the secret screening of a tracked file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScanOutcome {
    /// Content scanned, nothing found.
    Clean,
    /// Content scanned, at least one pattern matched.
    SecretsFound,
    /// Excluded by filename before scanning.
    KnownSecretFile,
    /// Not scanned (binary, oversized, unreadable or missing).
    Unscanned,
}

impl ScanOutcome {
    /// Whether this outcome forbids committing the file.
    #[must_use]
    pub const fn is_unsafe(self) -> bool {
        matches!(self, Self::SecretsFound | Self::KnownSecretFile)
    }
}

/// Recorded result of screening one tracked file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretScanRecord {
    /// What the screening concluded.
    pub outcome: ScanOutcome,
    /// When the screening ran.
    pub scanned_at: DateTime<Utc>,
}

/// One file or directory backed up into the repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackedFile {
    /// Logical name, also the file name inside the machine's repo folder.
    pub name: String,
    /// Location on the machine.
    pub source_path: String,
    /// Location inside the repository, always `<machineId>/<name>`.
    pub repo_path: String,
    /// Whether the original may be replaced by a symlink into the repo.
    #[serde(default)]
    pub symlink: bool,
    /// Whether the copy is committed to git.
    #[serde(default)]
    pub tracked: bool,
    /// Whether the symlink has been created.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symlink_created: Option<bool>,
    /// When the symlink was created.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symlink_created_at: Option<DateTime<Utc>>,
    /// Where the symlink points.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symlink_target: Option<String>,
    /// Pre-overwrite copy taken before the symlink replaced the original.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup_path: Option<String>,
    /// Last secret screening.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_scan: Option<SecretScanRecord>,
    /// Keys this crate does not model, carried through unchanged.
    #[serde(flatten)]
    pub extra: ExtraFields,
}

/// A secret file handled outside git (kept locally, optionally encrypted elsewhere).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretFile {
    /// Logical name.
    pub name: String,
    /// Location on the machine.
    pub source_path: String,
    /// Whether an external tool encrypts it.
    #[serde(default)]
    pub encrypted: bool,
    /// Raw content captured during a session. Never serialized.
    #[serde(skip)]
    pub value: Option<String>,
}

/// How secret-bearing files are handled on this machine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretsPolicy {
    /// Whether screening is enabled.
    #[serde(default)]
    pub enabled: bool,
    /// Files recognised as secrets.
    #[serde(default)]
    pub secret_files: Vec<SecretFile>,
}

/// What to do with an existing file at a symlink target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictResolution {
    /// Preserve the existing file in the destructed log, then replace it.
    #[default]
    Backup,
    /// Replace it without a copy.
    Overwrite,
    /// Leave it alone.
    Skip,
}

/// Symlink behaviour on this machine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymlinkPolicy {
    /// Whether tracked files are symlinked back.
    #[serde(default)]
    pub enabled: bool,
    /// Handling of pre-existing targets.
    #[serde(default)]
    pub conflict_resolution: ConflictResolution,
}

/// One installed package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Package {
    /// Package name.
    pub name: String,
    /// Installed version, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// One runtime managed by a version manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Runtime {
    /// Language or tool (`node`, `python`, ...).
    pub language: String,
    /// Installed versions.
    #[serde(default)]
    pub versions: Vec<String>,
    /// Default version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_version: Option<String>,
}

/// Full per-machine bundle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MachineConfig {
    /// Files backed up from this machine.
    #[serde(default)]
    pub tracked_files: Vec<TrackedFile>,
    /// Secret handling.
    #[serde(default)]
    pub secrets: SecretsPolicy,
    /// Symlink handling.
    #[serde(default)]
    pub symlinks: SymlinkPolicy,
    /// Packages by manager (`brew`, `pacman`, ...). Regenerated every run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub packages: Option<BTreeMap<String, Vec<Package>>>,
    /// Editor extensions by editor. Regenerated every run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<BTreeMap<String, Vec<String>>>,
    /// Runtimes by version manager. Regenerated every run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtimes: Option<BTreeMap<String, Vec<Runtime>>>,
    /// Keys this crate does not model, carried through unchanged.
    #[serde(flatten)]
    pub extra: ExtraFields,
}
