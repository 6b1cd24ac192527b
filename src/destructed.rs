//! Safety log of every file a restore or symlink operation overwrote.
//!
//! Before anything in the user's home is replaced, the caller copies the
//! current content into the backups directory and appends an entry here. The
//! log lives outside the backup repository (by default
//! `~/.local/state/dotsync/destructed-files.json`) and is written as one JSON
//! document `{ "entries": [...] }` with temp-file-plus-rename.
//!
//! Entries are never edited. The only way out of the log is
//! [`DestructedFilesLog::cleanup_old_destructed_files`], and only once the
//! backup copy an entry points at is confirmed deleted.
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use crate::error::LogError;
use crate::fs::normalize_path;
use crate::operations::FileSystemOps;

/// File name of the log inside the state directory.
pub const LOG_FILE_NAME: &str = "destructed-files.json";

/// Directory inside the state directory holding backup copies.
pub const BACKUPS_DIR_NAME: &str = "backups";

/// Why a file was overwritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DestructionReason {
    /// Replaced by a symlink into the repository.
    SymlinkReplace,
    /// Overwritten by a restored copy.
    Overwrite,
    /// Preserved on explicit request.
    Manual,
}

impl DestructionReason {
    /// Wire name of the reason.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SymlinkReplace => "symlink-replace",
            Self::Overwrite => "overwrite",
            Self::Manual => "manual",
        }
    }
}

impl fmt::Display for DestructionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DestructionReason {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "symlink-replace" => Ok(Self::SymlinkReplace),
            "overwrite" => Ok(Self::Overwrite),
            "manual" => Ok(Self::Manual),
            other => Err(format!(
                "unknown reason '{other}' (expected symlink-replace, overwrite or manual)"
            )),
        }
    }
}

/// One logged overwrite.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DestructedFileEntry {
    /// Machine the file was overwritten on.
    pub machine_id: String,
    /// Absolute path that was overwritten.
    pub original_path: String,
    /// Where the previous content was copied.
    pub backup_path: String,
    /// Why the file was overwritten.
    pub reason: DestructionReason,
    /// Whether the backup can be copied back.
    pub restoreable: bool,
    /// When the entry was appended.
    pub timestamp: DateTime<Utc>,
    /// Lowercase hex SHA-256 of the backup, for single-file backups.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
}

/// Input to [`DestructedFilesLog::log_destructed_file`]; the timestamp is
/// assigned by the log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDestructedFile {
    /// Machine the file is overwritten on.
    pub machine_id: String,
    /// Absolute path about to be overwritten.
    pub original_path: String,
    /// Where its current content was copied.
    pub backup_path: String,
    /// Why it is overwritten.
    pub reason: DestructionReason,
    /// Whether the backup can be copied back.
    pub restoreable: bool,
    /// Hex SHA-256 of a single-file backup.
    pub checksum: Option<String>,
}

/// Outcome of an age-based purge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupReport {
    /// Entries whose backup was deleted and which left the log.
    pub removed: usize,
    /// Expired entries kept because their backup could not be deleted.
    pub retained: usize,
}

#[derive(Debug, Default, Deserialize)]
struct LogDocument {
    #[serde(default)]
    entries: Vec<DestructedFileEntry>,
}

#[derive(Serialize)]
struct LogDocumentRef<'a> {
    entries: &'a [DestructedFileEntry],
}

/// The destructed-files log, loaded into memory.
pub struct DestructedFilesLog {
    path: PathBuf,
    fs: Arc<dyn FileSystemOps>,
    entries: Vec<DestructedFileEntry>,
}

impl fmt::Debug for DestructedFilesLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DestructedFilesLog")
            .field("path", &self.path)
            .field("entries", &self.entries.len())
            .finish_non_exhaustive()
    }
}

impl DestructedFilesLog {
    /// Load the log at `path`. A missing file is an empty log.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn open(path: impl Into<PathBuf>, fs: Arc<dyn FileSystemOps>) -> Result<Self, LogError> {
        let path = path.into();
        let entries = match fs.read_to_string(&path) {
            Ok(content) => {
                let doc: LogDocument = serde_json::from_str(&content).map_err(|source| {
                    LogError::Parse {
                        path: path.clone(),
                        source,
                    }
                })?;
                doc.entries
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Vec::new(),
            Err(source) => return Err(LogError::Read { path, source }),
        };
        tracing::debug!("loaded {} destructed entries from {}", entries.len(), path.display());
        Ok(Self { path, fs, entries })
    }

    /// Path of the log document.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Every entry, oldest first.
    #[must_use]
    pub fn entries(&self) -> &[DestructedFileEntry] {
        &self.entries
    }

    /// Entries recorded on `machine_id`.
    #[must_use]
    pub fn by_machine(&self, machine_id: &str) -> Vec<&DestructedFileEntry> {
        self.entries
            .iter()
            .filter(|e| e.machine_id == machine_id)
            .collect()
    }

    /// Entries logged for `reason`.
    #[must_use]
    pub fn by_reason(&self, reason: DestructionReason) -> Vec<&DestructedFileEntry> {
        self.entries.iter().filter(|e| e.reason == reason).collect()
    }

    /// Entries whose backup can be restored.
    #[must_use]
    pub fn restoreable(&self) -> Vec<&DestructedFileEntry> {
        self.entries.iter().filter(|e| e.restoreable).collect()
    }

    /// Append `entry`, stamped with the current time, and persist the log.
    ///
    /// # Errors
    ///
    /// Returns an error if the log cannot be written; the entry is then not
    /// kept in memory either.
    pub fn log_destructed_file(
        &mut self,
        entry: NewDestructedFile,
    ) -> Result<&DestructedFileEntry, LogError> {
        self.log_destructed_file_at(entry, Utc::now())
    }

    /// [`log_destructed_file`](Self::log_destructed_file) with a fixed time.
    ///
    /// # Errors
    ///
    /// Returns an error if the log cannot be written.
    pub fn log_destructed_file_at(
        &mut self,
        entry: NewDestructedFile,
        now: DateTime<Utc>,
    ) -> Result<&DestructedFileEntry, LogError> {
        self.entries.push(DestructedFileEntry {
            machine_id: entry.machine_id,
            original_path: entry.original_path,
            backup_path: entry.backup_path,
            reason: entry.reason,
            restoreable: entry.restoreable,
            timestamp: now,
            checksum: entry.checksum,
        });
        if let Err(e) = self.persist() {
            self.entries.pop();
            return Err(e);
        }
        self.entries.last().ok_or_else(|| {
            LogError::Serialize(serde::ser::Error::custom("appended entry vanished"))
        })
    }

    /// Copy the current content of `original` into `backups_dir` and log it.
    ///
    /// Call this immediately before overwriting `original`.
    ///
    /// # Errors
    ///
    /// Returns an error if nothing exists at `original`, the copy fails or
    /// the log cannot be written.
    pub fn preserve(
        &mut self,
        original: &Path,
        machine_id: &str,
        reason: DestructionReason,
        backups_dir: &Path,
    ) -> Result<&DestructedFileEntry, LogError> {
        self.preserve_at(original, machine_id, reason, backups_dir, Utc::now())
    }

    /// [`preserve`](Self::preserve) with a fixed time.
    ///
    /// # Errors
    ///
    /// See [`preserve`](Self::preserve).
    pub fn preserve_at(
        &mut self,
        original: &Path,
        machine_id: &str,
        reason: DestructionReason,
        backups_dir: &Path,
        now: DateTime<Utc>,
    ) -> Result<&DestructedFileEntry, LogError> {
        if !self.fs.exists(original) {
            return Err(LogError::NothingToPreserve(original.to_path_buf()));
        }
        let mut backup = backup_path_for(original, machine_id, backups_dir, now, 0);
        let mut attempt = 0;
        while self.fs.exists(&backup) {
            attempt += 1;
            backup = backup_path_for(original, machine_id, backups_dir, now, attempt);
        }
        self.fs
            .copy_recursive(original, &backup)
            .map_err(|source| LogError::Backup {
                original: original.to_path_buf(),
                backup: backup.clone(),
                source,
            })?;

        let checksum = self.fs.read(&backup).ok().map(|bytes| sha256_hex(&bytes));
        tracing::debug!("preserved {} at {}", original.display(), backup.display());

        self.log_destructed_file_at(
            NewDestructedFile {
                machine_id: machine_id.to_string(),
                original_path: original.display().to_string(),
                backup_path: backup.display().to_string(),
                reason,
                restoreable: true,
                checksum,
            },
            now,
        )
    }

    /// Most recent entry for `path`, compared after lexical normalization.
    #[must_use]
    pub fn find_destructed_file(&self, path: &Path) -> Option<&DestructedFileEntry> {
        let wanted = normalize_path(path);
        self.entries
            .iter()
            .rev()
            .find(|e| normalize_path(Path::new(&e.original_path)) == wanted)
    }

    /// Copy the backup of `entry` back to its original path.
    ///
    /// A symlink at the original path is removed first, so the restore never
    /// writes through it into the repository. Whatever else is at the
    /// original path is replaced whole: a restored directory holds exactly the
    /// backup's entries. Returns `false` when the backup is missing, fails its
    /// checksum or cannot be copied.
    #[must_use]
    pub fn restore_destructed_file(&self, entry: &DestructedFileEntry) -> bool {
        let backup = Path::new(&entry.backup_path);
        let original = Path::new(&entry.original_path);

        if !self.fs.exists(backup) {
            tracing::warn!("backup {} no longer exists", backup.display());
            return false;
        }
        if let Some(expected) = &entry.checksum
            && let Ok(bytes) = self.fs.read(backup)
            && sha256_hex(&bytes) != *expected
        {
            tracing::warn!("backup {} does not match its checksum", backup.display());
            return false;
        }
        if self.fs.is_symlink(original)
            && let Err(e) = self.fs.remove(original)
        {
            tracing::warn!("cannot remove symlink {}: {e}", original.display());
            return false;
        }

        match self.fs.replace_recursive(backup, original) {
            Ok(()) => {
                tracing::debug!("restored {} from {}", original.display(), backup.display());
                true
            }
            Err(e) => {
                tracing::warn!("cannot restore {}: {e}", original.display());
                false
            }
        }
    }

    /// Purge entries older than `max_age_days`.
    ///
    /// # Errors
    ///
    /// Returns an error if the log cannot be written after a removal.
    pub fn cleanup_old_destructed_files(
        &mut self,
        max_age_days: u32,
    ) -> Result<CleanupReport, LogError> {
        self.cleanup_old_destructed_files_at(max_age_days, Utc::now())
    }

    /// Purge entries whose timestamp is at or before `now - max_age_days`.
    ///
    /// An expired entry leaves the log only after its backup was deleted. A
    /// backup that is already missing, or whose deletion fails, keeps the
    /// entry and counts as retained. The timestamped directory holding a
    /// deleted backup is removed too once it is empty. An age reaching
    /// past the earliest representable time expires nothing.
    ///
    /// # Errors
    ///
    /// Returns an error if the log cannot be written after a removal.
    pub fn cleanup_old_destructed_files_at(
        &mut self,
        max_age_days: u32,
        now: DateTime<Utc>,
    ) -> Result<CleanupReport, LogError> {
        let Some(cutoff) = Duration::try_days(i64::from(max_age_days))
            .and_then(|age| now.checked_sub_signed(age))
        else {
            tracing::debug!("no entry can be {max_age_days} days old, nothing to purge");
            return Ok(CleanupReport::default());
        };
        let mut report = CleanupReport::default();
        let mut kept = Vec::with_capacity(self.entries.len());

        for entry in std::mem::take(&mut self.entries) {
            if entry.timestamp > cutoff {
                kept.push(entry);
                continue;
            }
            let backup = Path::new(&entry.backup_path);
            if !self.fs.exists(backup) {
                tracing::warn!(
                    "keeping entry for {}: backup {} is missing",
                    entry.original_path,
                    backup.display()
                );
                report.retained += 1;
                kept.push(entry);
                continue;
            }
            match self.fs.remove(backup) {
                Ok(()) => {
                    report.removed += 1;
                    if let Some(stamp_dir) = backup.parent()
                        && let Err(e) = self.fs.remove_empty_dir(stamp_dir)
                    {
                        tracing::debug!("leaving {}: {e}", stamp_dir.display());
                    }
                }
                Err(e) => {
                    tracing::warn!("cannot delete backup {}: {e}", backup.display());
                    report.retained += 1;
                    kept.push(entry);
                }
            }
        }
        self.entries = kept;

        if report.removed > 0 {
            self.persist()?;
        }
        Ok(report)
    }

    fn persist(&self) -> Result<(), LogError> {
        let mut json = serde_json::to_string_pretty(&LogDocumentRef {
            entries: &self.entries,
        })
        .map_err(LogError::Serialize)?;
        json.push('\n');
        self.fs
            .write_atomic(&self.path, json.as_bytes())
            .map_err(|source| LogError::Write {
                path: self.path.clone(),
                source,
            })
    }
}

/// `<backups_dir>/<machine_id>/<UTC timestamp>[-<attempt>]/<file name>`.
fn backup_path_for(
    original: &Path,
    machine_id: &str,
    backups_dir: &Path,
    now: DateTime<Utc>,
    attempt: u32,
) -> PathBuf {
    let name = original
        .file_name()
        .map_or_else(|| "root".into(), |n| n.to_string_lossy().into_owned());
    let mut stamp = now.format("%Y%m%dT%H%M%S%.3fZ").to_string();
    if attempt > 0 {
        stamp = format!("{stamp}-{attempt}");
    }
    backups_dir.join(machine_id).join(stamp).join(name)
}

/// Lowercase hex SHA-256 digest of `bytes`.
fn sha256_hex(bytes: &[u8]) -> String {
    use sha2::{Digest, Sha256};
    use std::fmt::Write as _;

    let digest = Sha256::digest(bytes);
    let mut hex = String::with_capacity(64);
    for b in &digest {
        // write! to a String is infallible.
        write!(hex, "{b:02x}").unwrap_or(());
    }
    hex
}
