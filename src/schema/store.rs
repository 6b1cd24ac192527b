//! Reading, merging and writing the schema document in a backup repository.
//!
//! A [`SchemaStore`] owns the repository path and the filesystem handle for
//! one export. Nothing is cached between stores: every export reads the
//! current document fresh, merges, sanitizes and writes it back atomically.
use chrono::{DateTime, Utc};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::merge::merge_configs_at;
use super::types::{
    BackupConfig, DesktopMetadata, ExtraFields, MachineConfig, RepoInfo, SchemaMetadata,
    SecretFile, SecretsPolicy, SystemMetadata, TrackedFile,
};
use crate::error::SchemaError;
use crate::operations::{FileSystemOps, SystemFileSystemOps};

/// File name of the schema document at the repository root.
pub const SCHEMA_FILE_NAME: &str = "backup-config.json";

/// Result of reading the schema document.
#[derive(Debug)]
pub enum LoadOutcome {
    /// No document exists yet.
    NotFound,
    /// The document was read and parsed.
    Loaded(Box<BackupConfig>),
    /// The document exists but could not be read or parsed.
    Unreadable(SchemaError),
}

/// Outcome of [`export_schema_to_repo`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportResult {
    /// Whether the document was written.
    pub success: bool,
    /// Failure description when `success` is false.
    pub error: Option<String>,
    /// Whether an existing document was merged in.
    pub merged: bool,
    /// Path of the schema document.
    pub path: PathBuf,
}

/// Schema document access for one repository.
pub struct SchemaStore {
    repo_path: PathBuf,
    fs: Arc<dyn FileSystemOps>,
}

impl fmt::Debug for SchemaStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaStore")
            .field("repo_path", &self.repo_path)
            .finish_non_exhaustive()
    }
}

impl SchemaStore {
    /// Create a store for the repository at `repo_path`.
    #[must_use]
    pub fn new(repo_path: impl Into<PathBuf>, fs: Arc<dyn FileSystemOps>) -> Self {
        Self {
            repo_path: repo_path.into(),
            fs,
        }
    }

    /// Path of the schema document.
    #[must_use]
    pub fn schema_path(&self) -> PathBuf {
        self.repo_path.join(SCHEMA_FILE_NAME)
    }

    /// Read the current document.
    #[must_use]
    pub fn load(&self) -> LoadOutcome {
        let path = self.schema_path();
        let content = match self.fs.read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return LoadOutcome::NotFound,
            Err(source) => return LoadOutcome::Unreadable(SchemaError::Read { path, source }),
        };
        match serde_json::from_str(&content) {
            Ok(config) => LoadOutcome::Loaded(Box::new(config)),
            Err(source) => LoadOutcome::Unreadable(SchemaError::Parse { path, source }),
        }
    }

    /// Sanitize and write `config`, replacing any existing document.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the atomic write fails.
    pub fn save(&self, config: &BackupConfig) -> Result<PathBuf, SchemaError> {
        let path = self.schema_path();
        let mut json =
            serde_json::to_string_pretty(&sanitize_config(config)).map_err(SchemaError::Serialize)?;
        json.push('\n');
        self.fs
            .write_atomic(&path, json.as_bytes())
            .map_err(|source| SchemaError::Write {
                path: path.clone(),
                source,
            })?;
        Ok(path)
    }

    /// Merge `config` into the current document and write the result.
    #[must_use]
    pub fn export(&self, config: &BackupConfig) -> ExportResult {
        self.export_at(config, Utc::now())
    }

    /// [`export`](Self::export) with a fixed merge time.
    #[must_use]
    pub fn export_at(&self, config: &BackupConfig, now: DateTime<Utc>) -> ExportResult {
        let (document, merged) = match self.load() {
            LoadOutcome::NotFound => {
                tracing::debug!("no schema at {}, starting fresh", self.schema_path().display());
                (config.clone(), false)
            }
            LoadOutcome::Loaded(existing) => (merge_configs_at(&existing, config, now), true),
            LoadOutcome::Unreadable(e) => {
                tracing::warn!("ignoring existing schema: {e}");
                (config.clone(), false)
            }
        };

        match self.save(&document) {
            Ok(path) => ExportResult {
                success: true,
                error: None,
                merged,
                path,
            },
            Err(e) => ExportResult {
                success: false,
                error: Some(e.to_string()),
                merged,
                path: self.schema_path(),
            },
        }
    }
}

/// Export `config` to the repository at `repo_path`, merging with any
/// document already there.
#[must_use]
pub fn export_schema_to_repo(config: &BackupConfig, repo_path: &Path) -> ExportResult {
    SchemaStore::new(repo_path, Arc::new(SystemFileSystemOps)).export(config)
}

/// Unmodelled keys that may carry secret material; matched without regard to
/// ASCII case and never persisted.
pub const SECRET_EXTRA_KEYS: &[&str] = &[
    "token",
    "accessToken",
    "apiKey",
    "password",
    "secret",
    "value",
];

/// Build the persisted copy of `config`.
///
/// Each section is copied field by field, so a field added to the in-memory
/// types is not persisted until it is listed here. Tokens and secret values
/// never leave memory. Unmodelled keys are copied too, except those named in
/// [`SECRET_EXTRA_KEYS`].
#[must_use]
pub fn sanitize_config(config: &BackupConfig) -> BackupConfig {
    BackupConfig {
        version: config.version.clone(),
        metadata: SchemaMetadata {
            created_at: config.metadata.created_at,
            updated_at: config.metadata.updated_at,
        },
        repo: RepoInfo {
            repo_type: config.repo.repo_type.clone(),
            repo_name: config.repo.repo_name.clone(),
            repo_url: config.repo.repo_url.clone(),
            repo_owner: config.repo.repo_owner.clone(),
            branch: config.repo.branch.clone(),
            visibility: config.repo.visibility.clone(),
            token: None,
        },
        systems: config.systems.iter().map(sanitize_system).collect(),
        dotfiles: config
            .dotfiles
            .iter()
            .map(|(id, machine)| (id.clone(), sanitize_machine(machine)))
            .collect(),
        extra: sanitize_extra(&config.extra),
    }
}

fn sanitize_extra(extra: &ExtraFields) -> ExtraFields {
    extra
        .iter()
        .filter(|(key, _)| {
            let secret = SECRET_EXTRA_KEYS
                .iter()
                .any(|s| key.eq_ignore_ascii_case(s));
            if secret {
                tracing::debug!("not persisting unmodelled key '{key}'");
            }
            !secret
        })
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

fn sanitize_system(system: &SystemMetadata) -> SystemMetadata {
    SystemMetadata {
        os: system.os.clone(),
        distro: system.distro.clone(),
        nickname: system.nickname.clone(),
        machine_id: system.machine_id.clone(),
        shell: system.shell.clone(),
        shell_config_file: system.shell_config_file.clone(),
        desktop: system.desktop.as_ref().map(|d| DesktopMetadata {
            environment: d.environment.clone(),
            session_type: d.session_type.clone(),
        }),
        extra: sanitize_extra(&system.extra),
    }
}

fn sanitize_machine(machine: &MachineConfig) -> MachineConfig {
    MachineConfig {
        tracked_files: machine
            .tracked_files
            .iter()
            .map(|f| TrackedFile {
                name: f.name.clone(),
                source_path: f.source_path.clone(),
                repo_path: f.repo_path.clone(),
                symlink: f.symlink,
                tracked: f.tracked,
                symlink_created: f.symlink_created,
                symlink_created_at: f.symlink_created_at,
                symlink_target: f.symlink_target.clone(),
                backup_path: f.backup_path.clone(),
                secret_scan: f.secret_scan,
                extra: sanitize_extra(&f.extra),
            })
            .collect(),
        secrets: SecretsPolicy {
            enabled: machine.secrets.enabled,
            secret_files: machine
                .secrets
                .secret_files
                .iter()
                .map(|s| SecretFile {
                    name: s.name.clone(),
                    source_path: s.source_path.clone(),
                    encrypted: s.encrypted,
                    value: None,
                })
                .collect(),
        },
        symlinks: machine.symlinks,
        packages: machine.packages.clone(),
        extensions: machine.extensions.clone(),
        runtimes: machine.runtimes.clone(),
        extra: sanitize_extra(&machine.extra),
    }
}

#[cfg(test)]
#[allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::indexing_slicing,
    clippy::panic
)]
mod tests {
    use super::*;
    use crate::operations::MockFileSystemOps;
    use crate::schema::types::machine_id;

    fn ts(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    fn config_for(nickname: &str, files: &[&str]) -> BackupConfig {
        let id = machine_id("linux", "arch", nickname);
        let mut config = BackupConfig::new(ts("2026-01-01T00:00:00Z"));
        let mut machine = MachineConfig::default();
        for name in files {
            machine
                .tracked_files
                .push(TrackedFile::new(name, &format!("~/{name}"), &id));
        }
        config.upsert_machine(
            SystemMetadata {
                os: "linux".into(),
                distro: "arch".into(),
                nickname: nickname.into(),
                machine_id: id,
                ..SystemMetadata::default()
            },
            machine,
        );
        config
    }

    fn system_store(dir: &Path) -> SchemaStore {
        SchemaStore::new(dir, Arc::new(SystemFileSystemOps))
    }

    #[test]
    fn load_missing_document_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(system_store(dir.path()).load(), LoadOutcome::NotFound));
    }

    #[test]
    fn load_malformed_document_is_unreadable() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(SCHEMA_FILE_NAME), "{ not json").unwrap();
        assert!(matches!(
            system_store(dir.path()).load(),
            LoadOutcome::Unreadable(SchemaError::Parse { .. })
        ));
    }

    #[test]
    fn export_fresh_then_merge() {
        let dir = tempfile::tempdir().unwrap();
        let store = system_store(dir.path());

        let first = store.export_at(&config_for("desk", &[".zshrc"]), ts("2026-02-01T00:00:00Z"));
        assert!(first.success);
        assert!(!first.merged);

        let second = store.export_at(&config_for("laptop", &[".vimrc"]), ts("2026-03-01T00:00:00Z"));
        assert!(second.success);
        assert!(second.merged);

        let LoadOutcome::Loaded(doc) = store.load() else {
            panic!("document should load");
        };
        assert_eq!(doc.systems.len(), 2);
        assert_eq!(doc.dotfiles.len(), 2);
        assert_eq!(doc.metadata.updated_at, ts("2026-03-01T00:00:00Z"));
    }

    #[test]
    fn export_over_malformed_document_starts_fresh() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(SCHEMA_FILE_NAME), "[]").unwrap();

        let result = system_store(dir.path()).export(&config_for("desk", &[".zshrc"]));
        assert!(result.success);
        assert!(!result.merged);
        let written = std::fs::read_to_string(&result.path).unwrap();
        assert!(written.contains("linux-arch-desk"));
        assert!(written.ends_with('\n'));
    }

    #[test]
    fn export_write_failure_is_reported_not_raised() {
        let mut fs = MockFileSystemOps::new();
        fs.expect_read_to_string()
            .returning(|_| Err(io::Error::from(io::ErrorKind::NotFound)));
        fs.expect_write_atomic()
            .returning(|_, _| Err(io::Error::from(io::ErrorKind::PermissionDenied)));

        let store = SchemaStore::new("/repo", Arc::new(fs));
        let result = store.export(&config_for("desk", &[".zshrc"]));
        assert!(!result.success);
        assert!(result.error.unwrap().contains("failed to write schema"));
        assert_eq!(result.path, Path::new("/repo").join(SCHEMA_FILE_NAME));
    }

    #[test]
    fn unreadable_document_is_not_overwritten_by_a_merge() {
        let mut fs = MockFileSystemOps::new();
        fs.expect_read_to_string()
            .returning(|_| Err(io::Error::from(io::ErrorKind::PermissionDenied)));
        fs.expect_write_atomic().times(1).returning(|_, _| Ok(()));

        let result = SchemaStore::new("/repo", Arc::new(fs)).export(&config_for("desk", &[]));
        assert!(result.success);
        assert!(!result.merged);
    }

    #[test]
    fn sanitize_drops_token_and_secret_values() {
        let mut config = config_for("desk", &[".zshrc"]);
        config.repo.token = Some("ghp_super_secret".into());
        config.repo.repo_name = Some("dotfiles".into());
        let machine = config.dotfiles.values_mut().next().unwrap();
        machine.secrets.enabled = true;
        machine.secrets.secret_files.push(SecretFile {
            name: "aws".into(),
            source_path: "~/.aws/credentials".into(),
            encrypted: true,
            value: Some("AKIA...".into()),
        });

        let clean = sanitize_config(&config);
        assert_eq!(clean.repo.token, None);
        assert_eq!(clean.repo.repo_name.as_deref(), Some("dotfiles"));
        let secret = &clean.dotfiles.values().next().unwrap().secrets.secret_files[0];
        assert_eq!(secret.value, None);
        assert!(secret.encrypted);
        assert_eq!(secret.source_path, "~/.aws/credentials");
    }

    #[test]
    fn saved_document_never_contains_secret_material() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config_for("desk", &[]);
        config.repo.token = Some("tok-123-should-not-persist".into());

        let path = system_store(dir.path()).save(&config).unwrap();
        let written = std::fs::read_to_string(path).unwrap();
        assert!(!written.contains("tok-123-should-not-persist"));
        assert!(!written.contains("token"));
    }

    #[test]
    fn export_keeps_keys_written_by_other_tools() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(SCHEMA_FILE_NAME),
            r#"{
              "version": "1.0.0",
              "metadata": {"createdAt": "2026-01-01T00:00:00Z", "updatedAt": "2026-01-01T00:00:00Z"},
              "systems": [{"os": "macos", "distro": "darwin", "nickname": "mbp",
                           "machineId": "macos-darwin-mbp", "extraSys": {"chip": "m3"}}],
              "dotfiles": {"macos-darwin-mbp": {
                "trackedFiles": [{"name": ".zshrc", "sourcePath": "~/.zshrc",
                                  "repoPath": "macos-darwin-mbp/.zshrc", "category": "shell"}],
                "vscodeSettings": {"editor.tabSize": 2}
              }}
            }"#,
        )
        .unwrap();

        let store = system_store(dir.path());
        let result = store.export_at(&config_for("desk", &[]), ts("2026-02-01T00:00:00Z"));
        assert!(result.merged);

        let LoadOutcome::Loaded(doc) = store.load() else {
            panic!("document should load");
        };
        assert_eq!(doc.systems[0].extra["extraSys"]["chip"], "m3");
        let mbp = &doc.dotfiles["macos-darwin-mbp"];
        assert_eq!(mbp.extra["vscodeSettings"]["editor.tabSize"], 2);
        assert_eq!(mbp.tracked_files[0].extra["category"], "shell");
    }

    #[test]
    fn sanitize_drops_secret_looking_unmodelled_keys() {
        let mut config = config_for("desk", &[".zshrc"]);
        config.systems[0]
            .extra
            .insert("Password".into(), serde_json::json!("hunter2"));
        let machine = config.dotfiles.values_mut().next().unwrap();
        machine.tracked_files[0]
            .extra
            .insert("accessToken".into(), serde_json::json!("abc"));
        machine.tracked_files[0]
            .extra
            .insert("category".into(), serde_json::json!("shell"));

        let clean = sanitize_config(&config);
        assert!(clean.systems[0].extra.is_empty());
        let file = &clean.dotfiles.values().next().unwrap().tracked_files[0];
        assert_eq!(file.extra.len(), 1);
        assert_eq!(file.extra["category"], "shell");
    }

    #[test]
    fn sanitize_is_identity_without_secret_material() {
        let config = config_for("desk", &[".zshrc", ".gitconfig"]);
        assert_eq!(sanitize_config(&config), config);
    }

    #[test]
    fn saved_document_layout() {
        let dir = tempfile::tempdir().unwrap();
        let path = system_store(dir.path())
            .save(&config_for("desk", &[".zshrc"]))
            .unwrap();
        let written = std::fs::read_to_string(path).unwrap();
        insta::assert_snapshot!(written, @r#"
        {
          "version": "1.0.0",
          "metadata": {
            "createdAt": "2026-01-01T00:00:00Z",
            "updatedAt": "2026-01-01T00:00:00Z"
          },
          "repo": {},
          "systems": [
            {
              "os": "linux",
              "distro": "arch",
              "nickname": "desk",
              "machineId": "linux-arch-desk"
            }
          ],
          "dotfiles": {
            "linux-arch-desk": {
              "trackedFiles": [
                {
                  "name": ".zshrc",
                  "sourcePath": "~/.zshrc",
                  "repoPath": "linux-arch-desk/.zshrc",
                  "symlink": true,
                  "tracked": true
                }
              ],
              "secrets": {
                "enabled": false,
                "secretFiles": []
              },
              "symlinks": {
                "enabled": false,
                "conflictResolution": "backup"
              }
            }
          }
        }
        "#);
    }
}
