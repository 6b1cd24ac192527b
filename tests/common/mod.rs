// Shared helpers for integration tests.
//
// Provides a temporary home / repository / state layout and a builder for
// the per-machine documents each machine would export.
#![allow(dead_code)]

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use dotsync_cli::schema::types::machine_id;
use dotsync_cli::schema::{BackupConfig, MachineConfig, SystemMetadata, TrackedFile};

/// Fixed instant used where tests need reproducible timestamps.
pub fn fixed_time(rfc3339: &str) -> DateTime<Utc> {
    rfc3339.parse().expect("valid RFC 3339 timestamp")
}

/// Isolated `home/`, `repo/` and `state/` directories under one temp dir.
pub struct Workspace {
    pub root: tempfile::TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        let root = tempfile::tempdir().expect("create temp dir");
        for dir in ["home", "repo", "state"] {
            std::fs::create_dir_all(root.path().join(dir)).expect("create workspace dir");
        }
        Self { root }
    }

    pub fn home(&self) -> PathBuf {
        self.root.path().join("home")
    }

    pub fn repo(&self) -> PathBuf {
        self.root.path().join("repo")
    }

    pub fn state(&self) -> PathBuf {
        self.root.path().join("state")
    }

    /// Write `content` to `home/<name>`, creating parents, and return the path.
    pub fn home_file(&self, name: &str, content: &str) -> PathBuf {
        let path = self.home().join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create parent");
        }
        std::fs::write(&path, content).expect("write home file");
        path
    }
}

/// Builds the document a single machine produces on export.
pub struct MachineBuilder {
    system: SystemMetadata,
    machine: MachineConfig,
    now: DateTime<Utc>,
}

impl MachineBuilder {
    pub fn new(os: &str, distro: &str, nickname: &str) -> Self {
        Self {
            system: SystemMetadata {
                os: os.to_string(),
                distro: distro.to_string(),
                nickname: nickname.to_string(),
                machine_id: machine_id(os, distro, nickname),
                ..SystemMetadata::default()
            },
            machine: MachineConfig::default(),
            now: Utc::now(),
        }
    }

    pub fn id(&self) -> String {
        self.system.machine_id.clone()
    }

    pub fn at(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }

    pub fn shell(mut self, shell: &str) -> Self {
        self.system.shell = Some(shell.to_string());
        self
    }

    /// Track `~/<name>`.
    pub fn track(mut self, name: &str) -> Self {
        let id = self.id();
        self.machine
            .tracked_files
            .push(TrackedFile::new(name, &format!("~/{name}"), &id));
        self
    }

    pub fn packages(mut self, manager: &str, names: &[&str]) -> Self {
        let list = names
            .iter()
            .map(|name| dotsync_cli::schema::types::Package {
                name: (*name).to_string(),
                version: None,
            })
            .collect();
        self.machine
            .packages
            .get_or_insert_with(Default::default)
            .insert(manager.to_string(), list);
        self
    }

    pub fn build(self) -> BackupConfig {
        let mut config = BackupConfig::new(self.now);
        config.upsert_machine(self.system, self.machine);
        config
    }
}

/// Read and parse the schema document written into `repo`.
pub fn read_schema(repo: &Path) -> BackupConfig {
    let content = std::fs::read_to_string(repo.join(dotsync_cli::schema::SCHEMA_FILE_NAME))
        .expect("read schema document");
    serde_json::from_str(&content).expect("parse schema document")
}
