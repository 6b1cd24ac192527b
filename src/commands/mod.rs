//! Top-level subcommand orchestration.
pub mod destructed;
pub mod detect;
pub mod export;
pub mod scan;
pub mod version;

use anyhow::{Context as _, Result};
use std::path::PathBuf;
use std::sync::Arc;

use crate::cli::GlobalOpts;
use crate::config::{Settings, paths, toml_loader};
use crate::destructed::{BACKUPS_DIR_NAME, DestructedFilesLog, LOG_FILE_NAME};
use crate::logging::Logger;
use crate::operations::SystemFileSystemOps;
use crate::platform::{self, Platform};
use crate::schema::SystemMetadata;

/// Fallback nickname when neither settings nor the host name provide one.
const DEFAULT_NICKNAME: &str = "default";

/// Shared state produced by the common command setup sequence.
///
/// Loads the settings file and resolves the home and state directories so
/// that each command does not have to repeat the boilerplate.
#[derive(Debug)]
pub struct CommandSetup {
    /// Parsed settings file, or defaults when it is absent.
    pub settings: Settings,
    /// Current user's home directory.
    pub home: PathBuf,
    /// Directory holding the destructed log and backups.
    pub state_dir: PathBuf,
}

impl CommandSetup {
    /// Load settings and resolve directories.
    ///
    /// # Errors
    ///
    /// Returns an error if the settings file exists but is unreadable or
    /// malformed.
    pub fn init(global: &GlobalOpts, log: &Logger) -> Result<Self> {
        let settings_path = global.config.clone().unwrap_or_else(paths::settings_file);
        let settings = toml_loader::load_settings(&settings_path)
            .with_context(|| format!("loading settings from {}", settings_path.display()))?;
        log.debug(&format!("settings: {}", settings_path.display()));

        let home = paths::home_dir();
        let state_dir = global
            .state_dir
            .clone()
            .unwrap_or_else(|| settings.state_dir(&home));
        log.debug(&format!("state dir: {}", state_dir.display()));

        Ok(Self {
            settings,
            home,
            state_dir,
        })
    }

    /// Nickname: `explicit`, else settings, else the host name.
    #[must_use]
    pub fn nickname(&self, explicit: Option<&str>) -> String {
        explicit
            .map(str::to_string)
            .or_else(|| self.settings.nickname.clone())
            .or_else(platform::hostname)
            .unwrap_or_else(|| DEFAULT_NICKNAME.to_string())
    }

    /// Metadata of the machine this command runs on.
    #[must_use]
    pub fn this_machine(&self, nickname: Option<&str>) -> SystemMetadata {
        Platform::detect().system_metadata(&self.nickname(nickname))
    }

    /// Directory receiving pre-overwrite copies.
    #[must_use]
    pub fn backups_dir(&self) -> PathBuf {
        self.state_dir.join(BACKUPS_DIR_NAME)
    }

    /// Open the destructed-files log in the state directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the log exists but cannot be read or parsed.
    pub fn open_log(&self) -> Result<DestructedFilesLog> {
        let path = self.state_dir.join(LOG_FILE_NAME);
        DestructedFilesLog::open(&path, Arc::new(SystemFileSystemOps))
            .with_context(|| format!("opening destructed log {}", path.display()))
    }
}
