//! User settings loaded from `$XDG_CONFIG_HOME/dotsync/config.toml`.
pub mod paths;
pub mod toml_loader;

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::fs::expand_home;
use crate::secrets::{DEFAULT_MAX_FILE_BYTES, SecretPattern, SecretScanner, default_patterns};

/// Default age after which destructed entries are purged.
pub const DEFAULT_MAX_AGE_DAYS: u32 = 90;

/// Contents of the settings file. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Default backup repository (`~` is expanded).
    pub repo: Option<String>,
    /// Machine nickname used in the machine id.
    pub nickname: Option<String>,
    /// Override for the directory holding the destructed log and backups.
    pub state_dir: Option<String>,
    /// Secret scanner tuning.
    pub scan: ScanSettings,
    /// Destructed-files retention.
    pub destructed: DestructedSettings,
}

/// `[scan]` table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScanSettings {
    /// Files larger than this are reported unscanned.
    pub max_file_bytes: u64,
    /// Use only `patterns`, dropping the built-in set.
    pub replace_default_patterns: bool,
    /// Extra patterns.
    pub patterns: Vec<SecretPattern>,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            max_file_bytes: DEFAULT_MAX_FILE_BYTES,
            replace_default_patterns: false,
            patterns: Vec::new(),
        }
    }
}

/// `[destructed]` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DestructedSettings {
    /// Age in days after which `destructed cleanup` purges an entry.
    pub max_age_days: u32,
}

impl Default for DestructedSettings {
    fn default() -> Self {
        Self {
            max_age_days: DEFAULT_MAX_AGE_DAYS,
        }
    }
}

impl Settings {
    /// Build the scanner described by the `[scan]` table.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidPattern`] if a user pattern does not
    /// compile.
    pub fn scanner(&self) -> Result<SecretScanner, ConfigError> {
        let scanner = if self.scan.replace_default_patterns {
            SecretScanner::new(&self.scan.patterns)?
        } else {
            let mut all = default_patterns();
            all.extend(self.scan.patterns.iter().cloned());
            SecretScanner::new(&all)?
        };
        Ok(scanner.max_file_bytes(self.scan.max_file_bytes))
    }

    /// Repository path from the settings, with `~` expanded.
    #[must_use]
    pub fn repo_path(&self, home: &Path) -> Option<PathBuf> {
        self.repo.as_deref().map(|r| expand_home(r, home))
    }

    /// State directory: the override if set, else the XDG default.
    #[must_use]
    pub fn state_dir(&self, home: &Path) -> PathBuf {
        self.state_dir
            .as_deref()
            .map_or_else(paths::state_dir, |d| expand_home(d, home))
    }
}
