//! TOML settings file parsing.
use std::io;
use std::path::Path;

use super::Settings;
use crate::error::ConfigError;

/// Load the settings file at `path`.
///
/// A missing file yields [`Settings::default`].
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_settings(path: &Path) -> Result<Settings, ConfigError> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            tracing::debug!("no settings file at {}, using defaults", path.display());
            return Ok(Settings::default());
        }
        Err(source) => {
            return Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    parse_settings(&content, path)
}

/// Parse settings from TOML text; `origin` is used in error messages.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidSyntax`] for malformed TOML or unknown keys.
pub fn parse_settings(content: &str, origin: &Path) -> Result<Settings, ConfigError> {
    toml::from_str(content).map_err(|e| ConfigError::InvalidSyntax {
        path: origin.to_path_buf(),
        message: e.message().to_string(),
    })
}
