//! Domain-specific error types for the dotsync core.
//!
//! Library modules return the typed errors below; command handlers at the CLI
//! boundary convert them to [`anyhow::Error`] via the standard `?` operator.
//!
//! Expected conditions are deliberately *not* errors here: a missing schema
//! document is [`LoadOutcome::NotFound`](crate::schema::store::LoadOutcome),
//! and unscannable input is reported inside a
//! [`ScanResult`](crate::secrets::ScanResult).
//!
//! # Error hierarchy
//!
//! ```text
//! DotsyncError
//! ├── Schema(SchemaError) schema document read / parse / write
//! ├── Log(LogError)       destructed-files log and backup copies
//! └── Config(ConfigError) settings file and secret patterns
//! ```

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type for the dotsync core.
#[derive(Error, Debug)]
pub enum DotsyncError {
    /// Schema document error.
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    /// Destructed-files log error.
    #[error("Destructed log error: {0}")]
    Log(#[from] LogError),

    /// Settings error.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Errors raised while reading or writing the schema document.
#[derive(Error, Debug)]
pub enum SchemaError {
    /// The document exists but could not be read.
    #[error("failed to read schema {}: {source}", .path.display())]
    Read {
        /// Path of the schema document.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The document was read but is not a valid schema.
    #[error("malformed schema {}: {source}", .path.display())]
    Parse {
        /// Path of the schema document.
        path: PathBuf,
        /// Underlying JSON error.
        source: serde_json::Error,
    },

    /// The sanitized document could not be serialized.
    #[error("failed to serialize schema: {0}")]
    Serialize(#[source] serde_json::Error),

    /// The document could not be written.
    #[error("failed to write schema {}: {source}", .path.display())]
    Write {
        /// Path of the schema document.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}

/// Errors raised by the destructed-files log.
#[derive(Error, Debug)]
pub enum LogError {
    /// The log file exists but could not be read.
    #[error("failed to read destructed log {}: {source}", .path.display())]
    Read {
        /// Path of the log document.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The log file is not valid JSON; it is never silently reset.
    #[error("malformed destructed log {}: {source}", .path.display())]
    Parse {
        /// Path of the log document.
        path: PathBuf,
        /// Underlying JSON error.
        source: serde_json::Error,
    },

    /// The log could not be serialized.
    #[error("failed to serialize destructed log: {0}")]
    Serialize(#[source] serde_json::Error),

    /// The log could not be persisted.
    #[error("failed to write destructed log {}: {source}", .path.display())]
    Write {
        /// Path of the log document.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The pre-overwrite copy of a file could not be taken.
    #[error("failed to back up {} to {}: {source}", .original.display(), .backup.display())]
    Backup {
        /// File that was about to be overwritten.
        original: PathBuf,
        /// Intended location of the backup copy.
        backup: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Nothing exists at the path that should be preserved.
    #[error("nothing to preserve at {}", .0.display())]
    NothingToPreserve(PathBuf),
}

/// Errors raised while loading settings.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The settings file could not be read.
    #[error("IO error reading config file {}: {source}", .path.display())]
    Io {
        /// Path of the settings file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The settings file is not valid TOML for the expected shape.
    #[error("Invalid TOML in {}: {message}", .path.display())]
    InvalidSyntax {
        /// Path of the settings file.
        path: PathBuf,
        /// Parser message.
        message: String,
    },

    /// A secret pattern does not compile.
    #[error("Invalid secret pattern '{name}': {message}")]
    InvalidPattern {
        /// Name of the pattern.
        name: String,
        /// Regex compiler message.
        message: String,
    },
}
