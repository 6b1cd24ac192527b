//! Thin logger used by the command layer.
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use super::{SCAN_TARGET, STAGE_TARGET};

/// Console and file logger for one command run.
///
/// Every message goes through [`tracing`], so the console formatter and the
/// file layer installed by [`init_subscriber`](super::init_subscriber) both
/// see it. Warnings and errors are counted for the closing summary.
#[derive(Debug, Default)]
pub struct Logger {
    log_file: Option<PathBuf>,
    warnings: AtomicUsize,
    errors: AtomicUsize,
}

impl Logger {
    /// Create a logger; `log_file` is only displayed, never written here.
    #[must_use]
    pub const fn new(log_file: Option<PathBuf>) -> Self {
        Self {
            log_file,
            warnings: AtomicUsize::new(0),
            errors: AtomicUsize::new(0),
        }
    }

    /// Return the log file path, if available.
    #[must_use]
    pub fn log_path(&self) -> Option<&Path> {
        self.log_file.as_deref()
    }

    /// Log an error message.
    pub fn error(&self, msg: &str) {
        self.errors.fetch_add(1, Ordering::Relaxed);
        tracing::error!("{msg}");
    }

    /// Log a warning message.
    pub fn warn(&self, msg: &str) {
        self.warnings.fetch_add(1, Ordering::Relaxed);
        tracing::warn!("{msg}");
    }

    /// Log a stage header (major section).
    pub fn stage(&self, msg: &str) {
        tracing::info!(target: STAGE_TARGET, "{msg}");
    }

    /// Log an informational message.
    pub fn info(&self, msg: &str) {
        tracing::info!("{msg}");
    }

    /// Log a debug message (suppressed on console unless verbose; always
    /// written to the log file).
    pub fn debug(&self, msg: &str) {
        tracing::debug!("{msg}");
    }

    /// Log one secret-scan finding.
    pub fn finding(&self, msg: &str) {
        tracing::info!(target: SCAN_TARGET, "{msg}");
    }

    /// Number of warnings logged so far.
    #[must_use]
    pub fn warning_count(&self) -> usize {
        self.warnings.load(Ordering::Relaxed)
    }

    /// Number of errors logged so far.
    #[must_use]
    pub fn error_count(&self) -> usize {
        self.errors.load(Ordering::Relaxed)
    }

    /// Print the closing line: warning/error counts and the log location.
    pub fn print_summary(&self) {
        let (warnings, errors) = (self.warning_count(), self.error_count());
        if warnings > 0 || errors > 0 {
            self.info(&format!(
                "\x1b[33m{warnings} warning(s)\x1b[0m, \x1b[31m{errors} error(s)\x1b[0m"
            ));
        }
        if let Some(path) = &self.log_file {
            self.info(&format!("\x1b[2mlog: {}\x1b[0m", path.display()));
        }
    }
}
