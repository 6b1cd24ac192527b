//! XDG base directories for settings, state and logs.
use std::path::{Path, PathBuf};

/// Application directory name under each XDG base.
pub const APP_DIR: &str = "dotsync";

/// The user's home directory (`$HOME`, then `%USERPROFILE%`, else `.`).
#[must_use]
pub fn home_dir() -> PathBuf {
    std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .map_or_else(|_| PathBuf::from("."), PathBuf::from)
}

/// `$XDG_CONFIG_HOME/dotsync/config.toml`.
#[must_use]
pub fn settings_file() -> PathBuf {
    xdg_dir("XDG_CONFIG_HOME", ".config").join("config.toml")
}

/// `$XDG_STATE_HOME/dotsync`.
#[must_use]
pub fn state_dir() -> PathBuf {
    xdg_dir("XDG_STATE_HOME", ".local/state")
}

/// `$XDG_CACHE_HOME/dotsync`.
#[must_use]
pub fn cache_dir() -> PathBuf {
    xdg_dir("XDG_CACHE_HOME", ".cache")
}

fn xdg_dir(var: &str, fallback: &str) -> PathBuf {
    resolve(std::env::var(var).ok().as_deref(), &home_dir(), fallback)
}

/// `<base>/dotsync` where `base` is the XDG variable when set to an absolute
/// path, else `<home>/<fallback>`.
fn resolve(xdg: Option<&str>, home: &Path, fallback: &str) -> PathBuf {
    let base = xdg
        .filter(|v| Path::new(v).is_absolute())
        .map_or_else(|| home.join(fallback), PathBuf::from);
    base.join(APP_DIR)
}
