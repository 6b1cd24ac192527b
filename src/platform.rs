//! Operating system, distribution, shell and desktop detection.

use std::fmt;
use std::path::Path;

use crate::schema::types::{DesktopMetadata, ExtraFields, SystemMetadata, machine_id};

/// Detected operating system platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Os {
    /// Linux, any distribution.
    Linux,
    /// macOS.
    Macos,
    /// Windows.
    Windows,
}

impl fmt::Display for Os {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Os::Linux => write!(f, "linux"),
            Os::Macos => write!(f, "macos"),
            Os::Windows => write!(f, "windows"),
        }
    }
}

/// Platform information for the current system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Platform {
    /// Operating system family.
    pub os: Os,
    /// Distribution id (`arch`, `ubuntu`, `darwin`, `windows`).
    pub distro: String,
    /// Login shell name (`zsh`, `bash`, ...).
    pub shell: Option<String>,
    /// Desktop environment, when one is running.
    pub desktop: Option<DesktopMetadata>,
}

impl Platform {
    /// Detect the current platform.
    pub fn detect() -> Self {
        let os = Self::detect_os();
        let shell = std::env::var("SHELL")
            .ok()
            .and_then(|s| shell_name(&s))
            .or_else(|| (os == Os::Windows).then(|| "powershell".to_string()));
        let desktop = desktop_metadata(
            std::env::var("XDG_CURRENT_DESKTOP").ok(),
            std::env::var("XDG_SESSION_TYPE").ok(),
        );
        Self {
            os,
            distro: Self::detect_distro(os),
            shell,
            desktop,
        }
    }

    /// Create a platform with explicit values (for testing).
    #[cfg(test)]
    pub fn new(os: Os, distro: &str, shell: Option<&str>) -> Self {
        Self {
            os,
            distro: distro.to_string(),
            shell: shell.map(str::to_string),
            desktop: None,
        }
    }

    /// Describe this machine as a schema `systems` entry.
    #[must_use]
    pub fn system_metadata(&self, nickname: &str) -> SystemMetadata {
        let os = self.os.to_string();
        SystemMetadata {
            machine_id: machine_id(&os, &self.distro, nickname),
            os,
            distro: self.distro.clone(),
            nickname: nickname.to_string(),
            shell: self.shell.clone(),
            shell_config_file: self
                .shell
                .as_deref()
                .and_then(shell_config_file)
                .map(str::to_string),
            desktop: self.desktop.clone(),
            extra: ExtraFields::new(),
        }
    }

    fn detect_os() -> Os {
        if cfg!(target_os = "macos") {
            Os::Macos
        } else if cfg!(target_os = "windows") {
            Os::Windows
        } else {
            // Default to Linux for other Unix-like systems
            Os::Linux
        }
    }

    fn detect_distro(os: Os) -> String {
        match os {
            Os::Macos => "darwin".to_string(),
            Os::Windows => "windows".to_string(),
            Os::Linux => std::fs::read_to_string("/etc/os-release")
                .ok()
                .and_then(|c| parse_os_release_id(&c))
                .unwrap_or_else(|| "linux".to_string()),
        }
    }
}

/// Extract the `ID=` value from `/etc/os-release` content.
#[must_use]
pub fn parse_os_release_id(content: &str) -> Option<String> {
    content
        .lines()
        .find_map(|line| line.trim().strip_prefix("ID="))
        .map(|v| v.trim().trim_matches(|c| c == '"' || c == '\'').to_string())
        .filter(|v| !v.is_empty())
}

/// Host name from `$HOSTNAME`, `%COMPUTERNAME%` or `/etc/hostname`.
#[must_use]
pub fn hostname() -> Option<String> {
    std::env::var("HOSTNAME")
        .or_else(|_| std::env::var("COMPUTERNAME"))
        .ok()
        .or_else(|| std::fs::read_to_string("/etc/hostname").ok())
        .map(|h| h.trim().to_string())
        .filter(|h| !h.is_empty())
}

/// Shell name from a `$SHELL` path.
fn shell_name(shell: &str) -> Option<String> {
    Path::new(shell)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
}

/// Home-relative startup file of a shell.
#[must_use]
pub fn shell_config_file(shell: &str) -> Option<&'static str> {
    match shell {
        "zsh" => Some(".zshrc"),
        "bash" => Some(".bashrc"),
        "fish" => Some(".config/fish/config.fish"),
        "pwsh" | "powershell" => Some("Documents/PowerShell/Microsoft.PowerShell_profile.ps1"),
        _ => None,
    }
}

fn desktop_metadata(
    environment: Option<String>,
    session_type: Option<String>,
) -> Option<DesktopMetadata> {
    let environment = environment.filter(|s| !s.is_empty());
    let session_type = session_type.filter(|s| !s.is_empty());
    if environment.is_none() && session_type.is_none() {
        return None;
    }
    Some(DesktopMetadata {
        environment,
        session_type,
    })
}
