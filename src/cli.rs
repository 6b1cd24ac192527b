//! Command-line surface parsed with clap derive.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::destructed::DestructionReason;

/// Top-level CLI entry point for dotsync.
#[derive(Parser, Debug)]
#[command(
    name = "dotsync",
    about = "Multi-machine dotfiles backup: schema export, secret screening and overwrite recovery",
    version
)]
pub struct Cli {
    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Options shared by every subcommand.
    #[command(flatten)]
    pub global: GlobalOpts,
}

/// Options shared across all subcommands.
#[derive(Parser, Debug, Clone, Default)]
pub struct GlobalOpts {
    /// Settings file (default: $XDG_CONFIG_HOME/dotsync/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Directory holding the destructed-files log and backups
    #[arg(long, global = true)]
    pub state_dir: Option<PathBuf>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print this machine's system metadata as JSON
    Detect(DetectOpts),
    /// Scan files for secrets
    Scan(ScanOpts),
    /// Screen and merge a machine config into a backup repository
    Export(ExportOpts),
    /// Inspect, restore and purge overwritten files
    #[command(subcommand)]
    Destructed(DestructedCommand),
    /// Print version information
    Version,
}

/// Options for the `detect` subcommand.
#[derive(Parser, Debug, Clone)]
pub struct DetectOpts {
    /// Machine nickname (default: from settings, else the host name)
    #[arg(short, long)]
    pub nickname: Option<String>,
}

/// Options for the `scan` subcommand.
#[derive(Parser, Debug, Clone)]
pub struct ScanOpts {
    /// Files or directories to scan
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,
}

/// Options for the `export` subcommand.
#[derive(Parser, Debug, Clone)]
pub struct ExportOpts {
    /// Freshly generated backup config (JSON)
    #[arg(short, long)]
    pub input: PathBuf,

    /// Backup repository (default: `repo` from settings)
    #[arg(short, long)]
    pub repo: Option<PathBuf>,
}

/// `destructed` subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum DestructedCommand {
    /// List logged entries
    List(ListOpts),
    /// Show the most recent entry for a path
    Find {
        /// Path that was overwritten
        path: PathBuf,
    },
    /// Copy the most recent backup of a path back into place
    Restore {
        /// Path that was overwritten
        path: PathBuf,
    },
    /// Delete old backups and their entries
    Cleanup {
        /// Age in days (default: `destructed.max_age_days` from settings)
        #[arg(long)]
        max_age_days: Option<u32>,
    },
}

/// Filters for `destructed list`.
#[derive(Parser, Debug, Clone, Default)]
pub struct ListOpts {
    /// Only entries from this machine id
    #[arg(long)]
    pub machine: Option<String>,

    /// Only entries with this reason (symlink-replace, overwrite, manual)
    #[arg(long)]
    pub reason: Option<DestructionReason>,

    /// Only entries that can be restored
    #[arg(long)]
    pub restoreable: bool,
}

#[cfg(test)]
#[allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::indexing_slicing,
    clippy::unreachable
)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_detect_with_nickname() {
        let cli = Cli::parse_from(["dotsync", "detect", "--nickname", "mbp"]);
        assert!(matches!(cli.command, Command::Detect(ref o) if o.nickname.as_deref() == Some("mbp")));
    }

    #[test]
    fn parse_scan_requires_paths() {
        assert!(Cli::try_parse_from(["dotsync", "scan"]).is_err());
        let cli = Cli::parse_from(["dotsync", "scan", "a", "b"]);
        assert!(matches!(cli.command, Command::Scan(ref o) if o.paths.len() == 2));
    }

    #[test]
    fn parse_export() {
        let cli = Cli::parse_from(["dotsync", "export", "--input", "fresh.json", "-r", "/repo"]);
        let Command::Export(opts) = cli.command else {
            unreachable!("expected export");
        };
        assert_eq!(opts.input, PathBuf::from("fresh.json"));
        assert_eq!(opts.repo, Some(PathBuf::from("/repo")));
    }

    #[test]
    fn parse_destructed_list_filters() {
        let cli = Cli::parse_from([
            "dotsync",
            "destructed",
            "list",
            "--reason",
            "symlink-replace",
            "--restoreable",
        ]);
        let Command::Destructed(DestructedCommand::List(opts)) = cli.command else {
            unreachable!("expected destructed list");
        };
        assert_eq!(opts.reason, Some(DestructionReason::SymlinkReplace));
        assert!(opts.restoreable);
        assert_eq!(opts.machine, None);
    }

    #[test]
    fn parse_destructed_rejects_unknown_reason() {
        assert!(
            Cli::try_parse_from(["dotsync", "destructed", "list", "--reason", "bogus"]).is_err()
        );
    }

    #[test]
    fn parse_destructed_cleanup() {
        let cli = Cli::parse_from(["dotsync", "destructed", "cleanup", "--max-age-days", "0"]);
        assert!(matches!(
            cli.command,
            Command::Destructed(DestructedCommand::Cleanup {
                max_age_days: Some(0)
            })
        ));
    }

    #[test]
    fn parse_global_options_after_subcommand() {
        let cli = Cli::parse_from([
            "dotsync",
            "destructed",
            "find",
            "/home/u/.zshrc",
            "--state-dir",
            "/tmp/state",
            "-v",
        ]);
        assert!(cli.verbose);
        assert_eq!(cli.global.state_dir, Some(PathBuf::from("/tmp/state")));
    }

    #[test]
    fn parse_version() {
        let cli = Cli::parse_from(["dotsync", "version"]);
        assert!(matches!(cli.command, Command::Version));
    }
}
