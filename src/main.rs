//! `dotsync` binary: argument parsing, logging setup and command dispatch.

use anyhow::Result;
use clap::Parser;

use dotsync_cli::cli::{Cli, Command};
use dotsync_cli::commands;
use dotsync_cli::logging::{Logger, init_subscriber};

fn main() -> Result<()> {
    let _ = enable_ansi_support::enable_ansi_support();
    let args = Cli::parse();

    if matches!(args.command, Command::Version) {
        commands::version::run();
        return Ok(());
    }

    let name = match &args.command {
        Command::Detect(_) => "detect",
        Command::Scan(_) => "scan",
        Command::Export(_) => "export",
        Command::Destructed(_) => "destructed",
        Command::Version => "version",
    };
    let log = Logger::new(init_subscriber(args.verbose, name));

    match &args.command {
        Command::Detect(opts) => commands::detect::run(&args.global, opts, &log),
        Command::Scan(opts) => commands::scan::run(&args.global, opts, &log),
        Command::Export(opts) => commands::export::run(&args.global, opts, &log),
        Command::Destructed(cmd) => commands::destructed::run(&args.global, cmd, &log),
        Command::Version => Ok(()),
    }
}
