//! Command: describe this machine.
use anyhow::{Context as _, Result};

use super::CommandSetup;
use crate::cli::{DetectOpts, GlobalOpts};
use crate::logging::Logger;

/// Print this machine's [`SystemMetadata`](crate::schema::SystemMetadata)
/// as JSON on stdout.
///
/// # Errors
///
/// Returns an error if settings cannot be loaded.
#[allow(clippy::print_stdout)]
pub fn run(global: &GlobalOpts, opts: &DetectOpts, log: &Logger) -> Result<()> {
    let setup = CommandSetup::init(global, log)?;
    let system = setup.this_machine(opts.nickname.as_deref());
    log.debug(&format!("machine id: {}", system.machine_id));

    let json = serde_json::to_string_pretty(&system).context("serializing system metadata")?;
    println!("{json}");
    Ok(())
}
