//! Multi-machine dotfiles backup core.
//!
//! Several machines export their configuration into one shared backup
//! repository. This crate keeps that shared state safe:
//!
//! - **[`schema`]** versioned `backup-config.json` document, merged on every
//!   export so no machine's data is silently dropped
//! - **[`tracking`]** per-machine tracked-file registry (first write wins)
//! - **[`secrets`]** content scanner deciding whether a file may be committed
//! - **[`destructed`]** recovery log of every file an operation overwrote
//!
//! [`commands`] wires these to the `dotsync` binary.
#![deny(clippy::or_fun_call)]
#![deny(clippy::bool_to_int_with_if)]

pub mod cli;
pub mod commands;
pub mod config;
pub mod destructed;
pub mod error;
pub mod fs;
pub mod logging;
pub mod operations;
pub mod platform;
pub mod schema;
pub mod secrets;
pub mod tracking;
