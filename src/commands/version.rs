//! Command: print version information.

/// Version string: the build-time `DOTSYNC_VERSION`, else the crate version.
#[must_use]
pub fn version() -> &'static str {
    option_env!("DOTSYNC_VERSION").unwrap_or(env!("CARGO_PKG_VERSION"))
}

/// Print the dotsync version to stdout.
#[allow(clippy::print_stdout)]
pub fn run() {
    println!("dotsync {}", version());
}
