//! Tracing subscriber setup for the command-line binary
//!
//! Output goes to stderr so rendered text on stdout stays clean. `RUST_LOG`
//! takes precedence over the configured filter.

use tracing_subscriber::EnvFilter;

/// Install the global subscriber; returns false if one was already installed
pub fn init(default_filter: &str) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .unwrap_or_else(|e| {
            eprintln!("invalid log filter {default_filter:?}: {e}, using \"warn\"");
            EnvFilter::new("warn")
        });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .is_ok()
}
