//! Structured logging via the `tracing` crate.
//!
//! All diagnostics (including "value appears unencrypted" warnings from the
//! decryption filter) go to stderr so settings output on stdout stays clean
//! enough to pipe into a shell.

use tracing_subscriber::EnvFilter;

/// Initialize the subscriber. `level` overrides the default (`warn`, or
/// `debug` with `verbose`); `CHAMBER_LOG` overrides both.
pub fn init(verbose: bool, level: Option<&str>) {
    let default_level = if verbose { "debug" } else { "warn" };
    let directive = level.unwrap_or(default_level);
    let filter =
        EnvFilter::try_from_env("CHAMBER_LOG").unwrap_or_else(|_| EnvFilter::new(directive));

    // try_init: tests and embedders may already have a subscriber installed.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .try_init();
}
