//! Logging setup shared by tests and downstream binaries.
//!
//! The fitter itself only emits `tracing` events; installing a subscriber
//! is left to the host application. These helpers provide the standard
//! configuration used across the crate.

use tracing::Level;

/// Initialize the tracing subscriber with the crate's standard
/// configuration (INFO default, overridable through `RUST_LOG`).
///
/// ```no_run
/// dcafit::init_logger();
/// tracing::info!("fitter ready");
/// ```
pub fn init_logger() {
    init_logger_with_level(Level::INFO)
}

/// Initialize the tracing subscriber with a custom default level.
///
/// The default can still be overridden per module through the `RUST_LOG`
/// environment variable, e.g. `RUST_LOG=dcafit=trace`.
pub fn init_logger_with_level(default_level: Level) {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(default_level.into())
                .from_env_lossy(),
        )
        .with_target(true)
        .with_level(true)
        .init();
}
