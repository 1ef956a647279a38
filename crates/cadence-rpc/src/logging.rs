//! Logging setup for plugin processes.

use tracing_subscriber::EnvFilter;

/// Environment variable holding the plugin's log filter.
///
/// Falls back to `RUST_LOG`, then to `info`.
pub const LOG_ENV: &str = "CADENCE_PLUGIN_LOG";

/// Installs a `tracing` subscriber writing to stderr.
///
/// Stdout carries the handshake line and must stay clean. The host forwards
/// the plugin's stderr into its own log. Calling this twice is harmless.
pub fn init_plugin_logging() {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .try_init();
}
