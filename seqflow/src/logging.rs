//! Tracing setup for the seqflow CLI.
//!
//! Log lines are structured events on stderr; run name, step, and hostname
//! travel as fields rather than being baked into a format string. `RUST_LOG`
//! overrides the default level, which is `info` (or `debug` when the config
//! `debug` flag is set).

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber.
///
/// # Example
/// ```bash
/// RUST_LOG=seqflow=debug seqflow forbid --run-dir /data/basecalls/.seq_M1/run42
/// ```
pub fn init(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
