//! Developer diagnostics via `tracing`.
//!
//! Tracing goes to stderr and is filtered by `RUST_LOG` (default `warn`). Hook
//! decisions are product output and are written by `main`, never through
//! tracing. The opt-in per-invocation record lives in `io::hook_log`.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global subscriber.
///
/// # Example
/// ```bash
/// RUST_LOG=harness=debug harness status
/// ```
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
