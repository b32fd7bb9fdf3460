//! Development-time tracing for debugging client invocations.
//!
//! Debug artifact directories (`io/debug_dump`) are the persisted record of an
//! invocation. This module only controls what is printed to stderr.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber.
///
/// Reads `RUST_LOG`, defaulting to `warn`. Output goes to stderr in compact
/// format.
///
/// # Example
/// ```bash
/// RUST_LOG=ethereum_clis=debug consume t8n --client geth --request req.json
/// ```
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
