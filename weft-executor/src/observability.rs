//! Tracing subscriber setup.

use tracing_subscriber::{fmt, EnvFilter};

/// Initialize tracing from the `WEFT_LOG` environment variable.
///
/// Falls back to `info` when the variable is unset or unparsable. Safe to
/// call more than once; only the first call installs a subscriber.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_env("WEFT_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
