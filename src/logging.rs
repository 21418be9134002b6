//! Tracing subscriber setup.

use tracing_subscriber::{EnvFilter, fmt};

/// Initialize logging.
///
/// `log_format` selects JSON (the in-cluster default) or a compact
/// human-readable layout; `RUST_LOG` takes precedence over the
/// configured level when set.
pub fn init(log_format: &str, log_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    if log_format.eq_ignore_ascii_case("json") {
        fmt()
            .with_env_filter(filter)
            .json()
            .with_target(true)
            .init();
    } else {
        fmt()
            .with_env_filter(filter)
            .compact()
            .with_target(true)
            .init();
    }
}
