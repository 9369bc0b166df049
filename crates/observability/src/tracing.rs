//! Tracing/logging initialization.
//!
//! JSON lines on stdout, one object per event, filtered through `RUST_LOG`.

use tracing_subscriber::EnvFilter;

/// Build the filter from `RUST_LOG`, or from `default_filter` when unset or invalid.
pub fn filter(default_filter: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter))
}

/// Install the global subscriber. Later calls leave the first one in place.
pub fn init(default_filter: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter(default_filter))
        .json()
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_target(false)
        .try_init();
}
