//! Process-wide tracing setup shared by the vault binaries.

/// Initialize tracing with the default `info` filter.
///
/// Safe to call multiple times; subsequent calls are no-ops.
pub fn init() {
    tracing::init("info");
}

/// Initialize tracing, using `default_filter` when `RUST_LOG` is unset.
pub fn init_with_default(default_filter: &str) {
    tracing::init(default_filter);
}

/// Subscriber construction (filters, formatting).
pub mod tracing;
