//! Logging initialization. Library code only emits `tracing` events; the
//! embedding process calls [`init`] once at startup.

use tracing_subscriber::EnvFilter;

/// Initialize console logging. `RUST_LOG` overrides `default_level`.
pub fn init(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
    tracing::info!(level = default_level, "logging initialized");
}

/// Initialize logging for tests (captured per test, safe to call repeatedly).
pub fn init_test() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
