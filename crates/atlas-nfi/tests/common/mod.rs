//! Shared test utilities for bridge integration tests

#![allow(dead_code)]

use atlas_nfi::{BridgeError, Executable, Value};
use std::sync::{Arc, Once};

static TRACING: Once = Once::new();

/// Install a test-writer subscriber once per test binary
///
/// Honors `RUST_LOG`; defaults to `atlas_nfi=debug`.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("atlas_nfi=debug"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

/// Wrap a closure as a shareable managed callable
pub fn callable<F>(f: F) -> Arc<dyn Executable>
where
    F: Fn(&[Value]) -> Result<Value, BridgeError> + Send + Sync + 'static,
{
    Arc::new(f)
}
