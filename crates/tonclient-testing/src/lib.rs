//! tonclient testing utilities
//!
//! Provides an in-process [`MockEngine`] so contexts, requests and
//! subscriptions can be exercised without the native library.

pub mod engine;
pub mod filter;

pub use engine::{Handler, MOCK_ENGINE_VERSION, MockEngine, RecordedCall};

/// Install a test-friendly tracing subscriber once. Honors `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
