//! Shared utilities for integration tests.

use std::sync::Once;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Upper bound on how long a test waits for a context to be canceled.
pub const WAIT: Duration = Duration::from_secs(5);

/// Installs a test-friendly tracing subscriber once per test binary.
///
/// Set `RUST_LOG=sigctx=debug` to see subscription and cancellation events.
pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}
