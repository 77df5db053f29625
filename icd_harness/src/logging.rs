//! Logging setup for tests and harness binaries.

use std::sync::Once;

use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "test_icd=debug,icd_harness=debug";

/// Install a stderr fmt subscriber filtered by `RUST_LOG`. Safe to call from
/// every test; only the first call installs anything, and an already
/// installed global subscriber is left alone.
pub fn init_logging() {
    static INIT_LOG: Once = Once::new();
    INIT_LOG.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}
