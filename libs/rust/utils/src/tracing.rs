use std::sync::Once;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const DEFAULT_FILTER: &str = "info";
const DEFAULT_TEST_FILTER: &str = "balance_shares=debug";

static TEST_TRACING: Once = Once::new();

/// Installs the global subscriber: JSON lines on stdout, filtered by `RUST_LOG`.
///
/// Panics if a global subscriber is already installed.
pub fn setup_tracing() {
    let filter_layer = env_filter(DEFAULT_FILTER);

    let fmt_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_line_number(true)
        .with_writer(std::io::stdout);

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .init();
}

/// Compact, test-captured output. Safe to call from every test.
pub fn setup_test_tracing() {
    TEST_TRACING.call_once(|| {
        let fmt_layer = fmt::layer()
            .compact()
            .with_ansi(false)
            .with_target(false)
            .without_time()
            .with_test_writer();

        // another harness may have installed a subscriber first
        let _ = tracing_subscriber::registry()
            .with(env_filter(DEFAULT_TEST_FILTER))
            .with(fmt_layer)
            .try_init();
    });
}

fn env_filter(default: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}
