mod comparer_tests;
mod table_tests;
mod workflow_tests;

// Initialize tracing for tests
#[allow(dead_code)]
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};
    let _ = fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::DEBUG.into()))
        .with_target(true)
        .with_test_writer()
        .try_init();
}
