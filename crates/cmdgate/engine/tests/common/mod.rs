use tracing_subscriber::EnvFilter;

/// Route engine logs through the test harness. Safe to call from every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("cmdgate=debug")),
        )
        .with_test_writer()
        .try_init();
}
