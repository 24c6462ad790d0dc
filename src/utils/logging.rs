use tracing_subscriber::EnvFilter;

/// Installs the global tracing subscriber. Honors `RUST_LOG`, defaults to
/// info-level output.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
