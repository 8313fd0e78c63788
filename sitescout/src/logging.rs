use tracing_subscriber::EnvFilter;

/// Installs a stderr subscriber filtered at `level`.
///
/// `RUST_LOG`, when set, takes precedence over the configured level. Calling
/// this more than once keeps the first subscriber.
pub fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
