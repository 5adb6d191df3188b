use tracing_subscriber::EnvFilter;

/// Install a global fmt subscriber filtered by `RUST_LOG`, falling back to
/// `default_directive`. Returns false if a subscriber was already set.
pub fn init_tracing(default_directive: &str) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .is_ok()
}

