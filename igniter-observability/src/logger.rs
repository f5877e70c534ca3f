use igniter_core::LogLevel;
use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber at the configured level.
///
/// Safe to call more than once; later calls are ignored. `RUST_LOG` wins
/// over the configured level when set, so operators keep the usual
/// escape hatch.
pub fn init_logging(level: LogLevel) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_tracing_directive()));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
