//! Telemetry for the Igniter core: a tracing-backed span provider,
//! prometheus request metrics, and the log-level bootstrap.

pub mod logger;
pub mod metrics;
pub mod telemetry;

pub use logger::init_logging;
pub use metrics::MetricsCollector;
pub use telemetry::TracingTelemetry;
