//! Contracts for the capabilities injected into every request context.
//!
//! The core only consumes these traits; adapters (stores, telemetry
//! exporters, job queues, plugin runtimes) live in their own crates.

use crate::error::FrameworkError;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Key-value + pub/sub store contract.
///
/// Publish is best-effort: the core logs failures and proceeds, it never
/// fails the primary request over a store error.
#[async_trait]
pub trait Store: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>, FrameworkError>;

    async fn set(
        &self,
        key: &str,
        value: Value,
        ttl: Option<Duration>,
    ) -> Result<(), FrameworkError>;

    async fn delete(&self, key: &str) -> Result<(), FrameworkError>;

    /// Broadcast a serialized message. Cross-process reception is the
    /// adapter's responsibility.
    async fn publish(&self, channel: &str, message: &str) -> Result<(), FrameworkError>;

    /// Subscribe to a channel; messages arrive on the returned receiver.
    async fn subscribe(
        &self,
        channel: &str,
    ) -> Result<tokio::sync::mpsc::Receiver<String>, FrameworkError>;
}

/// The job-queue contract the core consumes. Execution is external.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Enqueue a job, returning its id.
    async fn enqueue(&self, job: &str, payload: Value) -> Result<String, FrameworkError>;
}

/// Tags attached to the HTTP span opened at request entry.
#[derive(Debug, Clone, Default)]
pub struct HttpSpanTags {
    pub method: String,
    pub url: String,
    pub path: String,
    pub user_agent: Option<String>,
}

/// Handle to an open telemetry span.
#[derive(Debug, Clone)]
pub struct SpanHandle {
    pub id: String,
    pub name: String,
    pub started_at: Instant,
}

impl SpanHandle {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            started_at: Instant::now(),
        }
    }
}

/// Telemetry contract. Implementations must never panic into the request
/// path; a no-op provider is valid.
pub trait TelemetryProvider: Send + Sync {
    fn start_http_span(&self, tags: &HttpSpanTags) -> SpanHandle;

    fn finish_http_span(&self, span: &SpanHandle, status: u16, error: Option<&str>);

    /// Record one completed request: duration timing plus the request
    /// counter partitioned by method, status category, and result.
    fn record_request(&self, method: &str, status: u16, duration: Duration, success: bool);
}

/// Telemetry provider that records nothing.
pub struct NoopTelemetry;

impl TelemetryProvider for NoopTelemetry {
    fn start_http_span(&self, tags: &HttpSpanTags) -> SpanHandle {
        SpanHandle::new(format!("http.{}", tags.method.to_ascii_lowercase()))
    }

    fn finish_http_span(&self, _span: &SpanHandle, _status: u16, _error: Option<&str>) {}

    fn record_request(&self, _method: &str, _status: u16, _duration: Duration, _success: bool) {}
}

/// Result of invoking a plugin action through its proxy.
#[derive(Debug, Clone, Serialize)]
pub struct PluginActionResult {
    pub success: bool,
    pub data: Option<Value>,
    pub error: Option<String>,
    pub execution_time_ms: u64,
    pub plugin_name: String,
    pub action_name: String,
}

/// Per-plugin proxy injected into the context's `plugins` map.
#[async_trait]
pub trait PluginHandle: Send + Sync {
    fn name(&self) -> &str;

    /// Invoke a typed plugin action with an untyped payload.
    async fn call(&self, action: &str, input: Value) -> PluginActionResult;

    /// Emit a plugin event: local listeners first, then the store's
    /// pub/sub for distributed delivery.
    async fn emit(&self, event: &str, payload: Value) -> Result<(), FrameworkError>;
}

/// Request-scoped logger carrying the request id on every line.
#[derive(Debug, Clone)]
pub struct ScopedLogger {
    request_id: String,
}

impl ScopedLogger {
    pub fn new(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
        }
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn debug(&self, message: &str) {
        tracing::debug!(request_id = %self.request_id, "{message}");
    }

    pub fn info(&self, message: &str) {
        tracing::info!(request_id = %self.request_id, "{message}");
    }

    pub fn warn(&self, message: &str) {
        tracing::warn!(request_id = %self.request_id, "{message}");
    }

    pub fn error(&self, message: &str) {
        tracing::error!(request_id = %self.request_id, "{message}");
    }
}

/// Trace identifiers exposed to handlers.
#[derive(Debug, Clone, Serialize)]
pub struct TraceContext {
    pub request_id: String,
    pub span_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noop_telemetry_span() {
        let telemetry = NoopTelemetry;
        let span = telemetry.start_http_span(&HttpSpanTags {
            method: "GET".into(),
            ..HttpSpanTags::default()
        });
        assert_eq!(span.name, "http.get");
        telemetry.finish_http_span(&span, 200, None);
        telemetry.record_request("GET", 200, Duration::from_millis(1), true);
    }

    #[test]
    fn test_span_handles_are_unique() {
        let a = SpanHandle::new("http.get");
        let b = SpanHandle::new("http.get");
        assert_ne!(a.id, b.id);
    }
}
