use crate::metrics::MetricsCollector;
use igniter_core::{HttpSpanTags, SpanHandle, TelemetryProvider};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Telemetry provider backed by `tracing` events plus the prometheus
/// collector. Every method is infallible; telemetry can never fail a
/// request.
pub struct TracingTelemetry {
    metrics: Option<Arc<MetricsCollector>>,
}

impl TracingTelemetry {
    pub fn new() -> Self {
        Self { metrics: None }
    }

    pub fn with_metrics(metrics: Arc<MetricsCollector>) -> Self {
        Self {
            metrics: Some(metrics),
        }
    }
}

impl Default for TracingTelemetry {
    fn default() -> Self {
        Self::new()
    }
}

impl TelemetryProvider for TracingTelemetry {
    fn start_http_span(&self, tags: &HttpSpanTags) -> SpanHandle {
        let span = SpanHandle::new(format!("http.{}", tags.method.to_ascii_lowercase()));
        debug!(
            span_id = %span.id,
            http.method = %tags.method,
            http.url = %tags.url,
            http.path = %tags.path,
            http.user_agent = tags.user_agent.as_deref().unwrap_or(""),
            "HTTP span opened"
        );
        span
    }

    fn finish_http_span(&self, span: &SpanHandle, status: u16, error: Option<&str>) {
        let duration_ms = span.started_at.elapsed().as_secs_f64() * 1000.0;
        match error {
            Some(error) => debug!(
                span_id = %span.id,
                http.status_code = status,
                duration_ms,
                error = %error,
                "HTTP span finished with error"
            ),
            None => debug!(
                span_id = %span.id,
                http.status_code = status,
                duration_ms,
                "HTTP span finished"
            ),
        }
    }

    fn record_request(&self, method: &str, status: u16, duration: Duration, success: bool) {
        if let Some(ref metrics) = self.metrics {
            metrics.record_request(method, status, duration, success);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_span_lifecycle() {
        let telemetry = TracingTelemetry::new();
        let span = telemetry.start_http_span(&HttpSpanTags {
            method: "POST".into(),
            url: "/api/v1/users".into(),
            path: "/api/v1/users".into(),
            user_agent: Some("test".into()),
        });
        assert_eq!(span.name, "http.post");
        telemetry.finish_http_span(&span, 201, None);
        telemetry.finish_http_span(&span, 500, Some("boom"));
    }

    #[test]
    fn test_record_request_without_metrics_is_a_noop() {
        let telemetry = TracingTelemetry::new();
        telemetry.record_request("GET", 200, Duration::from_millis(1), true);
    }

    #[test]
    fn test_record_request_feeds_collector() {
        let metrics = Arc::new(MetricsCollector::new().unwrap());
        let telemetry = TracingTelemetry::with_metrics(Arc::clone(&metrics));
        telemetry.record_request("GET", 200, Duration::from_millis(1), true);
        assert_eq!(
            metrics
                .requests_total
                .with_label_values(&["GET", "2xx", "success"])
                .get(),
            1
        );
    }
}
