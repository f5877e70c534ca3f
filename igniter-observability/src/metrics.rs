use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};
use std::time::Duration;

/// Request metrics for the core pipeline.
///
/// One counter partitioned by method, status category (2xx/4xx/5xx/other),
/// and result (success/error), plus a latency histogram by method.
/// Exposed as Prometheus text exposition; the host decides where to mount
/// it.
pub struct MetricsCollector {
    registry: Registry,

    pub requests_total: IntCounterVec,
    pub request_duration: HistogramVec,
}

impl MetricsCollector {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let requests_total = IntCounterVec::new(
            Opts::new("igniter_http_requests_total", "Total processed requests"),
            &["method", "status_category", "result"],
        )?;

        let request_duration = HistogramVec::new(
            HistogramOpts::new(
                "igniter_http_request_duration_seconds",
                "Request processing latency",
            )
            .buckets(vec![
                0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
            ]),
            &["method"],
        )?;

        registry.register(Box::new(requests_total.clone()))?;
        registry.register(Box::new(request_duration.clone()))?;

        Ok(Self {
            registry,
            requests_total,
            request_duration,
        })
    }

    /// Record a completed request.
    pub fn record_request(&self, method: &str, status: u16, duration: Duration, success: bool) {
        let result = if success { "success" } else { "error" };
        self.requests_total
            .with_label_values(&[method, status_category(status), result])
            .inc();
        self.request_duration
            .with_label_values(&[method])
            .observe(duration.as_secs_f64());
    }

    /// Prometheus text exposition of all registered metrics.
    pub fn gather_text(&self) -> String {
        let encoder = TextEncoder::new();
        let metrics = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metrics, &mut buffer).unwrap_or_default();
        String::from_utf8(buffer).unwrap_or_default()
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new().expect("Failed to create metrics collector")
    }
}

/// Bucket a status code into its category label.
fn status_category(status: u16) -> &'static str {
    match status {
        200..=299 => "2xx",
        400..=499 => "4xx",
        500..=599 => "5xx",
        _ => "other",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_categories() {
        assert_eq!(status_category(200), "2xx");
        assert_eq!(status_category(204), "2xx");
        assert_eq!(status_category(404), "4xx");
        assert_eq!(status_category(500), "5xx");
        assert_eq!(status_category(302), "other");
    }

    #[test]
    fn test_record_and_gather() {
        let collector = MetricsCollector::new().unwrap();
        collector.record_request("GET", 200, Duration::from_millis(5), true);
        collector.record_request("POST", 500, Duration::from_millis(50), false);
        collector.record_request("GET", 200, Duration::from_millis(2), true);

        let text = collector.gather_text();
        assert!(text.contains("igniter_http_requests_total"));
        assert!(text.contains("igniter_http_request_duration_seconds"));
        assert!(text.contains(r#"method="GET",result="success",status_category="2xx""#));

        let success = collector
            .requests_total
            .with_label_values(&["GET", "2xx", "success"])
            .get();
        assert_eq!(success, 2);
        let error = collector
            .requests_total
            .with_label_values(&["POST", "5xx", "error"])
            .get();
        assert_eq!(error, 1);
    }
}
