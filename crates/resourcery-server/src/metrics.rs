//! Prometheus metrics for resourcery-server.
//!
//! Tracks fetch relay outcomes, followed redirects, relayed bytes and static
//! file responses.
use lazy_static::lazy_static;
use prometheus::{register_counter, register_counter_vec, Counter, CounterVec, Encoder, TextEncoder};

lazy_static! {
    /// Fetch relay requests by outcome
    pub static ref FETCH_REQUESTS_TOTAL: CounterVec = register_counter_vec!(
        "resourcery_fetch_requests_total",
        "Total number of fetch relay requests",
        &["outcome"]  // outcome: ok|client_error|policy_rejection|too_large|upstream_failure
    )
    .unwrap();

    /// Redirect hops followed by the relay
    pub static ref FETCH_REDIRECTS_TOTAL: Counter = register_counter!(
        "resourcery_fetch_redirects_total",
        "Total number of upstream redirects followed"
    )
    .unwrap();

    /// Body bytes relayed to callers
    pub static ref FETCH_BYTES_TOTAL: Counter = register_counter!(
        "resourcery_fetch_bytes_total",
        "Total number of upstream body bytes relayed"
    )
    .unwrap();

    /// Static file responses by status
    pub static ref STATIC_REQUESTS_TOTAL: CounterVec = register_counter_vec!(
        "resourcery_static_requests_total",
        "Total number of static file requests",
        &["status"]
    )
    .unwrap();
}

/// Collect and return all metrics in Prometheus text format
pub fn collect_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::warn!("Failed to encode metrics: {}", e);
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

/// Helper to record a finished fetch
pub fn record_fetch(outcome: &str) {
    FETCH_REQUESTS_TOTAL.with_label_values(&[outcome]).inc();
}

/// Helper to record a followed redirect
pub fn record_redirect() {
    FETCH_REDIRECTS_TOTAL.inc();
}

/// Helper to record relayed body bytes
pub fn record_bytes_streamed(bytes: usize) {
    FETCH_BYTES_TOTAL.inc_by(bytes as f64);
}

/// Helper to record a static file response
pub fn record_static(status: u16) {
    STATIC_REQUESTS_TOTAL
        .with_label_values(&[&status.to_string()])
        .inc();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collect_includes_recorded_metrics() {
        record_fetch("ok");
        record_redirect();
        record_bytes_streamed(42);
        record_static(200);

        let text = collect_metrics();
        assert!(text.contains("resourcery_fetch_requests_total"));
        assert!(text.contains("resourcery_fetch_redirects_total"));
        assert!(text.contains("resourcery_fetch_bytes_total"));
        assert!(text.contains("resourcery_static_requests_total"));
    }

    #[test]
    fn test_fetch_counter_increments() {
        let before = FETCH_REQUESTS_TOTAL
            .with_label_values(&["policy_rejection"])
            .get();
        record_fetch("policy_rejection");
        let after = FETCH_REQUESTS_TOTAL
            .with_label_values(&["policy_rejection"])
            .get();
        assert!(after >= before + 1.0);
    }
}
