//! Prometheus exposition for the swap node.
//!
//! Swap metrics are registered by `htlc-orchestrator` (feature `metrics`) in
//! the process-wide default registry. This module adds the node-level
//! metrics and encodes everything registered there for `/metrics`.
//!
//! All metrics follow the naming convention: `htlc_<area>_<metric>_<unit>`

use lazy_static::lazy_static;
use prometheus::{
    exponential_buckets, register_histogram_vec, register_int_counter_vec, register_int_gauge_vec,
    Encoder, HistogramVec, IntCounterVec, IntGaugeVec, TextEncoder,
};

use crate::{TelemetryConfig, TelemetryError};

lazy_static! {
    /// Constant 1, labelled with version, service and network
    pub static ref BUILD_INFO: IntGaugeVec = register_int_gauge_vec!(
        "htlc_node_build_info",
        "Build and deployment information",
        &["version", "service", "network"]
    ).expect("metric creation failed");

    /// HTTP requests served by the node
    pub static ref HTTP_REQUESTS: IntCounterVec = register_int_counter_vec!(
        "htlc_http_requests_total",
        "HTTP requests served",
        &["path", "status"]
    ).expect("metric creation failed");

    /// HTTP handler latency
    pub static ref HTTP_DURATION: HistogramVec = register_histogram_vec!(
        "htlc_http_request_duration_seconds",
        "Time spent serving HTTP requests",
        &["path"],
        exponential_buckets(0.0001, 2.0, 14).expect("valid buckets")
    ).expect("metric creation failed");
}

/// Handle returned once node metrics are registered.
#[derive(Debug, Clone, Copy)]
pub struct MetricsHandle {
    _private: (),
}

/// Register node metrics and publish build info.
pub fn register_metrics(config: &TelemetryConfig) -> Result<MetricsHandle, TelemetryError> {
    BUILD_INFO
        .get_metric_with_label_values(&[
            env!("CARGO_PKG_VERSION"),
            &config.service_name,
            &config.network,
        ])
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?
        .set(1);
    Ok(MetricsHandle { _private: () })
}

/// Record one served HTTP request.
pub fn observe_request(path: &str, status: u16, elapsed_secs: f64) {
    HTTP_REQUESTS
        .with_label_values(&[path, &status.to_string()])
        .inc();
    HTTP_DURATION.with_label_values(&[path]).observe(elapsed_secs);
}

/// Encode every metric in the default registry as Prometheus text format.
pub fn encode_metrics() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}
