//! # HTLC Telemetry
//!
//! Logging, tracing and metrics exposition for the swap node.
//!
//! ## Components
//!
//! - **Logs**: `tracing-subscriber` with an `EnvFilter`, pretty or JSON lines
//! - **Traces**: optional OTLP export (feature `otlp`)
//! - **Metrics**: Prometheus text encoding of the default registry
//!
//! ## Usage
//!
//! ```rust,ignore
//! use htlc_telemetry::{init_telemetry, TelemetryConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = TelemetryConfig::from_env();
//!     let _guard = init_telemetry(config).await.expect("Failed to init telemetry");
//! }
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `SWAP_SERVICE_NAME` | `htlc-swap-node` | Service name in logs and traces |
//! | `SWAP_LOG_LEVEL` / `RUST_LOG` | `info` | Log filter |
//! | `SWAP_JSON_LOGS` | `false` | JSON log lines |
//! | `SWAP_CONSOLE_OUTPUT` | `true` | Write logs to stdout |
//! | `SWAP_METRICS_PORT` | `9100` | HTTP port for `/metrics` |
//! | `OTEL_EXPORTER_OTLP_ENDPOINT` | unset | OTLP collector |
//! | `SWAP_NETWORK` | `devnet` | Deployment environment |

#![warn(missing_docs)]

mod config;
mod metrics;
mod tracing_setup;

pub use config::{TelemetryConfig, DEFAULT_METRICS_PORT};
pub use metrics::{
    encode_metrics, observe_request, register_metrics, MetricsHandle, BUILD_INFO, HTTP_DURATION,
    HTTP_REQUESTS,
};
pub use tracing_setup::TracingGuard;

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    /// Subscriber or exporter could not be installed
    #[error("Failed to initialize tracing: {0}")]
    TracerInit(String),

    /// Metric registration or encoding failed
    #[error("Failed to initialize Prometheus metrics: {0}")]
    MetricsInit(String),

    /// Malformed setting
    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Initialize logging, tracing and node metrics.
///
/// Returns a guard that must be held for the lifetime of the application.
/// When dropped, it flushes pending spans.
pub async fn init_telemetry(config: TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    let metrics_handle = register_metrics(&config)?;
    let tracing_guard = tracing_setup::init_tracing(&config)?;

    Ok(TelemetryGuard {
        config,
        _tracing: tracing_guard,
        _metrics: metrics_handle,
    })
}

/// Guard that keeps telemetry active. Drop to flush and shutdown.
pub struct TelemetryGuard {
    config: TelemetryConfig,
    _tracing: TracingGuard,
    _metrics: MetricsHandle,
}

impl TelemetryGuard {
    /// The configuration telemetry was started with.
    pub fn config(&self) -> &TelemetryConfig {
        &self.config
    }

    /// True when spans are exported to a collector.
    pub fn exporting_traces(&self) -> bool {
        self._tracing.exporting()
    }
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        tracing::info!("Shutting down telemetry...");
    }
}
