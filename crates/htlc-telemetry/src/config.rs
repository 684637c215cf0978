//! Telemetry configuration from environment variables.

use std::env;

/// Default Prometheus scrape port.
pub const DEFAULT_METRICS_PORT: u16 = 9100;

/// Configuration for logging, tracing and metrics exposition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    /// Service name for traces and logs
    pub service_name: String,

    /// Log level filter (trace, debug, info, warn, error) or a full
    /// `EnvFilter` directive
    pub log_level: String,

    /// Whether to write log lines to stdout
    pub console_output: bool,

    /// JSON log lines instead of the pretty format
    pub json_logs: bool,

    /// Port the node serves `/metrics` and `/health` on
    pub metrics_port: u16,

    /// OTLP collector endpoint; traces are exported only when set and the
    /// `otlp` feature is enabled
    pub otlp_endpoint: Option<String>,

    /// Network identifier (devnet, testnet, mainnet)
    pub network: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "htlc-swap-node".to_string(),
            log_level: "info".to_string(),
            console_output: true,
            json_logs: false,
            metrics_port: DEFAULT_METRICS_PORT,
            otlp_endpoint: None,
            network: "devnet".to_string(),
        }
    }
}

impl TelemetryConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `SWAP_SERVICE_NAME`: Service name (default: htlc-swap-node)
    /// - `SWAP_LOG_LEVEL` or `RUST_LOG`: Log filter (default: info)
    /// - `SWAP_CONSOLE_OUTPUT`: Enable console output (default: true)
    /// - `SWAP_JSON_LOGS`: JSON logs (default: false, true in containers)
    /// - `SWAP_METRICS_PORT`: HTTP port for `/metrics` (default: 9100)
    /// - `OTEL_EXPORTER_OTLP_ENDPOINT`: OTLP endpoint (default: unset)
    /// - `SWAP_NETWORK`: Network name (default: devnet)
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let is_container =
            lookup("KUBERNETES_SERVICE_HOST").is_some() || lookup("DOCKER_CONTAINER").is_some();

        Self {
            service_name: lookup("SWAP_SERVICE_NAME").unwrap_or(defaults.service_name),

            log_level: lookup("SWAP_LOG_LEVEL")
                .or_else(|| lookup("RUST_LOG"))
                .unwrap_or(defaults.log_level),

            console_output: lookup("SWAP_CONSOLE_OUTPUT")
                .map(|v| v.to_lowercase() != "false" && v != "0")
                .unwrap_or(defaults.console_output),

            json_logs: lookup("SWAP_JSON_LOGS")
                .map(|v| v.to_lowercase() == "true" || v == "1")
                .unwrap_or(is_container),

            metrics_port: lookup("SWAP_METRICS_PORT")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.metrics_port),

            otlp_endpoint: lookup("OTEL_EXPORTER_OTLP_ENDPOINT").filter(|v| !v.is_empty()),

            network: lookup("SWAP_NETWORK").unwrap_or(defaults.network),
        }
    }

    /// Service name qualified with the network, used as the trace resource.
    pub fn full_service_name(&self) -> String {
        format!("{}-{}", self.service_name, self.network)
    }
}
