//! Node configuration: one TOML file with environment overrides.
//!
//! ```toml
//! [orchestrator]        # OrchestratorConfig
//! [devnet]              # simulated chains
//! [http]                # /health and /metrics listener
//! [[orders]]            # SwapRequest queue fed to the orchestrator
//! ```

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use htlc_orchestrator::{OrchestratorConfig, SwapRequest};

/// Variable naming the config file.
pub const CONFIG_ENV: &str = "SWAP_NODE_CONFIG";

/// Config file used when `SWAP_NODE_CONFIG` is unset.
pub const DEFAULT_CONFIG_PATH: &str = "swap-node.toml";

/// Full node configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Orchestrator settings.
    pub orchestrator: OrchestratorConfig,
    /// Simulated chain settings.
    pub devnet: DevnetConfig,
    /// HTTP listener.
    pub http: HttpConfig,
    /// Orders queued at startup.
    pub orders: Vec<SwapRequest>,
}

/// Simulated chains and their accounts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DevnetConfig {
    /// Native (and token) balance credited to every known party.
    pub initial_balance: u128,
    /// Directory for persisted swaps; in-memory when absent.
    pub data_dir: Option<PathBuf>,
}

impl Default for DevnetConfig {
    fn default() -> Self {
        Self {
            initial_balance: 1_000_000_000_000_000_000,
            data_dir: None,
        }
    }
}

/// Listener for `/health` and `/metrics`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Bind address.
    pub bind: IpAddr,
    /// Port; the telemetry metrics port when absent.
    pub port: Option<u16>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: None,
        }
    }
}

impl HttpConfig {
    /// Socket address, falling back to `default_port`.
    pub fn addr(&self, default_port: u16) -> SocketAddr {
        SocketAddr::new(self.bind, self.port.unwrap_or(default_port))
    }
}

/// Config file path from `SWAP_NODE_CONFIG` or the default.
pub fn config_path(lookup: impl Fn(&str) -> Option<String>) -> PathBuf {
    lookup(CONFIG_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

impl NodeConfig {
    /// Parse and validate TOML content.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).context("malformed node config")?;
        config
            .orchestrator
            .validate()
            .context("invalid [orchestrator] section")?;
        Ok(config)
    }

    /// Load `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            warn!(path = %path.display(), "config file not found, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config = Self::from_toml_str(&content)
            .with_context(|| format!("failed to load {}", path.display()))?;
        info!(path = %path.display(), orders = config.orders.len(), "config loaded");
        Ok(config)
    }

    /// Apply `SWAP_HTTP_BIND`, `SWAP_HTTP_PORT`, `SWAP_DATA_DIR` and
    /// `SWAP_MAX_CONCURRENT_SWAPS`.
    pub fn apply_env(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(bind) = lookup("SWAP_HTTP_BIND") {
            self.http.bind = bind
                .parse()
                .with_context(|| format!("SWAP_HTTP_BIND is not an IP address: {}", bind))?;
        }
        if let Some(port) = lookup("SWAP_HTTP_PORT") {
            self.http.port = Some(
                port.parse()
                    .with_context(|| format!("SWAP_HTTP_PORT is not a port: {}", port))?,
            );
        }
        if let Some(dir) = lookup("SWAP_DATA_DIR") {
            self.devnet.data_dir = Some(PathBuf::from(dir));
        }
        if let Some(max) = lookup("SWAP_MAX_CONCURRENT_SWAPS") {
            self.orchestrator.max_concurrent_swaps = max.parse().with_context(|| {
                format!("SWAP_MAX_CONCURRENT_SWAPS is not a number: {}", max)
            })?;
            self.orchestrator
                .validate()
                .context("invalid SWAP_MAX_CONCURRENT_SWAPS")?;
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use htlc_orchestrator::{ChainFamily, TokenRef};
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    const SAMPLE: &str = r#"
[orchestrator]
max_concurrent_swaps = 8
reveal_delay_secs = 10

[devnet]
initial_balance = 5000000

[http]
bind = "0.0.0.0"
port = 9300

[[orders]]
source_chain = "evm"
destination_chain = "non_evm"
nonce = 7

[orders.source]
maker = "0xa1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1"
taker = "0xb2b2b2b2b2b2b2b2b2b2b2b2b2b2b2b2b2b2b2b2"
amount = 1000
safety_deposit = 1000

[orders.destination]
maker = "0:a2a2a2a2a2a2a2a2a2a2a2a2a2a2a2a2a2a2a2a2a2a2a2a2a2a2a2a2a2a2a2a2"
taker = "0:0000000000000000000000000000000000000000000000000000000000000000"
amount = 500
safety_deposit = 1000
token = { type = "contract", address = "0:b1b1b1b1b1b1b1b1b1b1b1b1b1b1b1b1b1b1b1b1b1b1b1b1b1b1b1b1b1b1b1b1" }
"#;

    #[test]
    fn test_empty_file_gives_defaults() {
        let config = NodeConfig::from_toml_str("").unwrap();
        assert_eq!(config, NodeConfig::default());
        assert!(config.orders.is_empty());
        assert_eq!(config.http.addr(9100).port(), 9100);
    }

    #[test]
    fn test_sections_parse() {
        let config = NodeConfig::from_toml_str(SAMPLE).unwrap();
        assert_eq!(config.orchestrator.max_concurrent_swaps, 8);
        assert_eq!(config.orchestrator.reveal_delay_secs, 10);
        assert_eq!(config.devnet.initial_balance, 5_000_000);
        assert_eq!(config.http.addr(9100).to_string(), "0.0.0.0:9300");

        assert_eq!(config.orders.len(), 1);
        let order = &config.orders[0];
        assert_eq!(order.source_chain, ChainFamily::Evm);
        assert_eq!(order.destination_chain, ChainFamily::NonEvm);
        assert_eq!(order.nonce, 7);
        assert!(order.source.token.is_native());
        assert!(matches!(order.destination.token, TokenRef::Contract(_)));
        assert!(order.timelocks.is_none());
    }

    #[test]
    fn test_shipped_config_parses() {
        let config =
            NodeConfig::from_toml_str(include_str!("../../../swap-node.toml")).unwrap();
        assert_eq!(config.orders.len(), 2);
        assert_eq!(config.orders[1].source_chain, ChainFamily::NonEvm);
        assert_eq!(
            config.orchestrator.timelocks.default_delays,
            OrchestratorConfig::default().timelocks.default_delays
        );
    }

    #[test]
    fn test_invalid_orchestrator_section_is_rejected() {
        let err = NodeConfig::from_toml_str("[orchestrator]\nmax_concurrent_swaps = 0\n")
            .unwrap_err();
        assert!(format!("{:#}", err).contains("max_concurrent_swaps"));
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let config = NodeConfig::load(Path::new("/nonexistent/swap-node.toml")).unwrap();
        assert_eq!(config, NodeConfig::default());
    }

    #[test]
    fn test_env_overrides() {
        let config = NodeConfig::default()
            .apply_env(lookup_from(&[
                ("SWAP_HTTP_BIND", "0.0.0.0"),
                ("SWAP_HTTP_PORT", "9400"),
                ("SWAP_DATA_DIR", "/var/lib/swaps"),
                ("SWAP_MAX_CONCURRENT_SWAPS", "3"),
            ]))
            .unwrap();
        assert_eq!(config.http.addr(9100).to_string(), "0.0.0.0:9400");
        assert_eq!(config.devnet.data_dir, Some(PathBuf::from("/var/lib/swaps")));
        assert_eq!(config.orchestrator.max_concurrent_swaps, 3);

        assert!(NodeConfig::default()
            .apply_env(lookup_from(&[("SWAP_HTTP_PORT", "http")]))
            .is_err());
        assert!(NodeConfig::default()
            .apply_env(lookup_from(&[("SWAP_MAX_CONCURRENT_SWAPS", "0")]))
            .is_err());
    }

    #[test]
    fn test_config_path() {
        assert_eq!(config_path(|_| None), PathBuf::from(DEFAULT_CONFIG_PATH));
        assert_eq!(
            config_path(lookup_from(&[(CONFIG_ENV, "/etc/swap.toml")])),
            PathBuf::from("/etc/swap.toml")
        );
    }
}
