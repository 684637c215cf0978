//! # Orchestrator Configuration
//!
//! Per-chain settings, timelock bounds, retry policy and scheduler intervals.
//! Loaded from TOML; every section falls back to `Default`.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::algorithms::retry::RetryPolicy;
use crate::domain::{invariant_leg_ordering, ChainFamily, HashAlgorithm, LegTimelocks, TimelockDelays};

/// Minimum delay floor (30 minutes).
pub const DEFAULT_MIN_DELAY_SECS: u64 = 30 * 60;

/// Maximum delay ceiling (7 days).
pub const DEFAULT_MAX_DELAY_SECS: u64 = 7 * 24 * 3600;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File I/O error.
    #[error("failed to read {path}: {error}")]
    Io {
        /// File path.
        path: String,
        /// I/O detail.
        error: String,
    },
    /// TOML parsing error.
    #[error("failed to parse config: {0}")]
    Parse(String),
    /// Semantically invalid value.
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Settings for one chain.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainConfig {
    /// Human-readable chain name used in logs and metrics.
    pub name: String,
    /// Chain family.
    pub family: ChainFamily,
    /// Hash function the escrow contracts on this chain apply.
    pub hash_algorithm: HashAlgorithm,
    /// Confirmations past the funding block before revealing.
    pub required_confirmations: u64,
    /// Expected block interval.
    pub block_time_secs: u64,
    /// Upper bound on the finality wait.
    pub finality_timeout_secs: u64,
    /// Added to the base time of this chain's schedule to absorb clock skew.
    pub safety_margin_secs: u64,
    /// Smallest accepted safety deposit.
    pub min_safety_deposit: u128,
    /// Escrow factory contract.
    pub factory_address: String,
    /// Resolver account that creates escrows.
    pub resolver_address: String,
    /// Attempts to find the creation event before giving up.
    pub reference_extraction_attempts: u32,
    /// Initial delay between extraction attempts (doubles each attempt).
    pub reference_extraction_backoff_ms: u64,
}

impl ChainConfig {
    /// Defaults for the EVM chain.
    pub fn evm_default() -> Self {
        Self {
            name: "evm".to_string(),
            family: ChainFamily::Evm,
            hash_algorithm: HashAlgorithm::Keccak256,
            required_confirmations: 12,
            block_time_secs: 12,
            finality_timeout_secs: 1_200,
            safety_margin_secs: 60,
            min_safety_deposit: 1_000,
            factory_address: format!("0x{}", "fa".repeat(20)),
            resolver_address: format!("0x{}", "5e".repeat(20)),
            reference_extraction_attempts: 5,
            reference_extraction_backoff_ms: 1_000,
        }
    }

    /// Defaults for the TVM chain.
    pub fn non_evm_default() -> Self {
        Self {
            name: "tvm".to_string(),
            family: ChainFamily::NonEvm,
            hash_algorithm: HashAlgorithm::Sha256,
            required_confirmations: 3,
            block_time_secs: 5,
            finality_timeout_secs: 600,
            safety_margin_secs: 120,
            min_safety_deposit: 1_000,
            factory_address: format!("0:{}", "fa".repeat(32)),
            resolver_address: format!("0:{}", "5e".repeat(32)),
            reference_extraction_attempts: 8,
            reference_extraction_backoff_ms: 2_000,
        }
    }

    /// Bound on the finality wait.
    pub fn finality_timeout(&self) -> Duration {
        Duration::from_secs(self.finality_timeout_secs)
    }

    fn validate(&self, expected: ChainFamily) -> Result<(), ConfigError> {
        if self.family != expected {
            return Err(ConfigError::Invalid(format!(
                "chain {} configured as {} but used as {}",
                self.name, self.family, expected
            )));
        }
        if self.required_confirmations == 0 || self.block_time_secs == 0 {
            return Err(ConfigError::Invalid(format!(
                "chain {} needs non-zero confirmations and block time",
                self.name
            )));
        }
        for (field, address) in [
            ("factory_address", &self.factory_address),
            ("resolver_address", &self.resolver_address),
        ] {
            if !self.family.is_valid_address(address) {
                return Err(ConfigError::Invalid(format!(
                    "chain {} {} is not a valid {} address: {}",
                    self.name, field, self.family, address
                )));
            }
        }
        if self.reference_extraction_attempts == 0 {
            return Err(ConfigError::Invalid(format!(
                "chain {} needs at least one reference extraction attempt",
                self.name
            )));
        }
        Ok(())
    }
}

/// Timelock bounds and defaults.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimelockPolicyConfig {
    /// Delays used when a request carries none.
    pub default_delays: TimelockDelays,
    /// Floor for every cancellation delay.
    pub min_delay_secs: u64,
    /// Ceiling for every delay.
    pub max_delay_secs: u64,
    /// Gap between destination cancellation and source cancellation.
    pub min_cross_chain_margin_secs: u64,
}

impl Default for TimelockPolicyConfig {
    fn default() -> Self {
        Self {
            default_delays: TimelockDelays::default(),
            min_delay_secs: DEFAULT_MIN_DELAY_SECS,
            max_delay_secs: DEFAULT_MAX_DELAY_SECS,
            min_cross_chain_margin_secs: 1_800,
        }
    }
}

/// Orchestrator configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Swaps driven at once; further swaps wait in `Created`.
    pub max_concurrent_swaps: usize,
    /// Transient error handling.
    pub retry: RetryPolicy,
    /// Timelock policy.
    pub timelocks: TimelockPolicyConfig,
    /// Pause between both-funded finality and the destination reveal.
    pub reveal_delay_secs: u64,
    /// Poll interval for chain-time and finality waits.
    pub poll_interval_ms: u64,
    /// Reveal watcher interval.
    pub watcher_interval_ms: u64,
    /// Grace added to timelock-derived wait bounds.
    pub cancellation_grace_secs: u64,
    /// Maximum time `shutdown` waits for drivers.
    pub shutdown_drain_secs: u64,
    /// EVM chain.
    pub evm: ChainConfig,
    /// TVM chain.
    pub non_evm: ChainConfig,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_concurrent_swaps: 64,
            retry: RetryPolicy::default(),
            timelocks: TimelockPolicyConfig::default(),
            reveal_delay_secs: 30,
            poll_interval_ms: 2_000,
            watcher_interval_ms: 5_000,
            cancellation_grace_secs: 3_600,
            shutdown_drain_secs: 30,
            evm: ChainConfig::evm_default(),
            non_evm: ChainConfig::non_evm_default(),
        }
    }
}

impl OrchestratorConfig {
    /// Create a config for testing (short delays, few confirmations).
    pub fn for_testing() -> Self {
        let mut evm = ChainConfig::evm_default();
        evm.required_confirmations = 3;
        evm.finality_timeout_secs = 300;
        evm.reference_extraction_backoff_ms = 200;
        let mut non_evm = ChainConfig::non_evm_default();
        non_evm.required_confirmations = 2;
        non_evm.finality_timeout_secs = 300;
        non_evm.reference_extraction_backoff_ms = 200;
        Self {
            max_concurrent_swaps: 16,
            retry: RetryPolicy::for_testing(),
            timelocks: TimelockPolicyConfig::default(),
            reveal_delay_secs: 5,
            poll_interval_ms: 1_000,
            watcher_interval_ms: 1_000,
            cancellation_grace_secs: 600,
            shutdown_drain_secs: 5,
            evm,
            non_evm,
        }
    }

    /// Chain settings for `family`.
    pub fn chain(&self, family: ChainFamily) -> &ChainConfig {
        match family {
            ChainFamily::Evm => &self.evm,
            ChainFamily::NonEvm => &self.non_evm,
        }
    }

    /// Poll interval.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    /// Watcher interval.
    pub fn watcher_interval(&self) -> Duration {
        Duration::from_millis(self.watcher_interval_ms.max(1))
    }

    /// Check internal consistency.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_concurrent_swaps == 0 {
            return Err(ConfigError::Invalid(
                "max_concurrent_swaps must be positive".into(),
            ));
        }
        if self.retry.max_attempts == 0 || self.retry.multiplier == 0 {
            return Err(ConfigError::Invalid(
                "retry needs at least one attempt and a positive multiplier".into(),
            ));
        }
        let tl = &self.timelocks;
        if tl.min_delay_secs > tl.max_delay_secs {
            return Err(ConfigError::Invalid(format!(
                "min_delay_secs {} exceeds max_delay_secs {}",
                tl.min_delay_secs, tl.max_delay_secs
            )));
        }
        let d = &tl.default_delays;
        let source = LegTimelocks {
            withdrawal: d.src_withdrawal,
            public_withdrawal: d.src_public_withdrawal,
            cancellation: d.src_cancellation,
            public_cancellation: Some(d.src_public_cancellation),
        };
        let destination = LegTimelocks {
            withdrawal: d.dst_withdrawal,
            public_withdrawal: d.dst_public_withdrawal,
            cancellation: d.dst_cancellation,
            public_cancellation: None,
        };
        invariant_leg_ordering("source", &source)
            .and_then(|_| invariant_leg_ordering("destination", &destination))
            .map_err(|e| ConfigError::Invalid(format!("default delays: {}", e)))?;
        self.evm.validate(ChainFamily::Evm)?;
        self.non_evm.validate(ChainFamily::NonEvm)?;
        Ok(())
    }

    /// Parse from a TOML string and validate.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file and validate.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io {
            path: path.as_ref().display().to_string(),
            error: e.to_string(),
        })?;
        Self::from_toml_str(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = OrchestratorConfig::default();
        config.validate().unwrap();
        assert_eq!(config.timelocks.min_delay_secs, 1_800);
        assert_eq!(config.retry.max_attempts, 4);
        assert_eq!(config.evm.hash_algorithm, HashAlgorithm::Keccak256);
        assert_eq!(config.non_evm.hash_algorithm, HashAlgorithm::Sha256);
    }

    #[test]
    fn test_testing_config_is_valid() {
        let config = OrchestratorConfig::for_testing();
        config.validate().unwrap();
        assert_eq!(config.evm.required_confirmations, 3);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = OrchestratorConfig::from_toml_str(
            r#"
            max_concurrent_swaps = 8
            reveal_delay_secs = 60

            [retry]
            max_attempts = 5
            "#,
        )
        .unwrap();
        assert_eq!(config.max_concurrent_swaps, 8);
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.base_delay_ms, 2_000);
        assert_eq!(config.evm, ChainConfig::evm_default());
    }

    #[test]
    fn test_wrong_family_rejected() {
        let mut config = OrchestratorConfig::default();
        config.evm.family = ChainFamily::NonEvm;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_bad_address_rejected() {
        let mut config = OrchestratorConfig::default();
        config.non_evm.factory_address = "0x1234".into();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_parse_error() {
        assert!(matches!(
            OrchestratorConfig::from_toml_str("max_concurrent_swaps = \"many\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            OrchestratorConfig::load("/nonexistent/swap.toml"),
            Err(ConfigError::Io { .. })
        ));
    }
}
