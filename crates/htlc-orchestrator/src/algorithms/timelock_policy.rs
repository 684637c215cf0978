//! # Timelock Policy
//!
//! Turns relative delays into the absolute seven-point schedule for both
//! legs. Every output satisfies the per-leg and cross-chain ordering
//! invariants; inputs that cannot are rejected here, at creation time.

use crate::config::TimelockPolicyConfig;
use crate::domain::{
    invariant_leg_ordering, invariant_timelock_ordering, ChainFamily, Leg, LegTimelocks,
    SwapDirection, TimelockDelays, Timelocks, ValidationError,
};

/// Computes and checks swap schedules.
#[derive(Clone, Debug)]
pub struct TimelockPolicy {
    config: TimelockPolicyConfig,
    evm_margin_secs: u64,
    non_evm_margin_secs: u64,
}

impl TimelockPolicy {
    /// Policy with per-chain safety margins.
    pub fn new(config: TimelockPolicyConfig, evm_margin_secs: u64, non_evm_margin_secs: u64) -> Self {
        Self {
            config,
            evm_margin_secs,
            non_evm_margin_secs,
        }
    }

    /// Delays used when a request carries none.
    pub fn default_delays(&self) -> TimelockDelays {
        self.config.default_delays
    }

    /// Check delay bounds.
    ///
    /// Cancellation delays must meet the floor; no delay may exceed the ceiling.
    pub fn validate_delays(&self, delays: &TimelockDelays) -> Result<(), ValidationError> {
        for (field, got) in delays.named() {
            if got > self.config.max_delay_secs {
                return Err(ValidationError::TimelockTooLong {
                    field,
                    got,
                    max: self.config.max_delay_secs,
                });
            }
        }
        for (field, got) in [
            ("src_cancellation", delays.src_cancellation),
            ("src_public_cancellation", delays.src_public_cancellation),
            ("dst_cancellation", delays.dst_cancellation),
        ] {
            if got < self.config.min_delay_secs {
                return Err(ValidationError::TimelockTooShort {
                    field,
                    got,
                    min: self.config.min_delay_secs,
                });
            }
        }
        Ok(())
    }

    /// Absolute schedule for both legs.
    pub fn compute(
        &self,
        base_time: u64,
        direction: SwapDirection,
        delays: &TimelockDelays,
    ) -> Result<Timelocks, ValidationError> {
        self.validate_delays(delays)?;

        let src_base = base_time.saturating_add(self.margin(direction.family(Leg::Source)));
        let dst_base = base_time.saturating_add(self.margin(direction.family(Leg::Destination)));

        let source = LegTimelocks {
            withdrawal: src_base.saturating_add(delays.src_withdrawal),
            public_withdrawal: src_base.saturating_add(delays.src_public_withdrawal),
            cancellation: src_base.saturating_add(delays.src_cancellation),
            public_cancellation: Some(src_base.saturating_add(delays.src_public_cancellation)),
        };
        let destination = LegTimelocks {
            withdrawal: dst_base.saturating_add(delays.dst_withdrawal),
            public_withdrawal: dst_base.saturating_add(delays.dst_public_withdrawal),
            cancellation: dst_base.saturating_add(delays.dst_cancellation),
            public_cancellation: None,
        };
        invariant_leg_ordering("source", &source)?;
        invariant_leg_ordering("destination", &destination)?;

        let timelocks = Timelocks {
            base_time,
            source,
            destination,
        };
        invariant_timelock_ordering(&timelocks, self.config.min_cross_chain_margin_secs)?;
        Ok(timelocks)
    }

    /// Cross-chain margin enforced between the legs.
    pub fn cross_chain_margin(&self) -> u64 {
        self.config.min_cross_chain_margin_secs
    }

    fn margin(&self, family: ChainFamily) -> u64 {
        match family {
            ChainFamily::Evm => self.evm_margin_secs,
            ChainFamily::NonEvm => self.non_evm_margin_secs,
        }
    }
}
