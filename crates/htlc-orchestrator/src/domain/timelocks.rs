//! # Timelocks
//!
//! Relative delays (configuration) and the absolute per-leg schedule they
//! produce.
//!
//! ```text
//! source:      |-- withdrawal --|-- public withdrawal --|-- cancellation --|-- public cancellation -->
//! destination: |-- withdrawal --|-- public withdrawal --|-- cancellation -->
//!                                                     ^ dst cancellation + margin < src cancellation
//! ```

use serde::{Deserialize, Serialize};

use super::value_objects::Leg;

/// Delays in seconds, relative to a leg's base time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelockDelays {
    /// Source: private withdrawal opens.
    pub src_withdrawal: u64,
    /// Source: anyone may withdraw.
    pub src_public_withdrawal: u64,
    /// Source: private cancellation opens, withdrawal closes.
    pub src_cancellation: u64,
    /// Source: anyone may cancel.
    pub src_public_cancellation: u64,
    /// Destination: private withdrawal opens.
    pub dst_withdrawal: u64,
    /// Destination: anyone may withdraw.
    pub dst_public_withdrawal: u64,
    /// Destination: cancellation opens, withdrawal closes.
    pub dst_cancellation: u64,
}

impl Default for TimelockDelays {
    fn default() -> Self {
        Self {
            src_withdrawal: 600,
            src_public_withdrawal: 2_700,
            src_cancellation: 7_200,
            src_public_cancellation: 9_000,
            dst_withdrawal: 300,
            dst_public_withdrawal: 1_800,
            dst_cancellation: 3_600,
        }
    }
}

impl TimelockDelays {
    /// Every delay with its name, in schedule order per leg.
    pub fn named(&self) -> [(&'static str, u64); 7] {
        [
            ("src_withdrawal", self.src_withdrawal),
            ("src_public_withdrawal", self.src_public_withdrawal),
            ("src_cancellation", self.src_cancellation),
            ("src_public_cancellation", self.src_public_cancellation),
            ("dst_withdrawal", self.dst_withdrawal),
            ("dst_public_withdrawal", self.dst_public_withdrawal),
            ("dst_cancellation", self.dst_cancellation),
        ]
    }
}

/// Absolute timelocks (unix seconds) enforced by one escrow.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegTimelocks {
    /// Private withdrawal opens.
    pub withdrawal: u64,
    /// Public withdrawal opens.
    pub public_withdrawal: u64,
    /// Withdrawal closes, private cancellation opens.
    pub cancellation: u64,
    /// Public cancellation opens. Destination escrows have none.
    pub public_cancellation: Option<u64>,
}

/// Phase of an escrow at a given time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimelockStage {
    /// Nothing allowed yet.
    Locked,
    /// Taker may withdraw.
    PrivateWithdrawal,
    /// Anyone may withdraw.
    PublicWithdrawal,
    /// Taker may cancel.
    PrivateCancellation,
    /// Anyone may cancel.
    PublicCancellation,
}

impl LegTimelocks {
    /// Stage at chain time `now`.
    pub fn stage_at(&self, now: u64) -> TimelockStage {
        if now < self.withdrawal {
            TimelockStage::Locked
        } else if now < self.public_withdrawal {
            TimelockStage::PrivateWithdrawal
        } else if now < self.cancellation {
            TimelockStage::PublicWithdrawal
        } else {
            match self.public_cancellation {
                Some(public) if now >= public => TimelockStage::PublicCancellation,
                _ => TimelockStage::PrivateCancellation,
            }
        }
    }

    /// Withdrawal window `[withdrawal, cancellation)` contains `now`.
    pub fn withdrawal_open(&self, now: u64) -> bool {
        now >= self.withdrawal && now < self.cancellation
    }

    /// Cancellation window is open at `now`.
    pub fn cancellation_open(&self, now: u64) -> bool {
        now >= self.cancellation
    }

    /// Stages are monotone.
    pub fn is_ordered(&self) -> bool {
        self.withdrawal <= self.public_withdrawal
            && self.public_withdrawal < self.cancellation
            && self.public_cancellation.map_or(true, |p| self.cancellation <= p)
    }
}

/// Schedule for both legs of a swap.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timelocks {
    /// Base time the schedule was computed from.
    pub base_time: u64,
    /// Source escrow schedule.
    pub source: LegTimelocks,
    /// Destination escrow schedule.
    pub destination: LegTimelocks,
}

impl Timelocks {
    /// Schedule for `leg`.
    pub fn for_leg(&self, leg: Leg) -> &LegTimelocks {
        match leg {
            Leg::Source => &self.source,
            Leg::Destination => &self.destination,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leg() -> LegTimelocks {
        LegTimelocks {
            withdrawal: 100,
            public_withdrawal: 200,
            cancellation: 300,
            public_cancellation: Some(400),
        }
    }

    #[test]
    fn test_stage_progression() {
        let tl = leg();
        assert_eq!(tl.stage_at(99), TimelockStage::Locked);
        assert_eq!(tl.stage_at(100), TimelockStage::PrivateWithdrawal);
        assert_eq!(tl.stage_at(250), TimelockStage::PublicWithdrawal);
        assert_eq!(tl.stage_at(300), TimelockStage::PrivateCancellation);
        assert_eq!(tl.stage_at(400), TimelockStage::PublicCancellation);
    }

    #[test]
    fn test_destination_has_no_public_cancellation() {
        let tl = LegTimelocks {
            public_cancellation: None,
            ..leg()
        };
        assert_eq!(tl.stage_at(10_000), TimelockStage::PrivateCancellation);
        assert!(tl.is_ordered());
    }

    #[test]
    fn test_windows_are_disjoint() {
        let tl = leg();
        for t in [99, 100, 299, 300, 301] {
            assert!(!(tl.withdrawal_open(t) && tl.cancellation_open(t)));
        }
    }

    #[test]
    fn test_unordered_detected() {
        let tl = LegTimelocks {
            public_withdrawal: 300,
            ..leg()
        };
        assert!(!tl.is_ordered());
    }
}
