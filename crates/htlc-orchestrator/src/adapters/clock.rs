//! Clock adapters.

use std::time::{SystemTime, UNIX_EPOCH};
use tokio::time::Instant;

use crate::ports::Clock;

/// Wall clock.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }
}

/// Unix time driven by the tokio clock, so paused-time tests advance it.
#[derive(Clone, Copy, Debug)]
pub struct TokioClock {
    base: u64,
    start: Instant,
}

impl TokioClock {
    /// Clock reading `base` now.
    pub fn starting_at(base: u64) -> Self {
        Self {
            base,
            start: Instant::now(),
        }
    }
}

impl Clock for TokioClock {
    fn now(&self) -> u64 {
        self.base + self.start.elapsed().as_secs()
    }
}
