//! # Domain Module
//!
//! Core domain types for swap orchestration.

pub mod entities;
pub mod errors;
pub mod invariants;
pub mod secure_secret;
pub mod state_machine;
pub mod timelocks;
pub mod value_objects;

pub use entities::*;
pub use errors::*;
pub use invariants::*;
pub use secure_secret::SecureSecret;
pub use state_machine::{FailureReason, SwapStatus};
pub use timelocks::{LegTimelocks, TimelockDelays, TimelockStage, Timelocks};
pub use value_objects::*;
