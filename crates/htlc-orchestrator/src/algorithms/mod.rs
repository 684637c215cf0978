//! # Algorithms Module
//!
//! Secret generation, timelock scheduling, order hashing and retry backoff.

pub mod order_hash;
pub mod retry;
pub mod secret;
pub mod timelock_policy;

pub use order_hash::{compute_order_hash, escrow_salt};
pub use retry::{retry_transient, RetryPolicy};
pub use secret::{generate_random_secret, verify_secret, SecretManager};
pub use timelock_policy::TimelockPolicy;
