//! # Secret Generation and Verification
//!
//! Swap secrets come straight from the operating system CSPRNG. If the OS
//! cannot supply entropy, swap creation aborts; there is no fallback RNG.

use rand::rngs::OsRng;
use rand::RngCore;
use tracing::error;

use crate::domain::{Hashlock, HashAlgorithm, HashlockPair, SecureSecret, SwapError};

/// Generates secrets and their per-leg hashlocks.
#[derive(Clone, Copy, Debug)]
pub struct SecretManager {
    source_algorithm: HashAlgorithm,
    destination_algorithm: HashAlgorithm,
}

impl SecretManager {
    /// Manager for a chain pair, using each chain's escrow hash function.
    pub fn new(source_algorithm: HashAlgorithm, destination_algorithm: HashAlgorithm) -> Self {
        Self {
            source_algorithm,
            destination_algorithm,
        }
    }

    /// Fresh 32-byte secret and its hashlocks for both legs.
    pub fn generate(&self) -> Result<(SecureSecret, HashlockPair), SwapError> {
        let secret = generate_random_secret()?;
        let hashlocks = self.hashlocks_for(&secret);
        Ok((secret, hashlocks))
    }

    /// Hashlocks of an existing secret.
    pub fn hashlocks_for(&self, secret: &SecureSecret) -> HashlockPair {
        HashlockPair {
            source: secret.hashlock(self.source_algorithm),
            destination: secret.hashlock(self.destination_algorithm),
        }
    }
}

/// Generate a secret from the OS entropy source.
pub fn generate_random_secret() -> Result<SecureSecret, SwapError> {
    let mut bytes = [0u8; 32];
    if let Err(e) = OsRng.try_fill_bytes(&mut bytes) {
        error!(error = %e, "OS entropy source failed");
        return Err(SwapError::EntropyUnavailable(e.to_string()));
    }
    Ok(SecureSecret::new(bytes))
}

/// Verify a candidate preimage against a hashlock.
pub fn verify_secret(secret: &SecureSecret, hashlock: &Hashlock) -> bool {
    hashlock.matches(secret.as_bytes())
}
