//! # Domain Invariants
//!
//! Safety rules every swap must satisfy.

use super::errors::{ContractRejectionKind, ValidationError};
use super::secure_secret::SecureSecret;
use super::timelocks::{LegTimelocks, Timelocks};
use super::value_objects::{EscrowState, Hashlock, HashlockPair};

/// Invariant: cross-chain timelock ordering.
///
/// The destination withdrawal window must close (destination cancellation
/// opens) at least `margin_secs` before the source becomes cancellable.
pub fn invariant_timelock_ordering(
    timelocks: &Timelocks,
    margin_secs: u64,
) -> Result<(), ValidationError> {
    let destination_cancellation = timelocks.destination.cancellation;
    let source_cancellation = timelocks.source.cancellation;
    if destination_cancellation.saturating_add(margin_secs) >= source_cancellation {
        return Err(ValidationError::CrossChainOrdering {
            destination_cancellation,
            source_cancellation,
            margin: margin_secs,
        });
    }
    Ok(())
}

/// Invariant: stages within one leg are monotone and the withdrawal window
/// closes before cancellation opens.
pub fn invariant_leg_ordering(
    leg: &'static str,
    timelocks: &LegTimelocks,
) -> Result<(), ValidationError> {
    if timelocks.withdrawal > timelocks.public_withdrawal {
        return Err(ValidationError::TimelockOrdering {
            leg,
            detail: "public withdrawal before private withdrawal",
        });
    }
    if timelocks.public_withdrawal >= timelocks.cancellation {
        return Err(ValidationError::TimelockOrdering {
            leg,
            detail: "cancellation before withdrawal window closes",
        });
    }
    if let Some(public) = timelocks.public_cancellation {
        if public < timelocks.cancellation {
            return Err(ValidationError::TimelockOrdering {
                leg,
                detail: "public cancellation before private cancellation",
            });
        }
    }
    Ok(())
}

/// Invariant: the secret hashes to the hashlock.
pub fn invariant_secret_matches(secret: &SecureSecret, hashlock: &Hashlock) -> bool {
    hashlock.matches(secret.as_bytes())
}

/// Invariant: the secret opens both legs.
pub fn invariant_hashlock_pair(secret: &SecureSecret, hashlocks: &HashlockPair) -> bool {
    invariant_secret_matches(secret, &hashlocks.source)
        && invariant_secret_matches(secret, &hashlocks.destination)
}

/// Invariant: the on-chain escrow commits to the expected hashlock and schedule.
///
/// A mismatch means the escrow found at our salt is not ours.
pub fn invariant_escrow_matches(
    state: &EscrowState,
    hashlock: &Hashlock,
    timelocks: &LegTimelocks,
) -> bool {
    state.hashlock == hashlock.digest && state.timelocks == *timelocks
}

/// Invariant: enough confirmations for finality.
pub fn invariant_sufficient_confirmations(confirmations: u64, required: u64) -> bool {
    confirmations >= required
}

/// Contract-side withdrawal check, shared by the simulated escrow.
///
/// Leaves the escrow untouched on every error.
pub fn check_withdrawal(
    state: &EscrowState,
    secret: &[u8],
    hashlock: &Hashlock,
    now: u64,
    caller_is_taker: bool,
) -> Result<(), ContractRejectionKind> {
    if state.completed {
        return Err(ContractRejectionKind::AlreadyCompleted);
    }
    if state.cancelled {
        return Err(ContractRejectionKind::AlreadyCancelled);
    }
    if !state.funded {
        return Err(ContractRejectionKind::NotFunded);
    }
    let tl = &state.timelocks;
    if now < tl.withdrawal {
        return Err(ContractRejectionKind::WithdrawalWindowNotOpen);
    }
    if now >= tl.cancellation {
        return Err(ContractRejectionKind::WithdrawalWindowClosed);
    }
    if now < tl.public_withdrawal && !caller_is_taker {
        return Err(ContractRejectionKind::Unauthorized);
    }
    if !hashlock.matches(secret) {
        return Err(ContractRejectionKind::InvalidSecret);
    }
    Ok(())
}

/// Contract-side cancellation check.
pub fn check_cancellation(
    state: &EscrowState,
    now: u64,
    caller_is_taker: bool,
) -> Result<(), ContractRejectionKind> {
    if state.completed {
        return Err(ContractRejectionKind::AlreadyCompleted);
    }
    if state.cancelled {
        return Err(ContractRejectionKind::AlreadyCancelled);
    }
    if !state.funded {
        return Err(ContractRejectionKind::NotFunded);
    }
    let tl = &state.timelocks;
    if now < tl.cancellation {
        return Err(ContractRejectionKind::CancellationWindowNotOpen);
    }
    let public = tl.public_cancellation.map_or(false, |p| now >= p);
    if !public && !caller_is_taker {
        return Err(ContractRejectionKind::Unauthorized);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::HashAlgorithm;

    fn leg() -> LegTimelocks {
        LegTimelocks {
            withdrawal: 100,
            public_withdrawal: 200,
            cancellation: 300,
            public_cancellation: Some(400),
        }
    }

    fn funded(hashlock: &Hashlock) -> EscrowState {
        EscrowState {
            amount: 1000,
            safety_deposit: 10,
            hashlock: hashlock.digest,
            timelocks: leg(),
            funded: true,
            funded_block: Some(1),
            completed: false,
            cancelled: false,
        }
    }

    #[test]
    fn test_cross_chain_ordering() {
        let mut tl = Timelocks {
            base_time: 0,
            source: leg(),
            destination: LegTimelocks {
                withdrawal: 50,
                public_withdrawal: 60,
                cancellation: 200,
                public_cancellation: None,
            },
        };
        assert!(invariant_timelock_ordering(&tl, 50).is_ok());
        assert!(invariant_timelock_ordering(&tl, 100).is_err());
        tl.destination.cancellation = 300;
        assert!(invariant_timelock_ordering(&tl, 0).is_err());
    }

    #[test]
    fn test_leg_ordering() {
        assert!(invariant_leg_ordering("source", &leg()).is_ok());
        let bad = LegTimelocks {
            cancellation: 150,
            ..leg()
        };
        assert!(matches!(
            invariant_leg_ordering("source", &bad),
            Err(ValidationError::TimelockOrdering { .. })
        ));
    }

    #[test]
    fn test_secret_pair() {
        let secret = SecureSecret::new([3u8; 32]);
        let pair = HashlockPair {
            source: secret.hashlock(HashAlgorithm::Keccak256),
            destination: secret.hashlock(HashAlgorithm::Sha256),
        };
        assert!(invariant_hashlock_pair(&secret, &pair));
        let other = SecureSecret::new([4u8; 32]);
        assert!(!invariant_hashlock_pair(&other, &pair));
    }

    #[test]
    fn test_withdrawal_rules() {
        let lock = Hashlock::of(HashAlgorithm::Sha256, &[1u8; 32]);
        let state = funded(&lock);
        assert_eq!(
            check_withdrawal(&state, &[1u8; 32], &lock, 99, true),
            Err(ContractRejectionKind::WithdrawalWindowNotOpen)
        );
        assert_eq!(
            check_withdrawal(&state, &[1u8; 32], &lock, 150, false),
            Err(ContractRejectionKind::Unauthorized)
        );
        assert_eq!(
            check_withdrawal(&state, &[2u8; 32], &lock, 150, true),
            Err(ContractRejectionKind::InvalidSecret)
        );
        assert_eq!(check_withdrawal(&state, &[1u8; 32], &lock, 150, true), Ok(()));
        assert_eq!(check_withdrawal(&state, &[1u8; 32], &lock, 250, false), Ok(()));
        assert_eq!(
            check_withdrawal(&state, &[1u8; 32], &lock, 300, true),
            Err(ContractRejectionKind::WithdrawalWindowClosed)
        );
    }

    #[test]
    fn test_cancellation_rules() {
        let lock = Hashlock::of(HashAlgorithm::Sha256, &[1u8; 32]);
        let state = funded(&lock);
        assert_eq!(
            check_cancellation(&state, 299, true),
            Err(ContractRejectionKind::CancellationWindowNotOpen)
        );
        assert_eq!(
            check_cancellation(&state, 300, false),
            Err(ContractRejectionKind::Unauthorized)
        );
        assert_eq!(check_cancellation(&state, 300, true), Ok(()));
        assert_eq!(check_cancellation(&state, 400, false), Ok(()));
        let done = EscrowState {
            completed: true,
            ..state
        };
        assert_eq!(
            check_cancellation(&done, 400, true),
            Err(ContractRejectionKind::AlreadyCompleted)
        );
    }
}
