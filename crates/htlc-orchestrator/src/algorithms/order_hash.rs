//! # Order Hashing
//!
//! Order hash binds chains, parties, assets and amounts of a request. Escrow
//! salts bind the order hash to one swap and one leg, so an escrow created
//! by an earlier attempt can be found again instead of re-created.

use sha3::{Digest, Keccak256};

use crate::domain::{Hash, Leg, LegTerms, OrderHash, SwapId, SwapRequest, TokenRef};

const ORDER_DOMAIN: &[u8] = b"htlc-orchestrator/order/v1";
const SALT_DOMAIN: &[u8] = b"htlc-orchestrator/escrow-salt/v1";

/// Digest of the request terms. Timelock overrides are not part of the order.
pub fn compute_order_hash(request: &SwapRequest) -> OrderHash {
    let mut hasher = Keccak256::new();
    hasher.update(ORDER_DOMAIN);
    hasher.update(request.source_chain.as_str().as_bytes());
    hasher.update([0u8]);
    hasher.update(request.destination_chain.as_str().as_bytes());
    hasher.update([0u8]);
    feed_leg(&mut hasher, &request.source);
    feed_leg(&mut hasher, &request.destination);
    hasher.update(request.nonce.to_be_bytes());
    OrderHash(hasher.finalize().into())
}

/// Deterministic escrow salt for one leg of one swap.
pub fn escrow_salt(order_hash: &OrderHash, swap_id: &SwapId, leg: Leg) -> Hash {
    let mut hasher = Keccak256::new();
    hasher.update(SALT_DOMAIN);
    hasher.update(order_hash.0);
    hasher.update(swap_id.as_bytes());
    hasher.update([leg.tag()]);
    hasher.finalize().into()
}

fn feed_leg(hasher: &mut Keccak256, leg: &LegTerms) {
    hasher.update(leg.maker.as_str().as_bytes());
    hasher.update([0u8]);
    hasher.update(leg.taker.as_str().as_bytes());
    hasher.update([0u8]);
    match &leg.token {
        TokenRef::Native => hasher.update([0u8]),
        TokenRef::Contract(address) => {
            hasher.update([1u8]);
            hasher.update(address.as_str().as_bytes());
        }
    }
    hasher.update([0u8]);
    hasher.update(leg.amount.to_be_bytes());
    hasher.update(leg.safety_deposit.to_be_bytes());
}
