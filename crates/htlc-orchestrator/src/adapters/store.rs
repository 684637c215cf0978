//! Swap persistence adapters.
//!
//! Stored swaps include the secret so a restarted orchestrator can still
//! complete a revealed swap. Protect the JSON directory like a key store.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::domain::{Swap, SwapError, SwapId};
use crate::ports::SwapStore;

/// Process-local store.
#[derive(Default)]
pub struct InMemorySwapStore {
    swaps: RwLock<HashMap<SwapId, Swap>>,
}

impl InMemorySwapStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored swaps.
    pub fn len(&self) -> usize {
        self.swaps.read().len()
    }

    /// Whether nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.swaps.read().is_empty()
    }
}

impl SwapStore for InMemorySwapStore {
    fn save(&self, swap: &Swap) -> Result<(), SwapError> {
        self.swaps.write().insert(swap.id, swap.clone());
        Ok(())
    }

    fn load_all(&self) -> Result<Vec<Swap>, SwapError> {
        Ok(self.swaps.read().values().cloned().collect())
    }
}

/// One JSON document per swap under a directory.
pub struct JsonDirSwapStore {
    dir: PathBuf,
}

impl JsonDirSwapStore {
    /// Open (and create) `dir`.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, SwapError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)
            .map_err(|e| SwapError::Store(format!("create {}: {}", dir.display(), e)))?;
        Ok(Self { dir })
    }

    fn path_for(&self, id: &SwapId) -> PathBuf {
        self.dir.join(format!("{}.json", id))
    }
}

impl SwapStore for JsonDirSwapStore {
    fn save(&self, swap: &Swap) -> Result<(), SwapError> {
        let path = self.path_for(&swap.id);
        let tmp = path.with_extension("json.tmp");
        let body = serde_json::to_vec_pretty(swap)
            .map_err(|e| SwapError::Store(format!("encode {}: {}", swap.id, e)))?;
        fs::write(&tmp, body)
            .map_err(|e| SwapError::Store(format!("write {}: {}", tmp.display(), e)))?;
        fs::rename(&tmp, &path)
            .map_err(|e| SwapError::Store(format!("rename {}: {}", path.display(), e)))
    }

    fn load_all(&self) -> Result<Vec<Swap>, SwapError> {
        let entries = fs::read_dir(&self.dir)
            .map_err(|e| SwapError::Store(format!("read {}: {}", self.dir.display(), e)))?;
        let mut swaps = Vec::new();
        for entry in entries {
            let path = entry
                .map_err(|e| SwapError::Store(e.to_string()))?
                .path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let bytes = fs::read(&path)
                .map_err(|e| SwapError::Store(format!("read {}: {}", path.display(), e)))?;
            match serde_json::from_slice::<Swap>(&bytes) {
                Ok(swap) => swaps.push(swap),
                Err(e) => warn!(path = %path.display(), error = %e, "skipping unreadable swap record"),
            }
        }
        Ok(swaps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        HashAlgorithm, HashlockPair, LegAmounts, LegParties, LegTimelocks, NewSwap, OrderHash,
        SecureSecret, SwapAmounts, SwapDirection, SwapParties, SwapStatus, Timelocks, TokenRef,
    };

    fn swap() -> Swap {
        let secret = SecureSecret::new([6; 32]);
        let legs = LegTimelocks {
            withdrawal: 10,
            public_withdrawal: 20,
            cancellation: 30,
            public_cancellation: None,
        };
        let parties = LegParties {
            maker: "0x01".into(),
            taker: "0x02".into(),
        };
        let amounts = LegAmounts {
            token: TokenRef::Native,
            amount: 1,
            safety_deposit: 1,
        };
        Swap::new(NewSwap {
            id: SwapId::new(),
            order_hash: OrderHash([1; 32]),
            direction: SwapDirection::EvmToNonEvm,
            parties: SwapParties {
                source: parties.clone(),
                destination: parties,
            },
            amounts: SwapAmounts {
                source: amounts.clone(),
                destination: amounts,
            },
            hashlocks: HashlockPair {
                source: secret.hashlock(HashAlgorithm::Keccak256),
                destination: secret.hashlock(HashAlgorithm::Sha256),
            },
            secret,
            timelocks: Timelocks {
                base_time: 0,
                source: legs,
                destination: legs,
            },
            created_at: 0,
        })
    }

    #[test]
    fn test_in_memory_active_filter() {
        let store = InMemorySwapStore::new();
        let mut done = swap();
        done.transition_to(SwapStatus::Cancelled, 1).unwrap();
        store.save(&swap()).unwrap();
        store.save(&done).unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.load_active().unwrap().len(), 1);
    }

    #[test]
    fn test_json_dir_keeps_secret() {
        let dir = std::env::temp_dir().join(format!("htlc-store-{}", SwapId::new()));
        let store = JsonDirSwapStore::open(&dir).unwrap();
        let original = swap();
        store.save(&original).unwrap();

        let loaded = store.load_all().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id, original.id);
        assert_eq!(loaded[0].secret(), original.secret());
        fs::remove_dir_all(dir).ok();
    }
}
