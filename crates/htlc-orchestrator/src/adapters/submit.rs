//! Transaction submission shared by the chain adapters.
//!
//! Serializes submissions per sender so nonces are read, signed and
//! consumed one transaction at a time across concurrent swaps.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::domain::{Address, SwapError};
use crate::ports::{ChainClient, Receipt, ReceiptStatus, SignedTransaction, SignerProvider, TxRequest};
use crate::ports::outbound::rejection_from_revert;

/// Signs and submits transactions for one chain.
pub struct TxSubmitter {
    chain: String,
    client: Arc<dyn ChainClient>,
    signer: Arc<dyn SignerProvider>,
    sender_locks: Mutex<HashMap<Address, Arc<tokio::sync::Mutex<()>>>>,
}

impl TxSubmitter {
    /// Submitter for `chain`.
    pub fn new(
        chain: impl Into<String>,
        client: Arc<dyn ChainClient>,
        signer: Arc<dyn SignerProvider>,
    ) -> Self {
        Self {
            chain: chain.into(),
            client,
            signer,
            sender_locks: Mutex::new(HashMap::new()),
        }
    }

    fn sender_lock(&self, from: &Address) -> Arc<tokio::sync::Mutex<()>> {
        self.sender_locks
            .lock()
            .entry(from.clone())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    /// Sign, send and wait for the receipt.
    ///
    /// Reverts map to `ContractRejection`; RPC failures keep their
    /// transient classification so callers can retry the whole submission.
    pub async fn submit(
        &self,
        from: &Address,
        to: &Address,
        method: String,
        payload: Vec<u8>,
        value: u128,
    ) -> Result<Receipt, SwapError> {
        let lock = self.sender_lock(from);
        let _guard = lock.lock().await;

        let nonce = self
            .client
            .get_transaction_count(from)
            .await
            .map_err(|e| e.into_swap_error(&self.chain))?;
        let request = TxRequest {
            from: from.clone(),
            to: to.clone(),
            nonce,
            method,
            payload,
            value,
        };
        let signature = self
            .signer
            .sign(&self.chain, from, &request.signing_bytes())
            .await?;

        debug!(
            chain = %self.chain,
            from = %from,
            to = %to,
            method = %request.method,
            nonce,
            "submitting transaction"
        );
        let method = request.method.clone();
        let tx_hash = self
            .client
            .send_transaction(SignedTransaction { request, signature })
            .await
            .map_err(|e| e.into_swap_error(&self.chain))?;
        let receipt = self
            .client
            .wait_receipt(&tx_hash)
            .await
            .map_err(|e| e.into_swap_error(&self.chain))?;

        match &receipt.status {
            ReceiptStatus::Success => Ok(receipt),
            ReceiptStatus::Reverted(reason) => {
                warn!(chain = %self.chain, %method, %reason, tx = %tx_hash, "transaction reverted");
                Err(SwapError::ContractRejection {
                    chain: self.chain.clone(),
                    kind: rejection_from_revert(reason),
                })
            }
        }
    }
}
