//! # Ports Module
//!
//! Hexagonal architecture ports (inbound API and outbound dependencies).

pub mod inbound;
pub mod outbound;

pub use inbound::{ChainHealth, HealthSnapshot, SwapOrchestratorApi};
pub use outbound::{
    rejection_from_revert, ChainAdapter, ChainClient, ChainClientError, ChainEvent, Clock,
    EscrowParams, Funding, OrderSource, Receipt, ReceiptStatus, SignedTransaction, Signature,
    SignerProvider, SwapStore, TxRequest,
};
