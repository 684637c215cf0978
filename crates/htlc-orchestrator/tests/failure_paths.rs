//! # Failure Path Tests
//!
//! Validation, cancellation, escalation and fault injection against the
//! simulated chains.
//!
//! ## Test Categories
//!
//! 1. **Validation** - requests rejected before any chain action
//! 2. **Cancellation** - contract rejections and operator aborts refund
//! 3. **Escalation** - finality failures end in `Failed` with the secret kept
//! 4. **Faults** - transient RPC errors, wrong preimages

mod common;

use common::*;
use htlc_orchestrator::domain::{SecretView, SwapStatus};
use htlc_orchestrator::ports::ChainClientError;
use htlc_orchestrator::{
    Address, ChainFamily, ContractRejectionKind, FailureReason, Leg, OrchestratorConfig,
    SecureSecret, SwapError, SwapOrchestratorApi, TimelockDelays, TokenRef, TxKind,
    ValidationError,
};

fn validation(err: SwapError) -> ValidationError {
    match err {
        SwapError::Validation(v) => v,
        other => panic!("expected validation error, got {}", other),
    }
}

// =============================================================================
// VALIDATION
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_zero_amount_rejected() {
    let harness = Harness::new();
    let orchestrator = harness.orchestrator();
    let mut request = harness.request(ChainFamily::Evm, 1);
    request.destination.amount = 0;
    let err = validation(orchestrator.create_swap(request).await.unwrap_err());
    assert_eq!(err, ValidationError::ZeroAmount { leg: "destination" });
    assert!(harness.store.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_address_checked_against_leg_chain() {
    let harness = Harness::new();
    let orchestrator = harness.orchestrator();
    let mut request = harness.request(ChainFamily::Evm, 1);
    // A TVM address on the EVM leg.
    request.source.maker = maker(ChainFamily::NonEvm);
    let err = validation(orchestrator.create_swap(request).await.unwrap_err());
    assert!(matches!(
        err,
        ValidationError::InvalidAddress {
            field: "source.maker",
            ..
        }
    ));

    let mut request = harness.request(ChainFamily::Evm, 2);
    request.destination.token = TokenRef::Contract(Address::new("0xdeadbeef"));
    let err = validation(orchestrator.create_swap(request).await.unwrap_err());
    assert!(matches!(
        err,
        ValidationError::InvalidAddress {
            field: "destination.token",
            ..
        }
    ));
}

#[tokio::test(start_paused = true)]
async fn test_same_chain_direction_rejected() {
    let harness = Harness::new();
    let orchestrator = harness.orchestrator();
    let mut request = harness.request(ChainFamily::Evm, 1);
    request.destination_chain = ChainFamily::Evm;
    let err = validation(orchestrator.create_swap(request).await.unwrap_err());
    assert!(matches!(err, ValidationError::UnsupportedDirection(_)));
}

#[tokio::test(start_paused = true)]
async fn test_low_safety_deposit_rejected() {
    let harness = Harness::new();
    let orchestrator = harness.orchestrator();
    let mut request = harness.request(ChainFamily::NonEvm, 1);
    request.source.safety_deposit = 1;
    let err = validation(orchestrator.create_swap(request).await.unwrap_err());
    assert_eq!(
        err,
        ValidationError::SafetyDepositTooLow {
            leg: "source",
            got: 1,
            min: harness.config.non_evm.min_safety_deposit,
        }
    );
}

#[tokio::test(start_paused = true)]
async fn test_destination_must_close_before_source_cancellation() {
    let harness = Harness::new();
    let orchestrator = harness.orchestrator();
    let mut request = harness.request(ChainFamily::Evm, 1);
    request.timelocks = Some(TimelockDelays {
        src_withdrawal: 600,
        src_public_withdrawal: 2_700,
        src_cancellation: 3_000,
        src_public_cancellation: 4_000,
        dst_withdrawal: 300,
        dst_public_withdrawal: 1_800,
        dst_cancellation: 2_900,
    });
    let err = validation(orchestrator.create_swap(request).await.unwrap_err());
    assert!(matches!(err, ValidationError::CrossChainOrdering { .. }));
}

#[tokio::test(start_paused = true)]
async fn test_duplicate_order_rejected() {
    let harness = Harness::new();
    let orchestrator = harness.orchestrator();
    orchestrator
        .create_swap(harness.request(ChainFamily::Evm, 7))
        .await
        .unwrap();
    let err = validation(
        orchestrator
            .create_swap(harness.request(ChainFamily::Evm, 7))
            .await
            .unwrap_err(),
    );
    assert!(matches!(err, ValidationError::DuplicateOrder(_)));
    // A different nonce is a different order.
    orchestrator
        .create_swap(harness.request(ChainFamily::Evm, 8))
        .await
        .unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_unknown_swap_not_found() {
    let harness = Harness::new();
    let orchestrator = harness.orchestrator();
    let id = htlc_orchestrator::SwapId::new();
    assert!(matches!(
        orchestrator.get_swap_status(&id),
        Err(SwapError::SwapNotFound(_))
    ));
    assert!(matches!(
        orchestrator.cancel_swap(&id).await,
        Err(SwapError::SwapNotFound(_))
    ));
}

// =============================================================================
// CANCELLATION
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_destination_funding_rejection_refunds_source() {
    let harness = Harness::new();
    harness
        .tvm_chain
        .reject_next("fund", "insufficient_balance");
    let orchestrator = harness.started();

    let id = orchestrator
        .create_swap(harness.request(ChainFamily::Evm, 1))
        .await
        .unwrap();
    let snapshot = finish(&orchestrator, &id).await;

    assert_eq!(snapshot.status, SwapStatus::Cancelled);
    assert_eq!(snapshot.secret, SecretView::Discarded);
    assert!(orchestrator.recovery_bundle(&id).unwrap().secret_hex.is_none());

    let src = snapshot.escrows.source.unwrap();
    let state = harness.evm_chain.escrow_state(&src.address).unwrap();
    assert!(state.cancelled);
    assert!(!state.completed);
    let dst = snapshot.escrows.destination.unwrap();
    assert!(!harness.tvm_chain.escrow_state(&dst.address).unwrap().funded);

    // Principal back to the maker; the deposit pays the resolver's cancel.
    assert_eq!(
        harness.evm_chain.native_balance(&maker(ChainFamily::Evm)),
        FUNDS - DEPOSIT
    );
    let log = &snapshot.transaction_log;
    assert!(log.iter().any(|r| r.kind == TxKind::Rejection));
    assert!(log
        .iter()
        .any(|r| r.kind == TxKind::Cancel && r.leg == Leg::Source));
    // Refund only after the source cancellation window opened.
    let cancel = log.iter().find(|r| r.kind == TxKind::Cancel).unwrap();
    assert!(cancel.timestamp >= snapshot.timelocks.source.cancellation);
    assert_eq!(orchestrator.health().cancelled, 1);
}

#[tokio::test(start_paused = true)]
async fn test_destination_creation_rejection_cancels_swap() {
    let harness = Harness::new();
    // TVM to EVM: the destination escrow is created by the EVM factory.
    harness
        .evm_chain
        .reject_next("createEscrow", "factory_paused");
    let orchestrator = harness.started();

    let id = orchestrator
        .create_swap(harness.request(ChainFamily::NonEvm, 1))
        .await
        .unwrap();
    let snapshot = finish(&orchestrator, &id).await;

    assert_eq!(snapshot.status, SwapStatus::Cancelled);
    assert_eq!(snapshot.secret, SecretView::Discarded);
    assert!(snapshot.escrows.destination.is_none());
    let src = snapshot.escrows.source.unwrap();
    let state = harness.tvm_chain.escrow_state(&src.address).unwrap();
    assert!(!state.funded);
    assert!(!state.completed);

    let log = &snapshot.transaction_log;
    assert!(log
        .iter()
        .any(|r| r.kind == TxKind::Rejection && r.leg == Leg::Destination));
    assert!(!log.iter().any(|r| r.kind == TxKind::Withdraw));
    assert_eq!(harness.tvm_chain.executed_count("create_escrow"), 1);
    assert_eq!(harness.evm_chain.executed_count("createEscrow"), 0);
    for chain in [&harness.evm_chain, &harness.tvm_chain] {
        assert_eq!(chain.executed_count("fund"), 0);
        assert_eq!(chain.executed_count("withdraw"), 0);
        assert_eq!(chain.executed_count("cancel"), 0);
    }
    assert_eq!(
        harness.tvm_chain.native_balance(&maker(ChainFamily::NonEvm)),
        FUNDS
    );
}

#[tokio::test(start_paused = true)]
async fn test_operator_abort_refunds_both_legs() {
    let harness = Harness::new();
    let orchestrator = harness.started();
    let id = orchestrator
        .create_swap(harness.request(ChainFamily::NonEvm, 1))
        .await
        .unwrap();
    wait_for_status(&orchestrator, &id, SwapStatus::SourceFunded).await;
    orchestrator.cancel_swap(&id).await.unwrap();
    // Repeated requests are accepted and change nothing.
    orchestrator.cancel_swap(&id).await.unwrap();

    let snapshot = finish(&orchestrator, &id).await;
    assert_eq!(snapshot.status, SwapStatus::Cancelled);
    let log = &snapshot.transaction_log;
    assert_eq!(
        log.iter()
            .filter(|r| r.kind == TxKind::AbortRequested)
            .count(),
        1
    );
    assert!(!log.iter().any(|r| r.kind == TxKind::Withdraw));

    for (leg, family) in [(Leg::Source, ChainFamily::NonEvm), (Leg::Destination, ChainFamily::Evm)] {
        if let Some(escrow) = snapshot.escrows.for_leg(leg) {
            let state = harness.chain(family).escrow_state(&escrow.address).unwrap();
            assert!(!state.completed);
            assert!(!state.funded || state.cancelled, "{} escrow still locked", leg);
        }
    }
    assert_eq!(harness.tvm_chain.executed_count("withdraw"), 0);
    assert_eq!(harness.evm_chain.executed_count("withdraw"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_abort_before_escrows_cancels_without_chain_actions() {
    let harness = Harness::new();
    let orchestrator = harness.started();
    let id = orchestrator
        .create_swap(harness.request(ChainFamily::Evm, 1))
        .await
        .unwrap();
    orchestrator.cancel_swap(&id).await.unwrap();

    let snapshot = finish(&orchestrator, &id).await;
    assert_eq!(snapshot.status, SwapStatus::Cancelled);
    assert!(snapshot.escrows.source.is_none());
    assert_eq!(harness.evm_chain.executed_count("createEscrow"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_cannot_cancel_after_reveal() {
    let harness = Harness::new();
    let orchestrator = harness.started();
    let id = orchestrator
        .create_swap(harness.request(ChainFamily::Evm, 1))
        .await
        .unwrap();
    wait_for_status(&orchestrator, &id, SwapStatus::DestinationWithdrawn).await;

    let err = orchestrator.cancel_swap(&id).await.unwrap_err();
    assert!(matches!(err, SwapError::CannotCancel { .. }));
    assert_eq!(finish(&orchestrator, &id).await.status, SwapStatus::Completed);
}

// =============================================================================
// ESCALATION
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_finality_timeout_fails_without_reveal() {
    let mut config = OrchestratorConfig::for_testing();
    // 100 blocks of 12s cannot fit in the 300s finality bound.
    config.evm.required_confirmations = 100;
    let harness = Harness::with_config(config);
    let orchestrator = harness.started();

    let id = orchestrator
        .create_swap(harness.request(ChainFamily::Evm, 1))
        .await
        .unwrap();
    let snapshot = finish(&orchestrator, &id).await;

    assert_eq!(snapshot.status, SwapStatus::Failed);
    let failure = snapshot.failure.clone().unwrap();
    assert_eq!(failure.reason, FailureReason::FinalityTimeout);
    assert_eq!(failure.failed_in, SwapStatus::BothFunded);
    assert_eq!(snapshot.secret, SecretView::Redacted);
    assert!(snapshot
        .transaction_log
        .iter()
        .any(|r| r.kind == TxKind::FinalityTimeout && r.leg == Leg::Source));

    // Secret kept for manual recovery, never published.
    let bundle = orchestrator.recovery_bundle(&id).unwrap();
    assert!(bundle.secret_hex.is_some());
    assert!(!bundle.secret_public);
    assert_eq!(harness.tvm_chain.executed_count("withdraw"), 0);

    let health = orchestrator.health();
    assert_eq!(health.failed, 1);
    assert_eq!(health.success_rate, 0.0);
}

#[tokio::test(start_paused = true)]
async fn test_halted_destination_chain_fails_finality() {
    let harness = Harness::new();
    let orchestrator = harness.started();
    let id = orchestrator
        .create_swap(harness.request(ChainFamily::Evm, 1))
        .await
        .unwrap();
    wait_for_status(&orchestrator, &id, SwapStatus::BothFunded).await;
    harness.tvm_chain.halt();

    let snapshot = finish(&orchestrator, &id).await;
    assert_eq!(snapshot.status, SwapStatus::Failed);
    assert_eq!(
        snapshot.failure.unwrap().reason,
        FailureReason::FinalityTimeout
    );
    assert_eq!(harness.tvm_chain.executed_count("withdraw"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_source_preimage_out_before_destination_funding_fails() {
    let harness = Harness::new();
    // The destination deposit bounces once; the driver parks on the source refund.
    harness
        .tvm_chain
        .reject_next("fund", "insufficient_balance");
    let first = harness.started();
    let id = first
        .create_swap(harness.request(ChainFamily::Evm, 1))
        .await
        .unwrap();
    loop {
        let snapshot = first.get_swap_status(&id).unwrap();
        if snapshot
            .transaction_log
            .iter()
            .any(|r| r.kind == TxKind::Rejection)
        {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_secs(1)).await;
    }
    let bundle = first.recovery_bundle(&id).unwrap();
    first.shutdown().await;
    let snapshot = first.get_swap_status(&id).unwrap();
    assert_eq!(snapshot.status, SwapStatus::SourceFunded);

    // The resolver claims the source while the swap is parked.
    let src = snapshot.escrows.source.clone().unwrap();
    let evm = harness.adapter(ChainFamily::Evm);
    while evm.chain_time().await.unwrap() < snapshot.timelocks.source.withdrawal {
        tokio::time::sleep(std::time::Duration::from_secs(10)).await;
    }
    let secret = SecureSecret::from_hex(bundle.secret_hex.as_deref().unwrap()).unwrap();
    evm.withdraw(&src, &secret, &harness.resolver(ChainFamily::Evm))
        .await
        .unwrap();

    let second = harness.orchestrator();
    second.start(None);
    assert_eq!(second.resume().unwrap(), 1);
    let snapshot = finish(&second, &id).await;

    assert_eq!(snapshot.status, SwapStatus::Failed);
    let failure = snapshot.failure.clone().unwrap();
    assert_eq!(failure.reason, FailureReason::IrrecoverableState);
    assert_eq!(failure.failed_in, SwapStatus::SourceFunded);
    assert!(second.recovery_bundle(&id).unwrap().secret_hex.is_some());

    // Only the resolver's own claim moved funds.
    assert_eq!(harness.evm_chain.executed_count("withdraw"), 1);
    assert_eq!(harness.tvm_chain.executed_count("fund"), 0);
    for chain in [&harness.evm_chain, &harness.tvm_chain] {
        assert_eq!(chain.executed_count("cancel"), 0);
    }
    assert_eq!(harness.tvm_chain.executed_count("withdraw"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_unindexed_destination_escrow_fails_swap() {
    let harness = Harness::with_chains(OrchestratorConfig::for_testing(), |sim| {
        if sim.family == ChainFamily::NonEvm {
            sim.event_lag_blocks = 10_000;
        }
    });
    let orchestrator = harness.started();
    let id = orchestrator
        .create_swap(harness.request(ChainFamily::Evm, 1))
        .await
        .unwrap();
    let snapshot = finish(&orchestrator, &id).await;

    assert_eq!(snapshot.status, SwapStatus::Failed);
    let failure = snapshot.failure.clone().unwrap();
    assert_eq!(failure.reason, FailureReason::ReferenceExtractionFailed);
    assert_eq!(failure.failed_in, SwapStatus::Created);
    assert!(snapshot.escrows.destination.is_none());
    assert_eq!(harness.tvm_chain.executed_count("create_escrow"), 1);

    let src = snapshot.escrows.source.unwrap();
    assert!(!harness.evm_chain.escrow_state(&src.address).unwrap().funded);
    for chain in [&harness.evm_chain, &harness.tvm_chain] {
        assert_eq!(chain.executed_count("fund"), 0);
        assert_eq!(chain.executed_count("withdraw"), 0);
        assert_eq!(chain.executed_count("cancel"), 0);
    }
}

// =============================================================================
// FAULTS
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_transient_send_failures_are_retried() {
    let harness = Harness::new();
    harness
        .evm_chain
        .fail_next_sends(2, ChainClientError::Timeout("rpc".into()));
    let orchestrator = harness.started();

    let id = orchestrator
        .create_swap(harness.request(ChainFamily::Evm, 1))
        .await
        .unwrap();
    let snapshot = finish(&orchestrator, &id).await;
    assert_eq!(snapshot.status, SwapStatus::Completed);
    assert_eq!(harness.evm_chain.executed_count("createEscrow"), 1);
    assert!(orchestrator.health().retries >= 2);
}

#[tokio::test(start_paused = true)]
async fn test_wrong_preimage_rejected_by_escrow() {
    let mut config = OrchestratorConfig::for_testing();
    config.reveal_delay_secs = 600;
    let harness = Harness::with_config(config);
    let orchestrator = harness.started();
    let id = orchestrator
        .create_swap(harness.request(ChainFamily::Evm, 1))
        .await
        .unwrap();
    wait_for_status(&orchestrator, &id, SwapStatus::BothFunded).await;

    let snapshot = orchestrator.get_swap_status(&id).unwrap();
    let escrow = snapshot.escrows.destination.clone().unwrap();
    let tvm = harness.adapter(ChainFamily::NonEvm);
    while tvm.chain_time().await.unwrap() < snapshot.timelocks.destination.withdrawal {
        tokio::time::sleep(std::time::Duration::from_secs(5)).await;
    }
    let err = tvm
        .withdraw(
            &escrow,
            &SecureSecret::new([0x42; 32]),
            &harness.resolver(ChainFamily::NonEvm),
        )
        .await
        .unwrap_err();
    assert_eq!(err.rejection(), Some(&ContractRejectionKind::InvalidSecret));
    assert!(!harness
        .tvm_chain
        .escrow_state(&escrow.address)
        .unwrap()
        .completed);

    // The real swap is unaffected.
    assert_eq!(finish(&orchestrator, &id).await.status, SwapStatus::Completed);
}
