//! # Swap Driver
//!
//! Runs one swap from its current status until it is terminal or the
//! orchestrator shuts down. Every step first checks chain state through the
//! adapters, so re-driving a swap after a restart repeats no transaction.
//!
//! ```text
//! Created         create source escrow, then destination escrow
//! EscrowsCreated  fund source (maker deposits)
//! SourceFunded    fund destination (taker deposits)
//! BothFunded      finality on both legs, reveal delay, destination window,
//!                 withdraw destination (secret becomes public)
//! DestinationWithdrawn
//!                 withdraw source with the public secret
//! ```
//!
//! Error routing before the reveal: operator aborts, contract rejections and
//! exhausted retries go to the cancellation path; finality errors, reference
//! extraction failures and irrecoverable states escalate to `Failed`. After
//! the reveal nothing is cancelled: the source withdrawal is retried until
//! the source cancellation window opens, then the swap fails with the secret
//! kept for manual completion.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use super::orchestrator::Inner;
use super::registry::SwapHandle;
use super::watcher::find_published_secret;
use crate::algorithms::{escrow_salt, retry_transient};
use crate::domain::{
    ContractRejectionKind, EscrowRef, FailureReason, Leg, SecureSecret, Swap, SwapError,
    SwapStatus, TxKind, TxResult,
};
use crate::ports::{ChainAdapter, EscrowParams, Funding};

/// Drive `handle` until terminal or shutdown.
pub(crate) async fn drive(inner: Arc<Inner>, handle: Arc<SwapHandle>) {
    let _step = handle.lock_step().await;
    let mut driver = SwapDriver {
        inner: &inner,
        handle: &handle,
        shutdown: inner.shutdown.subscribe(),
    };
    match driver.run().await {
        Ok(()) => {}
        Err(SwapError::ShuttingDown) => {
            info!(swap_id = %handle.id(), status = %handle.status(), "driver stopped, swap left for resume");
            return;
        }
        Err(err) => driver.escalate(err),
    }
    if handle.status().is_terminal() {
        driver.finish();
    }
}

/// Result of a chain-time wait.
#[derive(Debug, PartialEq, Eq)]
enum Wait {
    Reached,
    RevealObserved,
}

struct SwapDriver<'a> {
    inner: &'a Inner,
    handle: &'a SwapHandle,
    shutdown: watch::Receiver<bool>,
}

impl<'a> SwapDriver<'a> {
    async fn run(&mut self) -> Result<(), SwapError> {
        loop {
            let status = self.handle.status();
            let step = match status {
                SwapStatus::Created | SwapStatus::EscrowsCreated | SwapStatus::SourceFunded => {
                    self.guarded(status).await
                }
                SwapStatus::BothFunded => self.reveal().await,
                SwapStatus::DestinationWithdrawn => self.settle().await,
                SwapStatus::Completed | SwapStatus::Cancelled | SwapStatus::Failed => {
                    return Ok(())
                }
            };
            if let Err(err) = step {
                self.recover(status, err).await?;
            }
        }
    }

    /// Pre-funding steps, preceded by abort and leak checks.
    async fn guarded(&mut self, status: SwapStatus) -> Result<(), SwapError> {
        if self.handle.is_aborted() {
            return Err(SwapError::Aborted);
        }
        // The destination is never funded once the source preimage is out.
        if status == SwapStatus::SourceFunded && self.handle.observed_secret().is_none() {
            find_published_secret(self.inner, self.handle).await;
        }
        if let Some((leg, _)) = self.handle.observed_secret() {
            return Err(SwapError::IrrecoverableState(format!(
                "secret published on the {} leg before both escrows were funded",
                leg
            )));
        }
        match status {
            SwapStatus::Created => self.create_escrows().await,
            SwapStatus::EscrowsCreated => self.fund(Leg::Source).await,
            _ => self.fund(Leg::Destination).await,
        }
    }

    /// Route a failed step: cancellation before the reveal, `Failed` otherwise.
    async fn recover(&mut self, status: SwapStatus, err: SwapError) -> Result<(), SwapError> {
        if let SwapError::ShuttingDown = err {
            return Err(err);
        }
        if let SwapError::ContractRejection { chain, kind } = &err {
            warn!(swap_id = %self.handle.id(), %chain, rejection = %kind, %status, "contract rejected step");
            self.inner.metrics.record_rejection(chain, kind);
        }
        let current = self.handle.status();
        if current.is_terminal() {
            return Ok(());
        }
        if current == SwapStatus::BothFunded {
            if self.handle.observed_secret().is_none() {
                find_published_secret(self.inner, self.handle).await;
            }
            if self.adopt_observed_reveal()? {
                return Ok(());
            }
        }
        if !(current.is_cancellable() && routes_to_cancellation(&err)) {
            self.escalate(err);
            return Ok(());
        }
        match self.cancel_path(err).await {
            Ok(()) => Ok(()),
            Err(SwapError::ShuttingDown) => Err(SwapError::ShuttingDown),
            Err(cancel_err) => {
                self.escalate(cancel_err);
                Ok(())
            }
        }
    }

    // -------------------------------------------------------------------------
    // Happy path
    // -------------------------------------------------------------------------

    async fn create_escrows(&mut self) -> Result<(), SwapError> {
        for leg in [Leg::Source, Leg::Destination] {
            if self.handle.read(|s| s.escrow(leg).is_some()) {
                continue;
            }
            let params = self.handle.read(|s| escrow_params(s, leg));
            let adapter = self.adapter(leg);
            let params = &params;
            let escrow = self
                .retry(adapter, "create_escrow", move || adapter.create_escrow(params))
                .await?;
            info!(
                swap_id = %self.handle.id(),
                chain = %adapter.chain_name(),
                %leg,
                escrow = %escrow.address,
                block = escrow.created_block,
                "escrow created"
            );
            let now = self.now();
            self.handle.update(|s| {
                s.record(
                    TxKind::CreateEscrow,
                    leg,
                    escrow.creation_tx.clone(),
                    now,
                    Some(escrow.address.to_string()),
                );
                s.set_escrow(leg, escrow);
            });
            self.persist();
        }
        self.transition(SwapStatus::EscrowsCreated)
    }

    async fn fund(&mut self, leg: Leg) -> Result<(), SwapError> {
        let escrow = self.escrow(leg)?;
        let funding = self.handle.read(|s| funding_for(s, leg));
        let adapter = self.adapter(leg);
        let (escrow_ref, funding_ref) = (&escrow, &funding);
        let tx = self
            .retry(adapter, "fund_escrow", move || {
                adapter.fund_escrow(escrow_ref, funding_ref)
            })
            .await?;
        info!(
            swap_id = %self.handle.id(),
            chain = %adapter.chain_name(),
            %leg,
            depositor = %funding.depositor,
            already_applied = tx.already_applied,
            "escrow funded"
        );
        self.record_tx(TxKind::FundEscrow, leg, &tx);
        self.transition(match leg {
            Leg::Source => SwapStatus::SourceFunded,
            Leg::Destination => SwapStatus::BothFunded,
        })
    }

    async fn reveal(&mut self) -> Result<(), SwapError> {
        if self.handle.is_aborted() {
            return Err(SwapError::Aborted);
        }
        if self.adopt_observed_reveal()? {
            return Ok(());
        }
        for leg in [Leg::Source, Leg::Destination] {
            if self.await_finality(leg).await? == Wait::RevealObserved {
                self.adopt_observed_reveal()?;
                return Ok(());
            }
        }

        // Delay between commitment and reveal against front-running.
        let until = Instant::now() + Duration::from_secs(self.inner.config.reveal_delay_secs);
        while Instant::now() < until {
            self.pause(until - Instant::now(), true).await?;
            if self.adopt_observed_reveal()? {
                return Ok(());
            }
        }

        let locks = self.handle.read(|s| s.timelocks.destination);
        if self
            .wait_for_chain_time(Leg::Destination, locks.withdrawal, true, true)
            .await?
            == Wait::RevealObserved
        {
            self.adopt_observed_reveal()?;
            return Ok(());
        }
        let adapter = self.adapter(Leg::Destination);
        let chain_now = self
            .retry(adapter, "chain_time", move || adapter.chain_time())
            .await?;
        if chain_now >= locks.cancellation {
            return Err(SwapError::ContractRejection {
                chain: adapter.chain_name().to_string(),
                kind: ContractRejectionKind::WithdrawalWindowClosed,
            });
        }
        if self.handle.is_aborted() {
            return Err(SwapError::Aborted);
        }

        // Point of no return: the withdrawal publishes the secret.
        match self.withdraw_leg(Leg::Destination).await {
            Ok(()) => self.transition(SwapStatus::DestinationWithdrawn),
            Err(SwapError::ShuttingDown) => Err(SwapError::ShuttingDown),
            Err(err) => {
                self.escalate(err);
                Ok(())
            }
        }
    }

    /// Finish both withdrawals once the secret is public.
    async fn settle(&mut self) -> Result<(), SwapError> {
        for leg in [Leg::Destination, Leg::Source] {
            if self
                .handle
                .read(|s| s.transaction_log().count(TxKind::Withdraw, leg) == 0)
            {
                self.withdraw_leg(leg).await?;
            }
        }
        self.transition(SwapStatus::Completed)
    }

    async fn await_finality(&mut self, leg: Leg) -> Result<Wait, SwapError> {
        if self
            .handle
            .read(|s| s.transaction_log().count(TxKind::FinalityReached, leg) > 0)
        {
            return Ok(Wait::Reached);
        }
        let escrow = self.escrow(leg)?;
        let adapter = self.adapter(leg);
        let chain = self.inner.config.chain(adapter.family());
        let dst_cancellation = self.handle.read(|s| s.timelocks.destination.cancellation);
        let deadline = (self.now() + chain.finality_timeout_secs).min(dst_cancellation);
        let required = adapter.required_confirmations();
        debug!(swap_id = %self.handle.id(), chain = %adapter.chain_name(), %leg, required, deadline, "waiting for finality");

        let result = self
            .interruptible(adapter.wait_for_finality(&escrow, required, deadline))
            .await;
        let now = self.now();
        match result {
            Ok(None) => {
                debug!(swap_id = %self.handle.id(), %leg, "finality wait ended by an observed reveal");
                Ok(Wait::RevealObserved)
            }
            Ok(Some(confirmations)) => {
                self.handle.update(|s| {
                    s.record(
                        TxKind::FinalityReached,
                        leg,
                        None,
                        now,
                        Some(format!("{} confirmations", confirmations)),
                    )
                });
                self.persist();
                Ok(Wait::Reached)
            }
            Err(
                err @ (SwapError::FinalityTimeout { .. } | SwapError::FinalityIndeterminate { .. }),
            ) => {
                warn!(swap_id = %self.handle.id(), chain = %adapter.chain_name(), %leg, error = %err, "finality not established");
                self.handle.update(|s| {
                    s.record(TxKind::FinalityTimeout, leg, None, now, Some(err.to_string()))
                });
                self.persist();
                Err(err)
            }
            Err(err) => Err(err),
        }
    }

    /// Withdraw `leg`, retrying until its cancellation window opens.
    async fn withdraw_leg(&mut self, leg: Leg) -> Result<(), SwapError> {
        let escrow = self.escrow(leg)?;
        let secret = self.secret()?;
        let (locks, caller) = self.handle.read(|s| {
            (
                *s.timelocks.for_leg(leg),
                s.parties.for_leg(leg).taker.clone(),
            )
        });
        let adapter = self.adapter(leg);
        loop {
            self.wait_for_chain_time(leg, locks.withdrawal, false, false)
                .await?;
            let (escrow_ref, secret_ref, caller_ref) = (&escrow, &secret, &caller);
            let attempt = self
                .retry(adapter, "withdraw", move || {
                    adapter.withdraw(escrow_ref, secret_ref, caller_ref)
                })
                .await;
            match attempt {
                Ok(tx) => {
                    info!(
                        swap_id = %self.handle.id(),
                        chain = %adapter.chain_name(),
                        %leg,
                        tx_hash = ?tx.tx_hash,
                        already_applied = tx.already_applied,
                        "escrow withdrawn"
                    );
                    self.record_tx(TxKind::Withdraw, leg, &tx);
                    return Ok(());
                }
                Err(err) if withdrawal_retryable(&err) => {
                    let chain_now = self
                        .retry(adapter, "chain_time", move || adapter.chain_time())
                        .await?;
                    if chain_now >= locks.cancellation {
                        return Err(SwapError::SuspensionTimeout {
                            what: format!(
                                "{} withdrawal on {} before cancellation opened",
                                leg,
                                adapter.chain_name()
                            ),
                        });
                    }
                    warn!(swap_id = %self.handle.id(), chain = %adapter.chain_name(), %leg, error = %err, "withdrawal failed, retrying");
                    let poll = self.inner.config.poll_interval();
                    self.pause(poll, false).await?;
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Switch to the completion path when someone else published the secret.
    fn adopt_observed_reveal(&self) -> Result<bool, SwapError> {
        let Some((leg, secret)) = self.handle.observed_secret() else {
            return Ok(false);
        };
        if !self
            .handle
            .read(|s| s.hashlocks.for_leg(leg).matches(secret.as_bytes()))
        {
            return Err(SwapError::IrrecoverableState(format!(
                "preimage published on the {} leg does not match its hashlock",
                leg
            )));
        }
        info!(swap_id = %self.handle.id(), %leg, "secret revealed by counterparty, completing");
        let now = self.now();
        self.handle.update(|s| {
            s.record(
                TxKind::RevealObserved,
                leg,
                None,
                now,
                Some("published by another party".into()),
            );
            s.transition_to(SwapStatus::DestinationWithdrawn, now)
        })?;
        self.persist();
        Ok(true)
    }

    // -------------------------------------------------------------------------
    // Cancellation path
    // -------------------------------------------------------------------------

    /// Refund every funded escrow, destination first, once each
    /// cancellation window opens.
    async fn cancel_path(&mut self, cause: SwapError) -> Result<(), SwapError> {
        let from = self.handle.status();
        warn!(swap_id = %self.handle.id(), status = %from, cause = %cause, "cancelling swap");
        if !matches!(cause, SwapError::Aborted) {
            let leg = self.leg_of_error(&cause);
            let now = self.now();
            self.handle.update(|s| {
                s.record(TxKind::Rejection, leg, None, now, Some(cause.to_string()))
            });
            self.persist();
        }

        let mut cancelled_any = false;
        for leg in [Leg::Destination, Leg::Source] {
            let Some(escrow) = self.locate(leg).await? else {
                continue;
            };
            let adapter = self.adapter(leg);
            let escrow_ref = &escrow;
            let state = self
                .retry(adapter, "read_escrow_state", move || {
                    adapter.read_escrow_state(escrow_ref)
                })
                .await?;
            if state.cancelled {
                continue;
            }
            if state.completed {
                return self.reveal_during_cancellation(leg, cancelled_any);
            }
            if !state.funded {
                continue;
            }

            let watch_reveal = from == SwapStatus::BothFunded && !cancelled_any;
            if self
                .wait_for_chain_time(leg, state.timelocks.cancellation, false, watch_reveal)
                .await?
                == Wait::RevealObserved
            {
                self.adopt_observed_reveal()?;
                return Ok(());
            }

            let caller = self.handle.read(|s| s.parties.for_leg(leg).taker.clone());
            let caller_ref = &caller;
            let tx = loop {
                let attempt = self
                    .retry(adapter, "cancel", move || adapter.cancel(escrow_ref, caller_ref))
                    .await;
                match attempt {
                    Ok(tx) => break tx,
                    Err(err)
                        if err.rejection()
                            == Some(&ContractRejectionKind::CancellationWindowNotOpen) =>
                    {
                        debug!(swap_id = %self.handle.id(), %leg, "cancellation window not open on chain yet");
                        let poll = self.inner.config.poll_interval();
                        self.pause(poll, false).await?;
                    }
                    Err(err) if err.rejection() == Some(&ContractRejectionKind::AlreadyCompleted) => {
                        return self.reveal_during_cancellation(leg, cancelled_any);
                    }
                    Err(err) => return Err(err),
                }
            };
            info!(
                swap_id = %self.handle.id(),
                chain = %adapter.chain_name(),
                %leg,
                tx_hash = ?tx.tx_hash,
                already_applied = tx.already_applied,
                "escrow refunded"
            );
            self.record_tx(TxKind::Cancel, leg, &tx);
            cancelled_any = true;
        }
        self.transition(SwapStatus::Cancelled)
    }

    /// An escrow was withdrawn while cancelling: the secret is out.
    fn reveal_during_cancellation(&self, leg: Leg, cancelled_any: bool) -> Result<(), SwapError> {
        if self.handle.status() != SwapStatus::BothFunded || cancelled_any {
            return Err(SwapError::IrrecoverableState(format!(
                "{} escrow withdrawn while the swap was being cancelled",
                leg
            )));
        }
        if let Some(secret) = self.handle.read(|s| s.secret().cloned()) {
            self.handle.observe_secret(leg, secret);
        }
        self.adopt_observed_reveal().map(|_| ())
    }

    /// Recorded escrow for `leg`, or one found by its deterministic salt.
    async fn locate(&mut self, leg: Leg) -> Result<Option<EscrowRef>, SwapError> {
        if let Some(escrow) = self.handle.read(|s| s.escrow(leg).cloned()) {
            return Ok(Some(escrow));
        }
        let salt = self
            .handle
            .read(|s| escrow_salt(&s.order_hash, &s.id, leg));
        let adapter = self.adapter(leg);
        let salt_ref = &salt;
        let found = self
            .retry(adapter, "find_escrow", move || adapter.find_escrow(leg, salt_ref))
            .await?;
        if let Some(escrow) = &found {
            debug!(swap_id = %self.handle.id(), %leg, escrow = %escrow.address, "found unrecorded escrow");
            let escrow = escrow.clone();
            self.handle.update(|s| s.set_escrow(leg, escrow));
            self.persist();
        }
        Ok(found)
    }

    // -------------------------------------------------------------------------
    // Suspension points
    // -------------------------------------------------------------------------

    /// Sleep up to `duration`. Wakes early on watcher or operator signals.
    async fn pause(&mut self, duration: Duration, abortable: bool) -> Result<(), SwapError> {
        if *self.shutdown.borrow() {
            return Err(SwapError::ShuttingDown);
        }
        if abortable && self.handle.is_aborted() {
            return Err(SwapError::Aborted);
        }
        tokio::select! {
            _ = tokio::time::sleep(duration) => {}
            _ = self.handle.woken() => {}
            changed = self.shutdown.changed() => {
                if changed.is_err() || *self.shutdown.borrow() {
                    return Err(SwapError::ShuttingDown);
                }
            }
        }
        if abortable && self.handle.is_aborted() {
            return Err(SwapError::Aborted);
        }
        Ok(())
    }

    /// Run a long adapter call, abandoning it on shutdown or abort.
    ///
    /// `None` when a published secret was observed before the call finished.
    async fn interruptible<T>(
        &mut self,
        fut: impl Future<Output = Result<T, SwapError>>,
    ) -> Result<Option<T>, SwapError> {
        tokio::pin!(fut);
        loop {
            if *self.shutdown.borrow() {
                return Err(SwapError::ShuttingDown);
            }
            if self.handle.is_aborted() {
                return Err(SwapError::Aborted);
            }
            if self.handle.observed_secret().is_some() {
                return Ok(None);
            }
            tokio::select! {
                result = &mut fut => return result.map(Some),
                _ = self.handle.woken() => {}
                changed = self.shutdown.changed() => {
                    if changed.is_err() {
                        return Err(SwapError::ShuttingDown);
                    }
                }
            }
        }
    }

    /// Wait until `leg`'s chain time reaches `target`.
    ///
    /// Bounded on the local clock by the expected wait plus the cancellation
    /// grace, so a halted chain ends in `SuspensionTimeout`.
    async fn wait_for_chain_time(
        &mut self,
        leg: Leg,
        target: u64,
        abortable: bool,
        watch_reveal: bool,
    ) -> Result<Wait, SwapError> {
        let adapter = self.adapter(leg);
        let mut bound = None;
        loop {
            let chain_now = self
                .retry(adapter, "chain_time", move || adapter.chain_time())
                .await?;
            if chain_now >= target {
                return Ok(Wait::Reached);
            }
            let local = self.now();
            let limit = *bound.get_or_insert(
                local + (target - chain_now) + self.inner.config.cancellation_grace_secs,
            );
            if local > limit {
                return Err(SwapError::SuspensionTimeout {
                    what: format!("{} chain time {} on {}", leg, target, adapter.chain_name()),
                });
            }
            let wait = Duration::from_secs(target - chain_now).max(self.inner.config.poll_interval());
            debug!(swap_id = %self.handle.id(), %leg, target, chain_now, "waiting for timelock");
            self.pause(wait, abortable).await?;
            if watch_reveal && self.handle.observed_secret().is_some() {
                return Ok(Wait::RevealObserved);
            }
        }
    }

    // -------------------------------------------------------------------------
    // Helpers
    // -------------------------------------------------------------------------

    async fn retry<T, F, Fut>(
        &self,
        adapter: &dyn ChainAdapter,
        operation: &str,
        op: F,
    ) -> Result<T, SwapError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, SwapError>>,
    {
        let metrics = &self.inner.metrics;
        let chain = adapter.chain_name();
        retry_transient(
            &self.inner.config.retry,
            operation,
            |_, err| {
                metrics.record_retry(chain);
                metrics.update_chain(chain, Err(err.to_string()));
            },
            op,
        )
        .await
    }

    fn adapter(&self, leg: Leg) -> &'a dyn ChainAdapter {
        let family = self.handle.read(|s| s.chain(leg));
        self.inner.adapter(family).as_ref()
    }

    fn escrow(&self, leg: Leg) -> Result<EscrowRef, SwapError> {
        self.handle.read(|s| s.escrow(leg).cloned()).ok_or_else(|| {
            SwapError::IrrecoverableState(format!(
                "{} escrow missing in status {}",
                leg,
                self.handle.status()
            ))
        })
    }

    fn secret(&self) -> Result<SecureSecret, SwapError> {
        self.handle
            .read(|s| s.secret().cloned())
            .or_else(|| self.handle.observed_secret().map(|(_, secret)| secret))
            .ok_or_else(|| SwapError::IrrecoverableState("secret unavailable".into()))
    }

    fn leg_of_error(&self, err: &SwapError) -> Leg {
        let chain = match err {
            SwapError::ContractRejection { chain, .. }
            | SwapError::TransientChain { chain, .. }
            | SwapError::ReferenceExtractionFailed { chain, .. } => chain.as_str(),
            _ => return Leg::Source,
        };
        if self.adapter(Leg::Destination).chain_name() == chain {
            Leg::Destination
        } else {
            Leg::Source
        }
    }

    fn now(&self) -> u64 {
        self.inner.clock.now()
    }

    fn persist(&self) {
        self.inner.persist(self.handle);
    }

    fn record_tx(&self, kind: TxKind, leg: Leg, tx: &TxResult) {
        let now = self.now();
        let note = tx.already_applied.then(|| "already applied on chain".to_string());
        self.handle
            .update(|s| s.record(kind, leg, tx.tx_hash.clone(), now, note));
        self.persist();
    }

    fn transition(&self, next: SwapStatus) -> Result<(), SwapError> {
        let from = self.handle.status();
        let now = self.now();
        self.handle.update(|s| s.transition_to(next, now))?;
        info!(swap_id = %self.handle.id(), %from, to = %next, "swap transition");
        self.persist();
        Ok(())
    }

    /// Move to `Failed`, keeping the secret and escrow references.
    fn escalate(&self, err: SwapError) {
        let reason = FailureReason::from_error(&err);
        let now = self.now();
        error!(
            swap_id = %self.handle.id(),
            status = %self.handle.status(),
            reason = %reason,
            error = %err,
            "swap failed, manual recovery required"
        );
        self.handle.update(|s| s.fail(reason, err.to_string(), now));
        self.persist();
    }

    fn finish(&self) {
        let now = self.now();
        let (status, duration, failure) = self.handle.read(|s| {
            (
                s.status(),
                s.finished_at.unwrap_or(now).saturating_sub(s.created_at),
                s.failure().map(|f| f.reason.clone()),
            )
        });
        self.inner
            .metrics
            .record_terminal(status, duration, failure.as_ref());
        self.inner.registry.archive(&self.handle.id());
        info!(swap_id = %self.handle.id(), %status, duration_secs = duration, "swap finished");
    }
}

/// Whether a pre-reveal error leads to refunds rather than `Failed`.
fn routes_to_cancellation(err: &SwapError) -> bool {
    match err {
        SwapError::Aborted | SwapError::RetriesExhausted { .. } | SwapError::TransientChain { .. } => {
            true
        }
        SwapError::ContractRejection { kind, .. } => !matches!(
            kind,
            ContractRejectionKind::AlreadyCompleted | ContractRejectionKind::InvalidSecret
        ),
        _ => false,
    }
}

fn withdrawal_retryable(err: &SwapError) -> bool {
    err.is_transient()
        || matches!(err, SwapError::RetriesExhausted { .. })
        || err.rejection() == Some(&ContractRejectionKind::WithdrawalWindowNotOpen)
}

fn escrow_params(swap: &Swap, leg: Leg) -> EscrowParams {
    let parties = swap.parties.for_leg(leg);
    let amounts = swap.amounts.for_leg(leg);
    EscrowParams {
        swap_id: swap.id,
        leg,
        salt: escrow_salt(&swap.order_hash, &swap.id, leg),
        maker: parties.maker.clone(),
        taker: parties.taker.clone(),
        token: amounts.token.clone(),
        amount: amounts.amount,
        safety_deposit: amounts.safety_deposit,
        hashlock: *swap.hashlocks.for_leg(leg),
        timelocks: *swap.timelocks.for_leg(leg),
    }
}

fn funding_for(swap: &Swap, leg: Leg) -> Funding {
    let amounts = swap.amounts.for_leg(leg);
    Funding {
        depositor: swap.parties.for_leg(leg).depositor(leg).clone(),
        token: amounts.token.clone(),
        amount: amounts.amount,
        safety_deposit: amounts.safety_deposit,
    }
}
