use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use alloy_primitives::{Address, B256, U256};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::crypto::salt::Salt;
use crate::domain::commitment::Commitment;
use crate::domain::nullifier::Nullifier;
use crate::domain::order::{InstrumentRef, OrderParameters, OrderPhase, OrderState};
use crate::domain::reveal::{RevealGate, RevealStatus};
use crate::domain::secret::PendingSecret;
use crate::error::OrderError;
use crate::ports::ledger::{LedgerError, OrderLedger};
use crate::ports::prover::Prover;
use crate::ports::store::{SecretStore, StoreError};
use crate::ports::{CommitmentInfo, InstrumentStats, TxReceipt};
use crate::prover::ProofGenerator;
use crate::simulation::{self, DryRunReport};

pub const DEFAULT_SUBMISSION_TIMEOUT: Duration = Duration::from_secs(120);

/// A persisted and broadcast commit. Confirm it with `confirm_commit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitTicket {
    pub commitment: Commitment,
    pub nullifier: Nullifier,
    pub tx_hash: B256,
}

/// How a reveal or cancel ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    /// This call's transaction was confirmed.
    Confirmed(TxReceipt),
    /// The ledger already recorded this outcome (an earlier attempt landed
    /// but its receipt was lost). The secret has been removed.
    AlreadyFinal,
}

/// A stored secret as seen from the local store alone.
#[derive(Debug, Clone)]
pub struct PendingOrder {
    pub commitment: Commitment,
    pub params: OrderParameters,
    pub created_at: u64,
    pub escrow_amount: U256,
    /// Gate status measured from the local commit time.
    pub reveal: RevealStatus,
    pub expired: bool,
}

/// What `recover` found after a restart.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    /// Secrets deleted because the ledger already shows a final outcome.
    pub removed: Vec<(Commitment, OrderPhase)>,
    /// Persisted but never seen by the ledger; need `retry_commit`.
    pub needs_commit: Vec<Commitment>,
    /// Committed and still live.
    pub live: Vec<Commitment>,
    /// Never seen by the ledger and already expired; clear with `discard_unsent`.
    pub expired_unsent: Vec<Commitment>,
    /// Left alone because another operation holds them.
    pub busy: Vec<Commitment>,
}

/// Drives orders through commit, reveal and cancel.
///
/// Every write follows the same discipline: the secret is on disk before the
/// commitment is broadcast, and it is deleted only after the ledger confirms
/// the reveal or cancellation. A ledger call that fails or times out leaves
/// local state untouched.
pub struct OrderOrchestrator<L, S, P, C> {
    ledger: L,
    store: S,
    generator: ProofGenerator<P>,
    clock: C,
    trader: Address,
    gate: RevealGate,
    submission_timeout: Duration,
    /// commitment → phase of the operation currently running on it
    in_flight: Mutex<HashMap<Commitment, OrderPhase>>,
}

/// Marks a commitment busy until dropped.
struct InFlight<'a> {
    map: &'a Mutex<HashMap<Commitment, OrderPhase>>,
    commitment: Commitment,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let mut map = self.map.lock().unwrap_or_else(|e| e.into_inner());
        map.remove(&self.commitment);
    }
}

impl<L, S, P, C> OrderOrchestrator<L, S, P, C>
where
    L: OrderLedger,
    S: SecretStore,
    P: Prover + 'static,
    C: Clock,
{
    pub fn new(ledger: L, store: S, prover: P, clock: C, trader: Address) -> Self {
        Self {
            ledger,
            store,
            generator: ProofGenerator::new(prover),
            clock,
            trader,
            gate: RevealGate::default(),
            submission_timeout: DEFAULT_SUBMISSION_TIMEOUT,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_reveal_gate(mut self, gate: RevealGate) -> Self {
        self.gate = gate;
        self
    }

    pub fn with_submission_timeout(mut self, timeout: Duration) -> Self {
        self.submission_timeout = timeout;
        self
    }

    pub fn trader(&self) -> Address {
        self.trader
    }

    pub fn gate(&self) -> &RevealGate {
        &self.gate
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    // ── Writes ──

    /// Commit a new order.
    ///
    /// The secret is persisted before `commitOrder` is broadcast, and the call
    /// returns as soon as the ledger node accepts the transaction. Await the
    /// confirmation with `confirm_commit`. If the broadcast fails the secret
    /// stays, and `SubmissionFailed` carries the commitment so the caller can
    /// `retry_commit` or `recover` later.
    pub async fn submit_commit(
        &self,
        params: OrderParameters,
        escrow: U256,
    ) -> Result<CommitTicket, OrderError> {
        let now = self.clock.now();
        params.validate(now)?;

        let (commitment, secret) =
            PendingSecret::create(params, Salt::random(), self.trader, escrow, now)?;
        let _guard = self.begin(commitment, OrderPhase::Committing)?;

        self.store.put(commitment, &secret).await?;
        debug!("commit {commitment}: secret persisted");

        let tx_hash = self
            .timed(commitment, self.ledger.broadcast_commit(commitment, escrow))
            .await?;
        info!("commit {commitment}: broadcast in tx {tx_hash}");

        Ok(CommitTicket {
            commitment,
            nullifier: secret.nullifier,
            tx_hash,
        })
    }

    /// Wait for a commit broadcast by `submit_commit` to be confirmed.
    ///
    /// A timeout leaves the secret in place; `recover` later tells whether
    /// the commit landed.
    pub async fn confirm_commit(&self, ticket: &CommitTicket) -> Result<TxReceipt, OrderError> {
        let commitment = ticket.commitment;
        let _guard = self.begin(commitment, OrderPhase::Committing)?;

        let tx = self
            .submit(commitment, self.ledger.confirm(ticket.tx_hash))
            .await?;
        info!("commit {commitment}: confirmed in tx {}", tx.tx_hash);
        Ok(tx)
    }

    /// Re-broadcast a stored commitment and wait for its confirmation.
    ///
    /// Returns `Ok(None)` when the ledger already has it (an earlier attempt
    /// landed but its receipt was lost).
    pub async fn retry_commit(&self, commitment: Commitment) -> Result<Option<TxReceipt>, OrderError> {
        let _guard = self.begin(commitment, OrderPhase::Committing)?;
        let secret = self.load(commitment).await?;

        if self.commitment_info(commitment).await?.is_some() {
            info!("commit {commitment}: already on the ledger");
            return Ok(None);
        }

        let now = self.clock.now();
        self.ensure_not_expired(commitment, &secret, now)?;

        let tx_hash = self
            .timed(
                commitment,
                self.ledger.broadcast_commit(commitment, secret.escrow_amount),
            )
            .await?;
        let tx = self.submit(commitment, self.ledger.confirm(tx_hash)).await?;
        info!("commit {commitment}: confirmed on retry in tx {}", tx.tx_hash);
        Ok(Some(tx))
    }

    /// Delete the secret of an order that never reached the ledger and can no
    /// longer be committed because it has expired.
    pub async fn discard_unsent(&self, commitment: Commitment) -> Result<(), OrderError> {
        let _guard = self.begin(commitment, OrderPhase::Committing)?;
        let secret = self.load(commitment).await?;

        if let Some(info) = self.commitment_info(commitment).await? {
            let phase = if info.revealed {
                OrderPhase::Revealed
            } else if info.cancelled {
                OrderPhase::Cancelled
            } else {
                OrderPhase::Committed
            };
            return Err(OrderError::InvalidPhase {
                commitment,
                phase,
                operation: "discard",
            });
        }
        if !secret.params.is_expired(self.clock.now()) {
            return Err(OrderError::InvalidPhase {
                commitment,
                phase: OrderPhase::Committing,
                operation: "discard",
            });
        }

        self.store.remove(commitment).await?;
        info!("discard {commitment}: expired before reaching the ledger, secret removed");
        Ok(())
    }

    pub async fn submit_reveal(&self, commitment: Commitment) -> Result<WriteOutcome, OrderError> {
        self.submit_reveal_with_cancel(commitment, CancellationToken::new())
            .await
    }

    /// Reveal a committed order.
    ///
    /// Proving runs on its own task and stops when `cancel` fires. Expiry is
    /// checked again once the proof exists; a proof for an expired order is
    /// discarded. The secret is deleted only after the ledger confirms.
    pub async fn submit_reveal_with_cancel(
        &self,
        commitment: Commitment,
        cancel: CancellationToken,
    ) -> Result<WriteOutcome, OrderError> {
        let _guard = self.begin(commitment, OrderPhase::Revealing)?;
        let secret = self.load(commitment).await?;

        let info = self.commitment_info(commitment).await?;
        if info.as_ref().is_some_and(|i| i.revealed) {
            return self.finalized(commitment, OrderPhase::Revealed).await;
        }

        let now = self.clock.now();
        self.ensure_not_expired(commitment, &secret, now)?;

        let info = info.ok_or(OrderError::NotCommitted(commitment))?;
        if info.cancelled {
            // Cancelled orders can never be revealed; the secret is dead.
            self.store.remove(commitment).await?;
        }
        self.ensure_live(commitment, &info, "reveal")?;

        let status = self
            .gate
            .can_reveal(secret.created_at.max(info.timestamp), now);
        if !status.allowed {
            return Err(OrderError::TooEarly {
                commitment,
                remaining_secs: status.remaining_secs,
            });
        }

        info!("reveal {commitment}: proving");
        let task = self
            .generator
            .spawn(secret.clone(), commitment, self.trader, cancel.child_token());
        let proof = task
            .join()
            .await
            .map_err(|e| OrderError::from_proof(commitment, e))?;

        if cancel.is_cancelled() {
            return Err(OrderError::ProvingCancelled(commitment));
        }
        let now = self.clock.now();
        if secret.params.is_expired(now) {
            warn!("reveal {commitment}: order expired while proving, discarding proof");
            return Err(OrderError::Expired {
                commitment,
                expiry: secret.params.expiry,
            });
        }

        let tx = self
            .submit(commitment, self.ledger.reveal_order(&proof, &secret.params))
            .await?;
        info!("reveal {commitment}: confirmed in tx {}", tx.tx_hash);

        self.store.remove(commitment).await?;
        Ok(WriteOutcome::Confirmed(tx))
    }

    /// Cancel a committed, unrevealed order and release its escrow.
    pub async fn cancel(&self, commitment: Commitment) -> Result<WriteOutcome, OrderError> {
        let _guard = self.begin(commitment, OrderPhase::Cancelling)?;
        self.load(commitment).await?;

        let info = self.commitment_info(commitment).await?.ok_or(OrderError::InvalidPhase {
            commitment,
            phase: OrderPhase::Committing,
            operation: "cancel",
        })?;
        if info.cancelled {
            return self.finalized(commitment, OrderPhase::Cancelled).await;
        }
        if info.revealed {
            // Revealed orders can no longer be cancelled here; the secret is spent.
            self.store.remove(commitment).await?;
        }
        self.ensure_live(commitment, &info, "cancel")?;

        let tx = self
            .submit(commitment, self.ledger.cancel_commitment(commitment))
            .await?;
        info!("cancel {commitment}: confirmed in tx {}", tx.tx_hash);

        self.store.remove(commitment).await?;
        Ok(WriteOutcome::Confirmed(tx))
    }

    /// Reconcile the local store with the ledger after a restart.
    pub async fn recover(&self) -> Result<RecoveryReport, OrderError> {
        let mut report = RecoveryReport::default();

        for commitment in self.store.list_pending().await? {
            let Ok(_guard) = self.begin(commitment, OrderPhase::Committed) else {
                report.busy.push(commitment);
                continue;
            };

            match self.commitment_info(commitment).await? {
                None => {
                    let expired = match self.store.get(commitment).await {
                        Ok(Some(secret)) => secret.params.is_expired(self.clock.now()),
                        Ok(None) => continue,
                        Err(e) => {
                            warn!("recover {commitment}: unreadable secret: {e}");
                            false
                        }
                    };
                    if expired {
                        report.expired_unsent.push(commitment);
                    } else {
                        report.needs_commit.push(commitment);
                    }
                }
                Some(info) if info.revealed || info.cancelled => {
                    let phase = if info.revealed {
                        OrderPhase::Revealed
                    } else {
                        OrderPhase::Cancelled
                    };
                    self.store.remove(commitment).await?;
                    info!("recover {commitment}: ledger shows {phase:?}, secret removed");
                    report.removed.push((commitment, phase));
                }
                Some(_) => report.live.push(commitment),
            }
        }

        info!(
            "recover: {} removed, {} awaiting commit, {} expired unsent, {} live",
            report.removed.len(),
            report.needs_commit.len(),
            report.expired_unsent.len(),
            report.live.len()
        );
        Ok(report)
    }

    // ── Queries ──

    pub async fn order_phase(&self, commitment: Commitment) -> Result<OrderPhase, OrderError> {
        if let Some(phase) = self.in_flight_phase(commitment) {
            return Ok(phase);
        }

        let secret = self.store.get(commitment).await?;
        let info = self.commitment_info(commitment).await?;
        let now = self.clock.now();

        let phase = match (secret, info) {
            (_, Some(info)) if info.revealed => OrderPhase::Revealed,
            (_, Some(info)) if info.cancelled => OrderPhase::Cancelled,
            (Some(secret), _) if secret.params.is_expired(now) => OrderPhase::Expired,
            (_, Some(_)) => OrderPhase::Committed,
            // persisted, broadcast not confirmed
            (Some(_), None) => OrderPhase::Committing,
            (None, None) => OrderPhase::Uncommitted,
        };
        Ok(phase)
    }

    /// Gate status for a stored order, measured from the later of the local
    /// and on-chain commit times.
    pub async fn reveal_status(&self, commitment: Commitment) -> Result<RevealStatus, OrderError> {
        let secret = self.load(commitment).await?;
        let commit_ts = match self.commitment_info(commitment).await? {
            Some(info) => secret.created_at.max(info.timestamp),
            None => secret.created_at,
        };
        Ok(self.gate.can_reveal(commit_ts, self.clock.now()))
    }

    /// Every order with a stored secret. Reads the store only.
    pub async fn pending_orders(&self) -> Result<Vec<PendingOrder>, OrderError> {
        let now = self.clock.now();
        let mut orders = Vec::new();

        for commitment in self.store.list_pending().await? {
            let secret = match self.store.get(commitment).await {
                Ok(Some(secret)) => secret,
                Ok(None) => continue,
                Err(e @ (StoreError::Malformed { .. } | StoreError::Serialization(_))) => {
                    warn!("pending {commitment}: skipping unreadable secret: {e}");
                    continue;
                }
                Err(e) => return Err(e.into()),
            };
            orders.push(PendingOrder {
                commitment,
                reveal: self.gate.can_reveal(secret.created_at, now),
                expired: secret.params.is_expired(now),
                created_at: secret.created_at,
                escrow_amount: secret.escrow_amount,
                params: secret.params,
            });
        }
        Ok(orders)
    }

    pub async fn ledger_order_state(&self, order_hash: B256) -> Result<Option<OrderState>, OrderError> {
        self.ledger
            .order_state(order_hash)
            .await
            .map_err(OrderError::Ledger)
    }

    /// Live orders the ledger attributes to this trader.
    pub async fn active_order_count(&self) -> Result<u64, OrderError> {
        self.ledger
            .active_order_count(self.trader)
            .await
            .map_err(OrderError::Ledger)
    }

    pub async fn instrument_stats(&self, instrument: &InstrumentRef) -> Result<InstrumentStats, OrderError> {
        self.ledger
            .instrument_stats(instrument)
            .await
            .map_err(OrderError::Ledger)
    }

    pub async fn nullifier_spent(&self, commitment: Commitment) -> Result<bool, OrderError> {
        let secret = self.load(commitment).await?;
        self.ledger
            .is_nullifier_spent(secret.nullifier)
            .await
            .map_err(OrderError::Ledger)
    }

    /// Run every pre-proving check of a reveal without proving or submitting.
    pub async fn dry_run_reveal(&self, commitment: Commitment) -> Result<DryRunReport, OrderError> {
        let secret = self.load(commitment).await?;
        let info = self.commitment_info(commitment).await?;
        let commit_ts = info
            .as_ref()
            .map_or(secret.created_at, |i| secret.created_at.max(i.timestamp));

        let mut report = simulation::dry_run(
            &secret,
            commitment,
            self.trader,
            &self.gate,
            commit_ts,
            self.clock.now(),
        );
        report.committed_on_ledger = Some(info.is_some_and(|i| i.is_live()));
        Ok(report)
    }

    // ── Internals ──

    fn begin(&self, commitment: Commitment, phase: OrderPhase) -> Result<InFlight<'_>, OrderError> {
        let mut map = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        if map.contains_key(&commitment) {
            return Err(OrderError::Busy(commitment));
        }
        map.insert(commitment, phase);
        Ok(InFlight {
            map: &self.in_flight,
            commitment,
        })
    }

    fn in_flight_phase(&self, commitment: Commitment) -> Option<OrderPhase> {
        let map = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        map.get(&commitment).copied()
    }

    async fn load(&self, commitment: Commitment) -> Result<PendingSecret, OrderError> {
        self.store
            .get(commitment)
            .await?
            .ok_or(OrderError::NotFound(commitment))
    }

    async fn commitment_info(&self, commitment: Commitment) -> Result<Option<CommitmentInfo>, OrderError> {
        self.ledger
            .commitment_info(commitment)
            .await
            .map_err(OrderError::Ledger)
    }

    fn ensure_not_expired(
        &self,
        commitment: Commitment,
        secret: &PendingSecret,
        now: u64,
    ) -> Result<(), OrderError> {
        if secret.params.is_expired(now) {
            return Err(OrderError::Expired {
                commitment,
                expiry: secret.params.expiry,
            });
        }
        Ok(())
    }

    fn ensure_live(
        &self,
        commitment: Commitment,
        info: &CommitmentInfo,
        operation: &'static str,
    ) -> Result<(), OrderError> {
        let phase = if info.revealed {
            OrderPhase::Revealed
        } else if info.cancelled {
            OrderPhase::Cancelled
        } else {
            return Ok(());
        };
        Err(OrderError::InvalidPhase {
            commitment,
            phase,
            operation,
        })
    }

    /// The ledger already shows the outcome this operation was after: drop the
    /// secret and report it.
    async fn finalized(&self, commitment: Commitment, phase: OrderPhase) -> Result<WriteOutcome, OrderError> {
        self.store.remove(commitment).await?;
        info!("{commitment}: ledger already shows {phase:?}, secret removed");
        Ok(WriteOutcome::AlreadyFinal)
    }

    /// Await a ledger call under the submission timeout.
    async fn timed<T, F>(&self, commitment: Commitment, call: F) -> Result<T, OrderError>
    where
        F: Future<Output = Result<T, LedgerError>>,
    {
        match tokio::time::timeout(self.submission_timeout, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(source)) => Err(self.submission_failed(commitment, source)),
            Err(_) => Err(self.submission_failed(
                commitment,
                LedgerError::Timeout(self.submission_timeout),
            )),
        }
    }

    /// Await a ledger write under the submission timeout and require a
    /// successful receipt.
    async fn submit<F>(&self, commitment: Commitment, call: F) -> Result<TxReceipt, OrderError>
    where
        F: Future<Output = Result<TxReceipt, LedgerError>>,
    {
        let receipt = self.timed(commitment, call).await?;
        if !receipt.success {
            let source = LedgerError::Reverted(format!("tx {}", receipt.tx_hash));
            return Err(self.submission_failed(commitment, source));
        }
        Ok(receipt)
    }

    fn submission_failed(&self, commitment: Commitment, source: LedgerError) -> OrderError {
        warn!("submission for {commitment} failed: {source}");
        OrderError::SubmissionFailed { commitment, source }
    }
}
