//! End-to-end tests of the commit-reveal workflow against the in-memory
//! ledger, a durable file store, and a manually advanced clock.
//!
//! ```bash
//! cargo test --test orchestrator
//! ```

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use alloy_primitives::{Address, Bytes, U256};
use tokio_util::sync::CancellationToken;

use dark_pool::adapters::file_store::FileSecretStore;
use dark_pool::adapters::mock_ledger::{Fault, MockLedger};
use dark_pool::clock::ManualClock;
use dark_pool::domain::commitment::{Commitment, derive_nullifier};
use dark_pool::domain::nullifier::Nullifier;
use dark_pool::domain::order::{InstrumentRef, OrderKind, OrderParameters, OrderPhase, Side};
use dark_pool::domain::reveal::RevealGate;
use dark_pool::domain::secret::PendingSecret;
use dark_pool::error::OrderError;
use dark_pool::orchestrator::{OrderOrchestrator, WriteOutcome};
use dark_pool::ports::ledger::OrderLedger;
use dark_pool::ports::prover::{Prover, ProverError};
use dark_pool::ports::store::SecretStore;
use dark_pool::ports::{RevealProof, RevealPublicInputs, RevealWitness};

const T0: u64 = 1_700_000_000;
const DELAY: u64 = 1_800;

/// Proves by echoing the witness public inputs. Optionally slow, and
/// optionally advances the clock while "proving".
#[derive(Clone, Default)]
struct TestProver {
    latency: Duration,
    advance_clock: Option<(ManualClock, u64)>,
    calls: Arc<AtomicUsize>,
}

impl Prover for TestProver {
    async fn prove_reveal(&self, witness: &RevealWitness) -> Result<RevealProof, ProverError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if let Some((clock, secs)) = &self.advance_clock {
            clock.advance(*secs);
        }
        Ok(RevealProof::new(
            Bytes::from(vec![0x5A; 128]),
            RevealPublicInputs {
                commitment: Commitment(witness.commitment),
                nullifier: Nullifier(witness.nullifier),
            },
        ))
    }
}

type Orchestrator = OrderOrchestrator<Arc<MockLedger>, FileSecretStore, TestProver, ManualClock>;

fn trader() -> Address {
    Address::repeat_byte(0xC0)
}

fn new_ledger(clock: &ManualClock) -> Arc<MockLedger> {
    Arc::new(MockLedger::new(
        Arc::new(clock.clone()),
        Duration::from_secs(DELAY),
        trader(),
    ))
}

async fn orchestrator(
    ledger: Arc<MockLedger>,
    dir: &Path,
    prover: TestProver,
    clock: &ManualClock,
) -> Orchestrator {
    let store = FileSecretStore::open(dir).await.unwrap();
    OrderOrchestrator::new(ledger, store, prover, clock.clone(), trader())
        .with_reveal_gate(RevealGate::new(Duration::from_secs(DELAY)))
        .with_submission_timeout(Duration::from_secs(60))
}

/// Limit buy, 1000 @ 500, live for an hour.
fn limit_buy() -> OrderParameters {
    OrderParameters {
        instrument: InstrumentRef::new(Address::repeat_byte(0xAA), U256::ZERO),
        kind: OrderKind::Limit,
        side: Side::Buy,
        quantity: U256::from(1000),
        limit_price: U256::from(500),
        minimum_fill: U256::ZERO,
        expiry: T0 + 3600,
    }
}

#[tokio::test]
async fn test_limit_buy_commit_wait_reveal() {
    let dir = tempfile::tempdir().unwrap();
    let clock = ManualClock::new(T0);
    let ledger = new_ledger(&clock);
    let orch = orchestrator(ledger.clone(), dir.path(), TestProver::default(), &clock).await;

    let ticket = orch.submit_commit(limit_buy(), U256::ZERO).await.unwrap();
    let c1 = ticket.commitment;
    assert!(orch.confirm_commit(&ticket).await.unwrap().success);

    let stored = orch.store().get(c1).await.unwrap().unwrap();
    let n1 = derive_nullifier(&stored.salt, trader()).unwrap();
    assert_eq!(ticket.nullifier, n1);

    clock.set(T0 + 10);
    let err = orch.submit_reveal(c1).await.unwrap_err();
    assert!(matches!(err, OrderError::TooEarly { remaining_secs: 1790, .. }));
    assert!(err.is_retryable());
    assert!(ledger.reveals().await.is_empty());

    clock.set(T0 + 1801);
    let WriteOutcome::Confirmed(tx) = orch.submit_reveal(c1).await.unwrap() else {
        panic!("expected a confirmed reveal");
    };
    assert!(tx.success);

    let reveals = ledger.reveals().await;
    assert_eq!(reveals.len(), 1);
    assert_eq!(reveals[0].public_inputs.to_array(), [c1.0, n1.0]);
    assert_eq!(reveals[0].params, limit_buy());

    assert!(orch.store().get(c1).await.unwrap().is_none());
    assert!(!dir.path().join(format!("{}.json", c1.to_hex())).exists());
    assert!(ledger.is_nullifier_spent(n1).await.unwrap());
    assert_eq!(orch.active_order_count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_reveal_delay_boundary() {
    let dir = tempfile::tempdir().unwrap();
    let clock = ManualClock::new(T0);
    let orch = orchestrator(new_ledger(&clock), dir.path(), TestProver::default(), &clock).await;

    let c = orch.submit_commit(limit_buy(), U256::ZERO).await.unwrap().commitment;

    clock.set(T0 + DELAY - 1);
    assert!(matches!(
        orch.submit_reveal(c).await,
        Err(OrderError::TooEarly { remaining_secs: 1, .. })
    ));

    clock.set(T0 + DELAY);
    orch.submit_reveal(c).await.unwrap();
}

#[tokio::test]
async fn test_secret_survives_crash_after_lost_commit_receipt() {
    let dir = tempfile::tempdir().unwrap();
    let clock = ManualClock::new(T0);
    let ledger = new_ledger(&clock);

    let commitment = {
        let orch = orchestrator(ledger.clone(), dir.path(), TestProver::default(), &clock).await;
        ledger.inject(Fault::DropReceipt).await;

        let ticket = orch.submit_commit(limit_buy(), U256::from(10)).await.unwrap();
        let err = orch.confirm_commit(&ticket).await.unwrap_err();
        assert!(matches!(
            err,
            OrderError::SubmissionFailed { commitment, .. } if commitment == ticket.commitment
        ));
        ticket.commitment
        // client process goes away here
    };

    let orch = orchestrator(ledger.clone(), dir.path(), TestProver::default(), &clock).await;
    let report = orch.recover().await.unwrap();
    assert_eq!(report.live, vec![commitment]);
    assert!(report.needs_commit.is_empty());

    clock.advance(DELAY);
    orch.submit_reveal(commitment).await.unwrap();
    assert!(orch.store().list_pending().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_unsent_commit_is_retried_after_restart() {
    let dir = tempfile::tempdir().unwrap();
    let clock = ManualClock::new(T0);
    let ledger = new_ledger(&clock);

    {
        let orch = orchestrator(ledger.clone(), dir.path(), TestProver::default(), &clock).await;
        ledger.inject(Fault::Reject("connection reset".into())).await;
        let err = orch.submit_commit(limit_buy(), U256::ZERO).await.unwrap_err();
        assert!(err.is_retryable());
    }

    let orch = orchestrator(ledger.clone(), dir.path(), TestProver::default(), &clock).await;
    let report = orch.recover().await.unwrap();
    assert_eq!(report.needs_commit.len(), 1);
    let commitment = report.needs_commit[0];
    assert_eq!(orch.order_phase(commitment).await.unwrap(), OrderPhase::Committing);

    clock.advance(5);
    orch.retry_commit(commitment).await.unwrap();
    let info = ledger.commitment_info(commitment).await.unwrap().unwrap();
    assert_eq!(info.timestamp, T0 + 5);
}

#[tokio::test]
async fn test_tampered_secret_is_detected() {
    let dir = tempfile::tempdir().unwrap();
    let clock = ManualClock::new(T0);
    let prover = TestProver::default();
    let calls = prover.calls.clone();
    let orch = orchestrator(new_ledger(&clock), dir.path(), prover, &clock).await;

    let c = orch.submit_commit(limit_buy(), U256::ZERO).await.unwrap().commitment;

    let path = orch.store().path_for(c);
    let mut secret: PendingSecret =
        serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
    secret.params.quantity = U256::from(1001);
    std::fs::write(&path, serde_json::to_vec_pretty(&secret).unwrap()).unwrap();

    clock.advance(DELAY);
    let err = orch.submit_reveal(c).await.unwrap_err();
    assert!(matches!(err, OrderError::SecretCorrupted { .. }));
    assert!(err.is_integrity_failure());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    // kept for inspection
    assert!(orch.store().get(c).await.unwrap().is_some());
}

#[tokio::test]
async fn test_unreadable_secret_is_integrity_failure() {
    let dir = tempfile::tempdir().unwrap();
    let clock = ManualClock::new(T0);
    let orch = orchestrator(new_ledger(&clock), dir.path(), TestProver::default(), &clock).await;

    let c = orch.submit_commit(limit_buy(), U256::ZERO).await.unwrap().commitment;
    std::fs::write(orch.store().path_for(c), b"{\"params\":").unwrap();

    clock.advance(DELAY);
    let err = orch.submit_reveal(c).await.unwrap_err();
    assert!(err.is_integrity_failure());
    assert!(orch.pending_orders().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_cancellation_is_final() {
    let dir = tempfile::tempdir().unwrap();
    let clock = ManualClock::new(T0);
    let ledger = new_ledger(&clock);
    let orch = orchestrator(ledger.clone(), dir.path(), TestProver::default(), &clock).await;

    let c = orch.submit_commit(limit_buy(), U256::from(42)).await.unwrap().commitment;
    orch.cancel(c).await.unwrap();

    assert!(ledger.commitment_info(c).await.unwrap().unwrap().cancelled);
    clock.advance(DELAY);
    assert!(matches!(orch.submit_reveal(c).await, Err(OrderError::NotFound(_))));
    assert!(ledger.reveals().await.is_empty());
}

#[tokio::test]
async fn test_cancel_after_lost_reveal_receipt_clears_secret() {
    let dir = tempfile::tempdir().unwrap();
    let clock = ManualClock::new(T0);
    let ledger = new_ledger(&clock);
    let orch = orchestrator(ledger.clone(), dir.path(), TestProver::default(), &clock).await;

    let c = orch.submit_commit(limit_buy(), U256::ZERO).await.unwrap().commitment;
    clock.advance(DELAY);
    // reveal lands but the receipt is lost, so the secret stays
    ledger.inject(Fault::DropReceipt).await;
    assert!(orch.submit_reveal(c).await.is_err());
    assert!(orch.store().get(c).await.unwrap().is_some());

    let err = orch.cancel(c).await.unwrap_err();
    assert!(matches!(
        err,
        OrderError::InvalidPhase {
            phase: OrderPhase::Revealed,
            ..
        }
    ));
    assert!(orch.store().get(c).await.unwrap().is_none());
    assert_eq!(orch.order_phase(c).await.unwrap(), OrderPhase::Revealed);
}

#[tokio::test]
async fn test_reveal_after_lost_cancel_receipt_clears_secret() {
    let dir = tempfile::tempdir().unwrap();
    let clock = ManualClock::new(T0);
    let ledger = new_ledger(&clock);
    let orch = orchestrator(ledger.clone(), dir.path(), TestProver::default(), &clock).await;

    let c = orch.submit_commit(limit_buy(), U256::from(42)).await.unwrap().commitment;
    ledger.inject(Fault::DropReceipt).await;
    assert!(orch.cancel(c).await.is_err());

    clock.advance(DELAY);
    assert!(matches!(
        orch.submit_reveal(c).await,
        Err(OrderError::InvalidPhase {
            phase: OrderPhase::Cancelled,
            ..
        })
    ));
    assert!(orch.store().list_pending().await.unwrap().is_empty());
    assert!(ledger.reveals().await.is_empty());
}

#[tokio::test]
async fn test_retried_cancel_after_lost_receipt_is_already_final() {
    let dir = tempfile::tempdir().unwrap();
    let clock = ManualClock::new(T0);
    let ledger = new_ledger(&clock);
    let orch = orchestrator(ledger.clone(), dir.path(), TestProver::default(), &clock).await;

    let c = orch.submit_commit(limit_buy(), U256::from(42)).await.unwrap().commitment;
    ledger.inject(Fault::DropReceipt).await;
    assert!(orch.cancel(c).await.is_err());

    assert_eq!(orch.cancel(c).await.unwrap(), WriteOutcome::AlreadyFinal);
    assert!(orch.store().get(c).await.unwrap().is_none());
}

#[tokio::test]
async fn test_failed_reveal_submission_keeps_secret() {
    let dir = tempfile::tempdir().unwrap();
    let clock = ManualClock::new(T0);
    let ledger = new_ledger(&clock);
    let orch = orchestrator(ledger.clone(), dir.path(), TestProver::default(), &clock).await;

    let c = orch.submit_commit(limit_buy(), U256::ZERO).await.unwrap().commitment;
    clock.advance(DELAY);

    ledger.inject(Fault::Reject("gas price spike".into())).await;
    let err = orch.submit_reveal(c).await.unwrap_err();
    assert!(matches!(err, OrderError::SubmissionFailed { commitment, .. } if commitment == c));
    assert!(orch.store().get(c).await.unwrap().is_some());

    orch.submit_reveal(c).await.unwrap();
    assert!(orch.store().get(c).await.unwrap().is_none());
}

#[tokio::test]
async fn test_expired_order_is_not_revealed() {
    let dir = tempfile::tempdir().unwrap();
    let clock = ManualClock::new(T0);
    let orch = orchestrator(new_ledger(&clock), dir.path(), TestProver::default(), &clock).await;

    let mut params = limit_buy();
    params.expiry = T0 + DELAY;
    let c = orch.submit_commit(params, U256::ZERO).await.unwrap().commitment;

    clock.advance(DELAY);
    assert!(matches!(orch.submit_reveal(c).await, Err(OrderError::Expired { .. })));
    assert_eq!(orch.order_phase(c).await.unwrap(), OrderPhase::Expired);
    // escrow can still be recovered
    orch.cancel(c).await.unwrap();
}

#[tokio::test]
async fn test_order_expiring_during_proving_is_discarded() {
    let dir = tempfile::tempdir().unwrap();
    let clock = ManualClock::new(T0);
    let ledger = new_ledger(&clock);
    let prover = TestProver {
        advance_clock: Some((clock.clone(), 600)),
        ..TestProver::default()
    };
    let orch = orchestrator(ledger.clone(), dir.path(), prover, &clock).await;

    let mut params = limit_buy();
    params.expiry = T0 + DELAY + 300;
    let c = orch.submit_commit(params, U256::ZERO).await.unwrap().commitment;

    clock.advance(DELAY);
    assert!(matches!(orch.submit_reveal(c).await, Err(OrderError::Expired { .. })));
    assert!(ledger.reveals().await.is_empty());
    assert!(orch.store().get(c).await.unwrap().is_some());
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_proving_submits_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let clock = ManualClock::new(T0);
    let ledger = new_ledger(&clock);
    let prover = TestProver {
        latency: Duration::from_secs(600),
        ..TestProver::default()
    };
    let orch = orchestrator(ledger.clone(), dir.path(), prover, &clock).await;

    let c = orch.submit_commit(limit_buy(), U256::ZERO).await.unwrap().commitment;
    clock.advance(DELAY);

    let token = CancellationToken::new();
    let canceller = {
        let token = token.clone();
        async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            token.cancel();
        }
    };
    let (result, ()) = tokio::join!(orch.submit_reveal_with_cancel(c, token), canceller);

    assert!(matches!(result, Err(OrderError::ProvingCancelled(_))));
    assert!(ledger.reveals().await.is_empty());
    assert!(orch.store().get(c).await.unwrap().is_some());
}

#[tokio::test(start_paused = true)]
async fn test_second_reveal_while_proving_is_busy() {
    let dir = tempfile::tempdir().unwrap();
    let clock = ManualClock::new(T0);
    let prover = TestProver {
        latency: Duration::from_secs(30),
        ..TestProver::default()
    };
    let orch = orchestrator(new_ledger(&clock), dir.path(), prover, &clock).await;

    let c = orch.submit_commit(limit_buy(), U256::ZERO).await.unwrap().commitment;
    clock.advance(DELAY);

    let second = async {
        tokio::time::sleep(Duration::from_secs(1)).await;
        let phase = orch.order_phase(c).await.unwrap();
        (phase, orch.submit_reveal(c).await)
    };
    let (first, (phase, second)) = tokio::join!(orch.submit_reveal(c), second);

    assert!(first.is_ok());
    assert_eq!(phase, OrderPhase::Revealing);
    assert!(matches!(second, Err(OrderError::Busy(_))));
}

#[tokio::test]
async fn test_independent_orders_proceed_concurrently() {
    let dir = tempfile::tempdir().unwrap();
    let clock = ManualClock::new(T0);
    let ledger = new_ledger(&clock);
    let orch = Arc::new(orchestrator(ledger.clone(), dir.path(), TestProver::default(), &clock).await);

    let mut handles = Vec::new();
    for i in 0..8u64 {
        let orch = orch.clone();
        handles.push(tokio::spawn(async move {
            let mut params = limit_buy();
            params.quantity = U256::from(100 + i);
            orch.submit_commit(params, U256::ZERO).await
        }));
    }
    let mut commitments = Vec::new();
    for handle in handles {
        commitments.push(handle.await.unwrap().unwrap().commitment);
    }

    clock.advance(DELAY);
    let reveals = commitments.iter().map(|c| {
        let orch = orch.clone();
        let c = *c;
        tokio::spawn(async move { orch.submit_reveal(c).await })
    });
    for handle in reveals.collect::<Vec<_>>() {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(ledger.reveals().await.len(), 8);
    assert!(orch.pending_orders().await.unwrap().is_empty());
}
