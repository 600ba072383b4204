use alloy_primitives::{Address, B256, U256};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use crate::clock::Clock;
use crate::domain::commitment::Commitment;
use crate::domain::nullifier::Nullifier;
use crate::domain::order::{InstrumentRef, OrderParameters, OrderState};
use crate::ports::ledger::{LedgerError, OrderLedger};
use crate::ports::{CommitmentInfo, InstrumentStats, RevealProof, RevealPublicInputs, TxReceipt};

/// Injected failure for the next write call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fault {
    /// The transaction never lands.
    Reject(String),
    /// The transaction lands, but the confirmation is lost (the caller sees a timeout).
    /// For a commit, the broadcast succeeds and `confirm` times out.
    DropReceipt,
}

/// A reveal accepted by the mock ledger.
#[derive(Debug, Clone)]
pub struct RecordedReveal {
    pub public_inputs: RevealPublicInputs,
    pub params: OrderParameters,
    pub proof_len: usize,
}

#[derive(Debug, Clone)]
struct OrderRecord {
    trader: Address,
    instrument: InstrumentRef,
    quantity: U256,
    state: OrderState,
}

#[derive(Default)]
struct LedgerState {
    commitments: HashMap<Commitment, CommitmentInfo>,
    nullifiers: HashSet<Nullifier>,
    orders: HashMap<B256, OrderRecord>,
    reveals: Vec<RecordedReveal>,
    /// Broadcast commits by tx hash, awaiting `confirm`.
    receipts: HashMap<B256, TxReceipt>,
    lost_receipts: HashSet<B256>,
    tx_nonce: u64,
}

impl LedgerState {
    fn next_receipt(&mut self) -> TxReceipt {
        self.tx_nonce += 1;
        TxReceipt {
            tx_hash: B256::from(U256::from(self.tx_nonce)),
            success: true,
        }
    }
}

/// In-memory dark-pool ledger for tests and local runs.
///
/// Enforces what the contract enforces: commitments are unique, reveals wait
/// out the delay, nullifiers are single-use, expired orders are rejected.
/// Proof bytes are not verified.
pub struct MockLedger {
    clock: Arc<dyn Clock>,
    reveal_delay: u64,
    sender: Address,
    state: Mutex<LedgerState>,
    faults: Mutex<VecDeque<Fault>>,
    write_latency: Mutex<Duration>,
}

impl MockLedger {
    /// `sender` is the account every write is attributed to.
    pub fn new(clock: Arc<dyn Clock>, reveal_delay: Duration, sender: Address) -> Self {
        Self {
            clock,
            reveal_delay: reveal_delay.as_secs(),
            sender,
            state: Mutex::new(LedgerState::default()),
            faults: Mutex::new(VecDeque::new()),
            write_latency: Mutex::new(Duration::ZERO),
        }
    }

    /// Queue a fault for the next write call.
    pub async fn inject(&self, fault: Fault) {
        self.faults.lock().await.push_back(fault);
    }

    /// Delay every write by `latency` before it is applied.
    pub async fn set_write_latency(&self, latency: Duration) {
        *self.write_latency.lock().await = latency;
    }

    /// Move a revealed order to `state` (simulates matching activity).
    pub async fn set_order_state(&self, order_hash: B256, state: OrderState) -> Result<(), LedgerError> {
        let mut ledger = self.state.lock().await;
        let order = ledger
            .orders
            .get_mut(&order_hash)
            .ok_or_else(|| LedgerError::Reverted(format!("unknown order {order_hash}")))?;
        if !order.state.can_transition_to(state) {
            return Err(LedgerError::Reverted(format!(
                "illegal transition {:?} -> {:?}",
                order.state, state
            )));
        }
        order.state = state;
        Ok(())
    }

    pub async fn reveals(&self) -> Vec<RecordedReveal> {
        self.state.lock().await.reveals.clone()
    }

    /// Every commitment the ledger has recorded.
    pub async fn commitments(&self) -> Vec<Commitment> {
        self.state.lock().await.commitments.keys().copied().collect()
    }

    async fn before_write(&self) -> Option<Fault> {
        let latency = *self.write_latency.lock().await;
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        self.faults.lock().await.pop_front()
    }

    fn finish(fault: Option<Fault>, receipt: TxReceipt) -> Result<TxReceipt, LedgerError> {
        match fault {
            Some(Fault::DropReceipt) => Err(LedgerError::Timeout(Duration::ZERO)),
            _ => Ok(receipt),
        }
    }
}

impl OrderLedger for MockLedger {
    async fn broadcast_commit(&self, commitment: Commitment, escrow: U256) -> Result<B256, LedgerError> {
        let fault = self.faults.lock().await.pop_front();
        if let Some(Fault::Reject(reason)) = fault {
            return Err(LedgerError::TransactionFailed(reason));
        }

        let mut ledger = self.state.lock().await;
        if ledger.commitments.contains_key(&commitment) {
            return Err(LedgerError::Reverted("commitment already exists".into()));
        }
        ledger.commitments.insert(
            commitment,
            CommitmentInfo {
                trader: self.sender,
                timestamp: self.clock.now(),
                escrow,
                revealed: false,
                cancelled: false,
            },
        );
        let receipt = ledger.next_receipt();
        if fault == Some(Fault::DropReceipt) {
            ledger.lost_receipts.insert(receipt.tx_hash);
        }
        ledger.receipts.insert(receipt.tx_hash, receipt.clone());
        Ok(receipt.tx_hash)
    }

    async fn confirm(&self, tx_hash: B256) -> Result<TxReceipt, LedgerError> {
        let latency = *self.write_latency.lock().await;
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        let ledger = self.state.lock().await;
        if ledger.lost_receipts.contains(&tx_hash) {
            return Err(LedgerError::Timeout(Duration::ZERO));
        }
        ledger
            .receipts
            .get(&tx_hash)
            .cloned()
            .ok_or_else(|| LedgerError::Rpc(format!("unknown transaction {tx_hash}")))
    }

    async fn reveal_order(&self, proof: &RevealProof, params: &OrderParameters) -> Result<TxReceipt, LedgerError> {
        let fault = self.before_write().await;
        if let Some(Fault::Reject(reason)) = fault {
            return Err(LedgerError::TransactionFailed(reason));
        }

        let now = self.clock.now();
        let RevealPublicInputs {
            commitment,
            nullifier,
        } = proof.public_inputs;

        let mut ledger = self.state.lock().await;
        let info = ledger
            .commitments
            .get(&commitment)
            .cloned()
            .ok_or_else(|| LedgerError::Reverted("unknown commitment".into()))?;
        if !info.is_live() {
            return Err(LedgerError::Reverted("commitment not live".into()));
        }
        if info.trader != self.sender {
            return Err(LedgerError::Reverted("not the committer".into()));
        }
        if now < info.timestamp.saturating_add(self.reveal_delay) {
            return Err(LedgerError::Reverted("reveal delay not elapsed".into()));
        }
        if now >= params.expiry {
            return Err(LedgerError::Reverted("order expired".into()));
        }
        if ledger.nullifiers.contains(&nullifier) {
            return Err(LedgerError::Reverted("nullifier already used".into()));
        }

        ledger.nullifiers.insert(nullifier);
        if let Some(entry) = ledger.commitments.get_mut(&commitment) {
            entry.revealed = true;
        }
        ledger.orders.insert(
            commitment.0,
            OrderRecord {
                trader: info.trader,
                instrument: params.instrument,
                quantity: params.quantity,
                state: OrderState::Pending,
            },
        );
        ledger.reveals.push(RecordedReveal {
            public_inputs: proof.public_inputs,
            params: params.clone(),
            proof_len: proof.proof.len(),
        });
        let receipt = ledger.next_receipt();
        Self::finish(fault, receipt)
    }

    async fn cancel_commitment(&self, commitment: Commitment) -> Result<TxReceipt, LedgerError> {
        let fault = self.before_write().await;
        if let Some(Fault::Reject(reason)) = fault {
            return Err(LedgerError::TransactionFailed(reason));
        }

        let mut ledger = self.state.lock().await;
        let entry = ledger
            .commitments
            .get_mut(&commitment)
            .ok_or_else(|| LedgerError::Reverted("unknown commitment".into()))?;
        if !entry.is_live() {
            return Err(LedgerError::Reverted("commitment not live".into()));
        }
        if entry.trader != self.sender {
            return Err(LedgerError::Reverted("not the committer".into()));
        }
        entry.cancelled = true;
        let receipt = ledger.next_receipt();
        Self::finish(fault, receipt)
    }

    async fn commitment_info(&self, commitment: Commitment) -> Result<Option<CommitmentInfo>, LedgerError> {
        Ok(self.state.lock().await.commitments.get(&commitment).cloned())
    }

    async fn order_state(&self, order_hash: B256) -> Result<Option<OrderState>, LedgerError> {
        Ok(self
            .state
            .lock()
            .await
            .orders
            .get(&order_hash)
            .map(|order| order.state))
    }

    async fn is_nullifier_spent(&self, nullifier: Nullifier) -> Result<bool, LedgerError> {
        Ok(self.state.lock().await.nullifiers.contains(&nullifier))
    }

    async fn active_order_count(&self, trader: Address) -> Result<u64, LedgerError> {
        let ledger = self.state.lock().await;
        let count = ledger
            .orders
            .values()
            .filter(|order| order.trader == trader && !order.state.is_terminal())
            .count();
        Ok(count as u64)
    }

    async fn instrument_stats(&self, instrument: &InstrumentRef) -> Result<InstrumentStats, LedgerError> {
        let ledger = self.state.lock().await;
        let mut stats = InstrumentStats::default();
        for order in ledger.orders.values().filter(|o| &o.instrument == instrument) {
            stats.total_orders += 1;
            if !order.state.is_terminal() {
                stats.active_orders += 1;
            }
            if order.state == OrderState::Filled {
                stats.filled_volume += order.quantity;
            }
        }
        Ok(stats)
    }
}
