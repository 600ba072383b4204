use alloy_primitives::{Address, B256, U256};
use std::future::Future;

use super::{CommitmentInfo, InstrumentStats, RevealProof, TxReceipt};
use crate::domain::commitment::Commitment;
use crate::domain::nullifier::Nullifier;
use crate::domain::order::{InstrumentRef, OrderParameters, OrderState};

/// Port for the dark-pool ledger contract.
///
/// `broadcast_commit` resolves once the node accepts the transaction; its
/// confirmation is awaited separately with `confirm`. The other writes resolve
/// once the transaction is confirmed (or rejected), and a returned receipt is
/// the confirmation the orchestrator acts on.
///
/// Implementations:
/// - `EthereumLedger` (alloy)
/// - `MockLedger` for tests and local runs
pub trait OrderLedger: Send + Sync {
    /// Broadcast `commitOrder(commitment)` with `escrow` attached as value.
    /// Returns the transaction hash.
    fn broadcast_commit(
        &self,
        commitment: Commitment,
        escrow: U256,
    ) -> impl Future<Output = Result<B256, LedgerError>> + Send;

    /// Wait for a broadcast transaction to be included.
    fn confirm(&self, tx_hash: B256) -> impl Future<Output = Result<TxReceipt, LedgerError>> + Send;

    /// `revealOrder(proof, [commitment, nullifier], params)`.
    fn reveal_order(
        &self,
        proof: &RevealProof,
        params: &OrderParameters,
    ) -> impl Future<Output = Result<TxReceipt, LedgerError>> + Send;

    /// `cancelCommitment(commitment)`; releases the escrow.
    fn cancel_commitment(
        &self,
        commitment: Commitment,
    ) -> impl Future<Output = Result<TxReceipt, LedgerError>> + Send;

    /// `None` if the ledger has never seen this commitment.
    fn commitment_info(
        &self,
        commitment: Commitment,
    ) -> impl Future<Output = Result<Option<CommitmentInfo>, LedgerError>> + Send;

    /// `None` for an unknown order hash.
    fn order_state(
        &self,
        order_hash: B256,
    ) -> impl Future<Output = Result<Option<OrderState>, LedgerError>> + Send;

    fn is_nullifier_spent(
        &self,
        nullifier: Nullifier,
    ) -> impl Future<Output = Result<bool, LedgerError>> + Send;

    fn active_order_count(
        &self,
        trader: Address,
    ) -> impl Future<Output = Result<u64, LedgerError>> + Send;

    fn instrument_stats(
        &self,
        instrument: &InstrumentRef,
    ) -> impl Future<Output = Result<InstrumentStats, LedgerError>> + Send;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("transaction failed: {0}")]
    TransactionFailed(String),

    #[error("transaction reverted: {0}")]
    Reverted(String),

    #[error("ledger call timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("unexpected ledger value: {0}")]
    Decode(String),
}

impl<T: OrderLedger> OrderLedger for std::sync::Arc<T> {
    fn broadcast_commit(
        &self,
        commitment: Commitment,
        escrow: U256,
    ) -> impl Future<Output = Result<B256, LedgerError>> + Send {
        (**self).broadcast_commit(commitment, escrow)
    }

    fn confirm(&self, tx_hash: B256) -> impl Future<Output = Result<TxReceipt, LedgerError>> + Send {
        (**self).confirm(tx_hash)
    }

    fn reveal_order(
        &self,
        proof: &RevealProof,
        params: &OrderParameters,
    ) -> impl Future<Output = Result<TxReceipt, LedgerError>> + Send {
        (**self).reveal_order(proof, params)
    }

    fn cancel_commitment(
        &self,
        commitment: Commitment,
    ) -> impl Future<Output = Result<TxReceipt, LedgerError>> + Send {
        (**self).cancel_commitment(commitment)
    }

    fn commitment_info(
        &self,
        commitment: Commitment,
    ) -> impl Future<Output = Result<Option<CommitmentInfo>, LedgerError>> + Send {
        (**self).commitment_info(commitment)
    }

    fn order_state(
        &self,
        order_hash: B256,
    ) -> impl Future<Output = Result<Option<OrderState>, LedgerError>> + Send {
        (**self).order_state(order_hash)
    }

    fn is_nullifier_spent(
        &self,
        nullifier: Nullifier,
    ) -> impl Future<Output = Result<bool, LedgerError>> + Send {
        (**self).is_nullifier_spent(nullifier)
    }

    fn active_order_count(
        &self,
        trader: Address,
    ) -> impl Future<Output = Result<u64, LedgerError>> + Send {
        (**self).active_order_count(trader)
    }

    fn instrument_stats(
        &self,
        instrument: &InstrumentRef,
    ) -> impl Future<Output = Result<InstrumentStats, LedgerError>> + Send {
        (**self).instrument_stats(instrument)
    }
}
