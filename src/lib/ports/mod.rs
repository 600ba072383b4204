pub mod ledger;
pub mod prover;
pub mod store;

use alloy_primitives::{Address, B256, Bytes, U256};

use crate::domain::commitment::Commitment;
use crate::domain::nullifier::Nullifier;

/// Public inputs of the reveal circuit, in circuit order: `[commitment, nullifier]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RevealPublicInputs {
    pub commitment: Commitment,
    pub nullifier: Nullifier,
}

impl RevealPublicInputs {
    pub fn to_array(&self) -> [B256; 2] {
        [self.commitment.0, self.nullifier.0]
    }
}

/// A proof that the disclosed order and a hidden salt open `commitment`.
#[derive(Debug, Clone)]
pub struct RevealProof {
    /// Serialized proof in Barretenberg format
    pub proof: Bytes,
    pub public_inputs: RevealPublicInputs,
}

impl RevealProof {
    pub fn new(proof: Bytes, public_inputs: RevealPublicInputs) -> Self {
        Self {
            proof,
            public_inputs,
        }
    }
}

/// Full witness for the reveal circuit (public + private inputs).
///
/// Built by `ProofGenerator` only after the stored secret has been checked
/// against its commitment.
#[derive(Debug, Clone)]
pub struct RevealWitness {
    // ── Public inputs (2) ──
    pub commitment: B256,
    pub nullifier: B256,

    // ── Private ──
    pub salt: B256,
    pub trader: Address,
    pub instrument: Address,
    pub instrument_id: U256,
    pub kind: u8,
    pub side: u8,
    pub quantity: U256,
    pub limit_price: U256,
    pub minimum_fill: U256,
    pub expiry: u64,
}

/// On-chain record of a commitment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitmentInfo {
    pub trader: Address,
    /// Block timestamp of the commit transaction.
    pub timestamp: u64,
    pub escrow: U256,
    pub revealed: bool,
    pub cancelled: bool,
}

impl CommitmentInfo {
    pub fn is_live(&self) -> bool {
        !self.revealed && !self.cancelled
    }
}

/// Per-instrument aggregates reported by the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InstrumentStats {
    pub total_orders: u64,
    pub active_orders: u64,
    pub filled_volume: U256,
}

/// Minimal transaction receipt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxReceipt {
    pub tx_hash: B256,
    pub success: bool,
}
