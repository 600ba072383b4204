use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};

use super::commitment::{commit, Commitment, OrderCommitment};
use super::nullifier::Nullifier;
use super::order::OrderParameters;
use crate::crypto::encoding::EncodingError;
use crate::crypto::salt::Salt;

/// Everything needed to reveal (or cancel) an order after a restart.
///
/// Stored under its commitment. Created once at commit time and never
/// mutated; deleted after a confirmed reveal or cancellation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingSecret {
    pub params: OrderParameters,
    pub salt: Salt,
    /// Nullifier derived at commit time, checked again before proving.
    pub nullifier: Nullifier,
    /// Unix seconds at which the secret was persisted.
    pub created_at: u64,
    /// Value locked alongside the commitment.
    pub escrow_amount: U256,
}

impl PendingSecret {
    /// Derive the commitment for a fresh order and build its secret record.
    pub fn create(
        params: OrderParameters,
        salt: Salt,
        trader: Address,
        escrow_amount: U256,
        created_at: u64,
    ) -> Result<(Commitment, Self), EncodingError> {
        let OrderCommitment {
            commitment,
            nullifier,
        } = commit(&salt, &params, trader)?;
        Ok((
            commitment,
            Self {
                params,
                salt,
                nullifier,
                created_at,
                escrow_amount,
            },
        ))
    }

    /// Recompute commitment and nullifier from the stored fields.
    pub fn recompute(&self, trader: Address) -> Result<OrderCommitment, EncodingError> {
        commit(&self.salt, &self.params, trader)
    }
}
