use crate::crypto::encoding::EncodingError;
use crate::domain::commitment::Commitment;
use crate::domain::order::{OrderPhase, OrderValidationError};
use crate::ports::ledger::LedgerError;
use crate::ports::store::StoreError;
use crate::prover::ProofError;

/// Errors surfaced by `OrderOrchestrator`.
#[derive(Debug, thiserror::Error)]
pub enum OrderError {
    #[error("invalid order: {0}")]
    InvalidOrder(#[from] OrderValidationError),

    #[error("field encoding failed: {0}")]
    EncodingOverflow(EncodingError),

    #[error("no pending secret for commitment {0}")]
    NotFound(Commitment),

    #[error("reveal of {commitment} not allowed for another {remaining_secs}s")]
    TooEarly {
        commitment: Commitment,
        remaining_secs: u64,
    },

    #[error("order {commitment} expired at {expiry}")]
    Expired { commitment: Commitment, expiry: u64 },

    #[error("commitment {0} is not recorded on the ledger")]
    NotCommitted(Commitment),

    #[error("stored secret for {commitment} is corrupted: {detail}")]
    SecretCorrupted {
        commitment: Commitment,
        detail: String,
    },

    #[error("proving unavailable: {0}")]
    ProvingUnavailable(String),

    #[error("proof generation for {0} was cancelled")]
    ProvingCancelled(Commitment),

    #[error("submission for {commitment} failed: {source}")]
    SubmissionFailed {
        commitment: Commitment,
        #[source]
        source: LedgerError,
    },

    #[error("ledger query failed: {0}")]
    Ledger(#[source] LedgerError),

    #[error("secret store error: {0}")]
    Store(StoreError),

    #[error("a different secret is already stored under {0}")]
    Collision(Commitment),

    #[error("cannot {operation} {commitment} while {phase:?}")]
    InvalidPhase {
        commitment: Commitment,
        phase: OrderPhase,
        operation: &'static str,
    },

    #[error("another operation on {0} is in flight")]
    Busy(Commitment),
}

impl OrderError {
    /// The local secret, the encoding, or the store disagree with what was
    /// committed. Retrying will not help.
    pub fn is_integrity_failure(&self) -> bool {
        matches!(
            self,
            OrderError::EncodingOverflow(_)
                | OrderError::SecretCorrupted { .. }
                | OrderError::Collision(_)
        )
    }

    /// Transient: the same call may succeed later with local state unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            OrderError::TooEarly { .. }
                | OrderError::ProvingUnavailable(_)
                | OrderError::SubmissionFailed { .. }
                | OrderError::Ledger(_)
                | OrderError::Busy(_)
                | OrderError::NotCommitted(_)
        )
    }

    pub(crate) fn from_proof(commitment: Commitment, err: ProofError) -> Self {
        match err {
            ProofError::Encoding(e) => OrderError::EncodingOverflow(e),
            ProofError::SecretCorrupted { .. } | ProofError::PublicInputsMismatch => {
                OrderError::SecretCorrupted {
                    commitment,
                    detail: err.to_string(),
                }
            }
            ProofError::Unavailable(reason) => OrderError::ProvingUnavailable(reason),
            ProofError::Failed(e) => OrderError::ProvingUnavailable(e.to_string()),
            ProofError::TaskFailed(reason) => OrderError::ProvingUnavailable(reason),
            ProofError::Cancelled => OrderError::ProvingCancelled(commitment),
        }
    }
}

impl From<EncodingError> for OrderError {
    fn from(err: EncodingError) -> Self {
        OrderError::EncodingOverflow(err)
    }
}

impl From<StoreError> for OrderError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Collision(commitment) => OrderError::Collision(commitment),
            StoreError::Malformed { commitment, reason } => OrderError::SecretCorrupted {
                commitment,
                detail: reason,
            },
            other => OrderError::Store(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use alloy_primitives::{B256, U256};

    use super::*;

    fn c() -> Commitment {
        Commitment(B256::repeat_byte(0x11))
    }

    #[test]
    fn test_store_collision_is_lifted() {
        let err: OrderError = StoreError::Collision(c()).into();
        assert!(matches!(err, OrderError::Collision(x) if x == c()));
        assert!(err.is_integrity_failure());
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_store_io_stays_a_store_error() {
        let err: OrderError = StoreError::Io(std::io::Error::other("disk full")).into();
        assert!(matches!(err, OrderError::Store(_)));
        assert!(!err.is_integrity_failure());
    }

    #[test]
    fn test_encoding_overflow_is_integrity_failure() {
        let err: OrderError = EncodingError::Overflow {
            field: "quantity",
            value: U256::MAX,
        }
        .into();
        assert!(err.is_integrity_failure());
    }

    #[test]
    fn test_classification() {
        let submission = OrderError::SubmissionFailed {
            commitment: c(),
            source: LedgerError::Timeout(std::time::Duration::from_secs(1)),
        };
        assert!(submission.is_retryable());
        assert!(!submission.is_integrity_failure());

        assert!(OrderError::TooEarly { commitment: c(), remaining_secs: 5 }.is_retryable());
        assert!(OrderError::Busy(c()).is_retryable());
        assert!(OrderError::NotCommitted(c()).is_retryable());
        assert!(!OrderError::NotFound(c()).is_retryable());
        assert!(!OrderError::Expired { commitment: c(), expiry: 1 }.is_retryable());
        assert!(!OrderError::ProvingCancelled(c()).is_retryable());
    }

    #[test]
    fn test_proof_errors_map_onto_order_errors() {
        assert!(matches!(
            OrderError::from_proof(c(), ProofError::Cancelled),
            OrderError::ProvingCancelled(_)
        ));
        assert!(matches!(
            OrderError::from_proof(c(), ProofError::Unavailable("no bb".into())),
            OrderError::ProvingUnavailable(_)
        ));
        assert!(
            OrderError::from_proof(c(), ProofError::PublicInputsMismatch).is_integrity_failure()
        );
    }
}
