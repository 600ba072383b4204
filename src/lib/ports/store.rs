use std::future::Future;

use crate::domain::commitment::Commitment;
use crate::domain::secret::PendingSecret;

/// Port for durable storage of pending order secrets, keyed by commitment.
///
/// `put` must be durable when it returns: the orchestrator broadcasts the
/// commitment only after it. Operations on distinct keys must not block one
/// another.
///
/// Implementations:
/// - `FileSecretStore` (one JSON file per commitment)
/// - `InMemorySecretStore` (for testing)
pub trait SecretStore: Send + Sync {
    /// Persist a secret. Re-putting identical contents is a no-op; different
    /// contents under an existing key fail with `StoreError::Collision`.
    fn put(
        &self,
        commitment: Commitment,
        secret: &PendingSecret,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// `Ok(None)` for an unknown commitment.
    fn get(
        &self,
        commitment: Commitment,
    ) -> impl Future<Output = Result<Option<PendingSecret>, StoreError>> + Send;

    /// Idempotent: removing an unknown commitment succeeds.
    fn remove(
        &self,
        commitment: Commitment,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn list_pending(&self) -> impl Future<Output = Result<Vec<Commitment>, StoreError>> + Send;
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("commitment {0} already stored with different contents")]
    Collision(Commitment),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed secret record for {commitment}: {reason}")]
    Malformed {
        commitment: Commitment,
        reason: String,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
