//! Proof generation for reveals.
//!
//! Before the proving backend sees anything, the stored secret is re-hashed
//! and compared with the commitment it is filed under. A mismatch stops the
//! reveal: a proof over the wrong public inputs is either rejected on-chain or,
//! worse, accepted for an order the trader never committed to.

use std::sync::Arc;

use alloy_primitives::Address;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::crypto::encoding::EncodingError;
use crate::domain::commitment::{Commitment, OrderCommitment};
use crate::domain::nullifier::Nullifier;
use crate::domain::secret::PendingSecret;
use crate::ports::prover::{Prover, ProverError};
use crate::ports::{RevealProof, RevealPublicInputs, RevealWitness};

#[derive(Debug, thiserror::Error)]
pub enum ProofError {
    #[error("encoding failed while recomputing commitment: {0}")]
    Encoding(#[from] EncodingError),

    #[error(
        "stored secret does not match {commitment}: recomputed commitment {recomputed}, \
         nullifier {stored_nullifier:?} vs {recomputed_nullifier:?}"
    )]
    SecretCorrupted {
        commitment: Commitment,
        recomputed: Commitment,
        stored_nullifier: Nullifier,
        recomputed_nullifier: Nullifier,
    },

    #[error("prover returned public inputs for a different order")]
    PublicInputsMismatch,

    #[error("prover unavailable: {0}")]
    Unavailable(String),

    #[error("proof generation failed: {0}")]
    Failed(ProverError),

    #[error("proof generation cancelled")]
    Cancelled,

    #[error("proving task failed: {0}")]
    TaskFailed(String),
}

impl From<ProverError> for ProofError {
    fn from(err: ProverError) -> Self {
        match err {
            ProverError::Unavailable(reason) => ProofError::Unavailable(reason),
            other => ProofError::Failed(other),
        }
    }
}

/// Recompute commitment and nullifier from `secret` and check them against
/// the key it is stored under and the nullifier recorded at commit time.
pub fn verify_secret(
    secret: &PendingSecret,
    commitment: Commitment,
    trader: Address,
) -> Result<OrderCommitment, ProofError> {
    let recomputed = secret.recompute(trader)?;
    if recomputed.commitment != commitment || recomputed.nullifier != secret.nullifier {
        return Err(ProofError::SecretCorrupted {
            commitment,
            recomputed: recomputed.commitment,
            stored_nullifier: secret.nullifier,
            recomputed_nullifier: recomputed.nullifier,
        });
    }
    Ok(recomputed)
}

fn build_witness(secret: &PendingSecret, public: &OrderCommitment, trader: Address) -> RevealWitness {
    let params = &secret.params;
    RevealWitness {
        commitment: public.commitment.0,
        nullifier: public.nullifier.0,
        salt: secret.salt.0,
        trader,
        instrument: params.instrument.contract,
        instrument_id: params.instrument.instance_id,
        kind: params.kind.as_u8(),
        side: params.side.as_u8(),
        quantity: params.quantity,
        limit_price: params.limit_price,
        minimum_fill: params.minimum_fill,
        expiry: params.expiry,
    }
}

async fn generate<P: Prover>(
    prover: &P,
    secret: &PendingSecret,
    commitment: Commitment,
    trader: Address,
) -> Result<RevealProof, ProofError> {
    let public = verify_secret(secret, commitment, trader)?;
    let witness = build_witness(secret, &public, trader);

    debug!(%commitment, "generating reveal proof");
    let proof = prover.prove_reveal(&witness).await?;

    let expected = RevealPublicInputs {
        commitment: public.commitment,
        nullifier: public.nullifier,
    };
    if proof.public_inputs != expected {
        warn!(%commitment, "prover returned mismatched public inputs");
        return Err(ProofError::PublicInputsMismatch);
    }
    Ok(proof)
}

/// Checks secrets and drives the `Prover` port.
pub struct ProofGenerator<P> {
    prover: Arc<P>,
}

impl<P> Clone for ProofGenerator<P> {
    fn clone(&self) -> Self {
        Self {
            prover: self.prover.clone(),
        }
    }
}

impl<P: Prover + 'static> ProofGenerator<P> {
    pub fn new(prover: P) -> Self {
        Self {
            prover: Arc::new(prover),
        }
    }

    pub fn from_arc(prover: Arc<P>) -> Self {
        Self { prover }
    }

    /// Verify `secret` against `commitment`, then prove, on the caller's task.
    pub async fn prove(
        &self,
        secret: &PendingSecret,
        commitment: Commitment,
        trader: Address,
    ) -> Result<RevealProof, ProofError> {
        generate(self.prover.as_ref(), secret, commitment, trader).await
    }

    /// Run `prove` as a separate task that stops when `cancel` fires.
    pub fn spawn(
        &self,
        secret: PendingSecret,
        commitment: Commitment,
        trader: Address,
        cancel: CancellationToken,
    ) -> ProvingTask {
        let prover = self.prover.clone();
        let token = cancel.clone();
        let handle = tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = token.cancelled() => Err(ProofError::Cancelled),
                result = generate(prover.as_ref(), &secret, commitment, trader) => result,
            }
        });
        ProvingTask {
            handle: Some(handle),
            cancel,
        }
    }
}

/// Handle to a running proof generation. Dropping it cancels the work.
pub struct ProvingTask {
    handle: Option<JoinHandle<Result<RevealProof, ProofError>>>,
    cancel: CancellationToken,
}

impl ProvingTask {
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Wait for the proof.
    pub async fn join(mut self) -> Result<RevealProof, ProofError> {
        let Some(handle) = self.handle.take() else {
            return Err(ProofError::TaskFailed("proving task already joined".into()));
        };
        match handle.await {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => Err(ProofError::Cancelled),
            Err(e) => Err(ProofError::TaskFailed(e.to_string())),
        }
    }
}

impl Drop for ProvingTask {
    fn drop(&mut self) {
        if self.handle.is_some() {
            self.cancel.cancel();
        }
    }
}
