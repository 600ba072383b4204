use std::future::Future;

use super::{RevealProof, RevealWitness};

/// Port for ZK proof generation.
///
/// Implementations:
/// - `BBProver` (shells out to `nargo execute` + `bb prove`)
///
/// An implementation must either return a real proof or an error; it must
/// never substitute a placeholder.
pub trait Prover: Send + Sync {
    /// Generate a proof for the reveal circuit.
    ///
    /// The returned `RevealProof` bundles the serialized proof bytes with the
    /// public inputs taken from the witness.
    fn prove_reveal(
        &self,
        witness: &RevealWitness,
    ) -> impl Future<Output = Result<RevealProof, ProverError>> + Send;
}

#[derive(Debug, thiserror::Error)]
pub enum ProverError {
    /// The proving backend is missing or not set up.
    #[error("prover unavailable: {0}")]
    Unavailable(String),

    #[error("proof generation failed: {0}")]
    ProofFailed(String),

    #[error("witness generation failed: {0}")]
    WitnessError(String),

    #[error("witness serialization error: {0}")]
    WitnessSerialization(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
