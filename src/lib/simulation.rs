//! Dry runs of a reveal.
//!
//! `dry_run` repeats every local check a reveal would make (codec
//! recomputation, gate, expiry) without proving. Its `DryRunReport` cannot be
//! turned into a `RevealProof`, so nothing here can reach `reveal_order`.

use alloy_primitives::Address;

use crate::domain::commitment::Commitment;
use crate::domain::nullifier::Nullifier;
use crate::domain::reveal::{RevealGate, RevealStatus};
use crate::domain::secret::PendingSecret;
use crate::prover::verify_secret;

/// Outcome of a simulated reveal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DryRunReport {
    pub commitment: Commitment,
    pub nullifier: Nullifier,
    /// `None` when the stored secret reproduces its commitment and nullifier.
    pub integrity_error: Option<String>,
    pub reveal: RevealStatus,
    pub expired: bool,
    /// Whether the ledger has a live record; `None` if it was not consulted.
    pub committed_on_ledger: Option<bool>,
}

impl DryRunReport {
    /// A real reveal would get as far as proving.
    pub fn would_prove(&self) -> bool {
        self.integrity_error.is_none()
            && self.reveal.allowed
            && !self.expired
            && self.committed_on_ledger != Some(false)
    }
}

pub fn dry_run(
    secret: &PendingSecret,
    commitment: Commitment,
    trader: Address,
    gate: &RevealGate,
    commit_ts: u64,
    now: u64,
) -> DryRunReport {
    let integrity_error = verify_secret(secret, commitment, trader)
        .err()
        .map(|e| e.to_string());

    DryRunReport {
        commitment,
        nullifier: secret.nullifier,
        integrity_error,
        reveal: gate.can_reveal(commit_ts, now),
        expired: secret.params.is_expired(now),
        committed_on_ledger: None,
    }
}
