use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use alloy_primitives::{B256, Bytes, U256};
use serde::Serialize;
use tokio::process::Command;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::domain::commitment::Commitment;
use crate::domain::nullifier::Nullifier;
use crate::ports::prover::{Prover, ProverError};
use crate::ports::{RevealProof, RevealPublicInputs, RevealWitness};

/// Name of the reveal circuit directory under `circuits_dir`.
pub const REVEAL_CIRCUIT: &str = "order_reveal";

/// Format a B256 as a hex string for Noir (`0x…`).
fn format_field(value: &B256) -> String {
    format!("0x{}", hex::encode(value))
}

fn format_uint(value: &U256) -> String {
    format_field(&B256::from(*value))
}

/// TOML-serializable input for the reveal circuit.
///
/// Field names **must** match the Noir circuit parameter names exactly.
#[derive(Serialize)]
struct RevealProverInput {
    // -- Public inputs (2) --
    commitment: String,
    nullifier: String,

    // -- Private --
    salt: String,
    trader: String,
    instrument: String,
    instrument_id: String,
    kind: u8,
    side: u8,
    quantity: String,
    limit_price: String,
    minimum_fill: String,
    expiry: u64,
}

impl From<&RevealWitness> for RevealProverInput {
    fn from(w: &RevealWitness) -> Self {
        Self {
            commitment: format_field(&w.commitment),
            nullifier: format_field(&w.nullifier),
            salt: format_field(&w.salt),
            trader: format_field(&w.trader.into_word()),
            instrument: format_field(&w.instrument.into_word()),
            instrument_id: format_uint(&w.instrument_id),
            kind: w.kind,
            side: w.side,
            quantity: format_uint(&w.quantity),
            limit_price: format_uint(&w.limit_price),
            minimum_fill: format_uint(&w.minimum_fill),
            expiry: w.expiry,
        }
    }
}

/// Files a proving run leaves in the circuit directory. They hold the salt in
/// plaintext, so they are removed when the run ends, including on cancellation.
struct Scratch {
    files: Vec<PathBuf>,
}

impl Scratch {
    fn new(circuit_dir: &Path) -> Self {
        let target = circuit_dir.join("target");
        Self {
            files: vec![
                circuit_dir.join("Prover.toml"),
                target.join("witness.gz"),
                target.join("proof"),
                target.join("public_inputs"),
            ],
        }
    }
}

impl Drop for Scratch {
    fn drop(&mut self) {
        for file in &self.files {
            match std::fs::remove_file(file) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => warn!("failed to remove {}: {e}", file.display()),
            }
        }
    }
}

/// BBProver generates ZK proofs by shelling out to nargo and bb (Barretenberg CLI).
///
/// This prover:
/// 1. Writes witness values to Prover.toml in the circuit directory
/// 2. Runs `nargo execute` to generate the witness
/// 3. Runs `bb prove` to generate the proof
/// 4. Reads the proof bytes from the output file
///
/// nargo and bb work on fixed paths inside the circuit directory, so runs are
/// serialized. Child processes are killed if the proving future is dropped, so
/// an abandoned reveal does not leave a prover running.
pub struct BBProver {
    /// Path to the circuits directory (containing `order_reveal/`)
    circuits_dir: PathBuf,
    nargo: PathBuf,
    bb: PathBuf,
    lock: Mutex<()>,
}

impl BBProver {
    pub fn new(circuits_dir: PathBuf) -> Self {
        Self::with_binaries(circuits_dir, "nargo", "bb")
    }

    /// Use explicit `nargo` and `bb` executables instead of looking them up on PATH.
    pub fn with_binaries(
        circuits_dir: PathBuf,
        nargo: impl Into<PathBuf>,
        bb: impl Into<PathBuf>,
    ) -> Self {
        Self {
            circuits_dir,
            nargo: nargo.into(),
            bb: bb.into(),
            lock: Mutex::new(()),
        }
    }

    fn format_reveal_prover_toml(witness: &RevealWitness) -> Result<String, ProverError> {
        let input = RevealProverInput::from(witness);
        toml::to_string(&input).map_err(|e| ProverError::WitnessSerialization(e.to_string()))
    }

    /// Map a failure to spawn a tool to `Unavailable` when the binary is missing.
    fn spawn_error(tool: &Path, err: std::io::Error) -> ProverError {
        if err.kind() == ErrorKind::NotFound {
            ProverError::Unavailable(format!("`{}` not found", tool.display()))
        } else {
            ProverError::IoError(err)
        }
    }

    /// Check bb's `public_inputs` output, when present, against the witness.
    fn check_public_inputs(raw: &[u8], expected: &[B256]) -> Result<(), ProverError> {
        let words: Vec<B256> = raw.chunks(32).map(B256::left_padding_from).collect();
        if words != expected {
            return Err(ProverError::ProofFailed(format!(
                "bb public inputs do not match the witness: got {} words",
                words.len()
            )));
        }
        Ok(())
    }

    /// Execute a circuit and generate a proof.
    ///
    /// Returns the proof bytes and bb's `public_inputs` file if it wrote one.
    async fn prove_circuit(
        &self,
        circuit_name: &str,
        prover_toml: &str,
    ) -> Result<(Vec<u8>, Option<Vec<u8>>), ProverError> {
        let circuit_dir = self.circuits_dir.join(circuit_name);

        if !circuit_dir.exists() {
            return Err(ProverError::Unavailable(format!(
                "circuit directory not found: {}",
                circuit_dir.display()
            )));
        }

        let _running = self.lock.lock().await;
        let _scratch = Scratch::new(&circuit_dir);
        let target_dir = circuit_dir.join("target");

        // 1. Write Prover.toml with witness values
        tokio::fs::write(circuit_dir.join("Prover.toml"), prover_toml).await?;

        // 2. Run nargo execute to generate witness
        debug!(circuit = circuit_name, "running nargo execute");
        let nargo_status = Command::new(&self.nargo)
            .args(["execute", "witness"])
            .current_dir(&circuit_dir)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| Self::spawn_error(&self.nargo, e))?;

        if !nargo_status.status.success() {
            let stderr = String::from_utf8_lossy(&nargo_status.stderr);
            return Err(ProverError::WitnessError(format!(
                "nargo execute failed: {}",
                stderr
            )));
        }

        // 3. Run bb prove
        debug!(circuit = circuit_name, "running bb prove");
        let bytecode = target_dir.join(format!("{circuit_name}.json"));
        let witness = target_dir.join("witness.gz");
        let bb_status = Command::new(&self.bb)
            .arg("prove")
            .arg("-b")
            .arg(&bytecode)
            .arg("-w")
            .arg(&witness)
            .args(["--write_vk", "--oracle_hash", "keccak", "-o"])
            .arg(&target_dir)
            .current_dir(&circuit_dir)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| Self::spawn_error(&self.bb, e))?;

        if !bb_status.status.success() {
            let stderr = String::from_utf8_lossy(&bb_status.stderr);
            return Err(ProverError::ProofFailed(format!(
                "bb prove failed: {}",
                stderr
            )));
        }

        // 4. Read proof file
        let proof = tokio::fs::read(target_dir.join("proof")).await?;
        let public_inputs = match tokio::fs::read(target_dir.join("public_inputs")).await {
            Ok(raw) => Some(raw),
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => return Err(e.into()),
        };
        Ok((proof, public_inputs))
    }
}

impl Prover for BBProver {
    async fn prove_reveal(&self, witness: &RevealWitness) -> Result<RevealProof, ProverError> {
        let prover_toml = Self::format_reveal_prover_toml(witness)?;
        let (proof_bytes, bb_inputs) = self.prove_circuit(REVEAL_CIRCUIT, &prover_toml).await?;
        if let Some(raw) = bb_inputs {
            Self::check_public_inputs(&raw, &[witness.commitment, witness.nullifier])?;
        }

        let public_inputs = RevealPublicInputs {
            commitment: Commitment(witness.commitment),
            nullifier: Nullifier(witness.nullifier),
        };
        info!(
            commitment = %public_inputs.commitment,
            proof_len = proof_bytes.len(),
            "reveal proof generated"
        );

        Ok(RevealProof::new(Bytes::from(proof_bytes), public_inputs))
    }
}
