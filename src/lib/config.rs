use std::path::{Path, PathBuf};
use std::time::Duration;

use alloy_primitives::Address;
use serde::Deserialize;

use crate::domain::reveal::{DEFAULT_REVEAL_DELAY, RevealGate};
use crate::orchestrator::DEFAULT_SUBMISSION_TIMEOUT;

/// Client configuration loaded from TOML.
#[derive(Debug, Deserialize)]
pub struct DarkPoolConfig {
    pub ledger: LedgerConfig,
    pub store: StoreConfig,
    pub prover: ProverConfig,
    #[serde(default)]
    pub protocol: ProtocolConfig,
}

#[derive(Debug, Deserialize)]
pub struct LedgerConfig {
    pub rpc_url: String,
    /// Deployed dark-pool contract.
    pub contract: Address,
    /// Signing key; its address is the trader identity bound into commitments.
    pub private_key: String,
}

#[derive(Debug, Deserialize)]
pub struct StoreConfig {
    /// Directory holding one JSON file per pending secret.
    pub dir: PathBuf,
}

#[derive(Debug, Deserialize)]
pub struct ProverConfig {
    /// Directory containing the compiled Noir circuits.
    pub circuits_dir: PathBuf,
}

#[derive(Debug, Deserialize)]
pub struct ProtocolConfig {
    /// Minimum wait between commit and reveal (e.g. "30m"). Must match the contract.
    #[serde(with = "humantime_serde", default = "default_reveal_delay")]
    pub reveal_delay: Duration,

    /// Upper bound on waiting for a transaction to confirm.
    #[serde(with = "humantime_serde", default = "default_submission_timeout")]
    pub submission_timeout: Duration,
}

fn default_reveal_delay() -> Duration {
    DEFAULT_REVEAL_DELAY
}

fn default_submission_timeout() -> Duration {
    DEFAULT_SUBMISSION_TIMEOUT
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            reveal_delay: default_reveal_delay(),
            submission_timeout: default_submission_timeout(),
        }
    }
}

impl ProtocolConfig {
    pub fn reveal_gate(&self) -> RevealGate {
        RevealGate::new(self.reveal_delay)
    }
}

/// Errors from config loading and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("validation error: {0}")]
    Validation(String),
}

impl DarkPoolConfig {
    /// Load and validate a config from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ledger.contract == Address::ZERO {
            return Err(ConfigError::Validation(
                "ledger.contract must be a deployed contract address".into(),
            ));
        }
        if self.ledger.rpc_url.trim().is_empty() {
            return Err(ConfigError::Validation("ledger.rpc_url is empty".into()));
        }
        if self.protocol.submission_timeout.is_zero() {
            return Err(ConfigError::Validation(
                "protocol.submission_timeout must be non-zero".into(),
            ));
        }
        // The contract counts whole seconds.
        if self.protocol.reveal_delay.subsec_nanos() != 0 {
            return Err(ConfigError::Validation(
                "protocol.reveal_delay must be a whole number of seconds".into(),
            ));
        }
        Ok(())
    }
}
