use std::fmt;

use alloy_primitives::B256;
use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};

/// Single-use blinding value mixed into an order commitment.
///
/// `Debug` is redacted so a salt never ends up in logs.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Salt(pub B256);

impl Salt {
    /// Draw a fresh salt from the operating system CSPRNG.
    pub fn random() -> Self {
        Self::random_from(&mut OsRng)
    }

    pub fn random_from<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        let mut bytes = [0u8; 32];
        rng.fill_bytes(&mut bytes);
        bytes[0] &= 0x1F; // zero top 3 bits → 253-bit, always inside the BN254 field
        Self(B256::from(bytes))
    }
}

impl From<B256> for Salt {
    fn from(value: B256) -> Self {
        Self(value)
    }
}

impl fmt::Debug for Salt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Salt(<redacted>)")
    }
}
