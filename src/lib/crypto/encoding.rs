//! Canonical field encoding for every value that enters the order hashes.
//!
//! Each input becomes a 32-byte big-endian word that must be strictly below
//! the BN254 scalar modulus. Values at or above the modulus are rejected,
//! never reduced: reduction would let two distinct orders share a commitment.

use alloy_primitives::{Address, B256, U256};
use ark_bn254::Fr;
use ark_ff::PrimeField;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EncodingError {
    #[error("{field} does not fit in the BN254 scalar field: {value}")]
    Overflow { field: &'static str, value: U256 },

    #[error("poseidon hashing failed: {0}")]
    Hash(String),
}

/// The BN254 scalar field modulus as a `U256`.
pub fn field_modulus() -> U256 {
    U256::from_limbs(Fr::MODULUS.0)
}

/// A value known to be a canonical BN254 field element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FieldWord(B256);

impl FieldWord {
    pub fn from_u256(field: &'static str, value: U256) -> Result<Self, EncodingError> {
        if value >= field_modulus() {
            return Err(EncodingError::Overflow { field, value });
        }
        Ok(Self(B256::from(value)))
    }

    pub fn from_b256(field: &'static str, value: B256) -> Result<Self, EncodingError> {
        Self::from_u256(field, U256::from_be_bytes(value.0))
    }

    /// Addresses are 160 bits and always fit.
    pub fn from_address(value: Address) -> Self {
        Self(value.into_word())
    }

    pub fn from_u64(value: u64) -> Self {
        Self(B256::from(U256::from(value)))
    }

    pub fn from_u8(value: u8) -> Self {
        Self::from_u64(u64::from(value))
    }

    /// Domain tags are at most 31 bytes, so they are below the modulus.
    pub(crate) const fn from_tag(tag: B256) -> Self {
        Self(tag)
    }

    pub fn as_b256(&self) -> B256 {
        self.0
    }

    pub(crate) fn to_fr(self) -> Fr {
        Fr::from_be_bytes_mod_order(self.0.as_slice())
    }
}
