use std::fmt;
use std::str::FromStr;

use alloy_primitives::{Address, B256};
use serde::{Deserialize, Serialize};

use super::nullifier::Nullifier;
use super::order::OrderParameters;
use crate::crypto::encoding::{EncodingError, FieldWord};
use crate::crypto::poseidon::{poseidon_tagged, DOMAIN_ORDER_COMMITMENT, DOMAIN_ORDER_NULLIFIER};
use crate::crypto::salt::Salt;

/// Public, pre-reveal handle of an order. Also the key of its pending secret.
/// commitment = H("dark_pool.order_commitment", salt, instrument, instance_id,
///                kind, side, quantity, limit_price, minimum_fill, expiry, trader)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Commitment(pub B256);

impl Commitment {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(B256::from(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0.0
    }

    /// Fixed-width `0x`-prefixed lowercase hex (66 characters).
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl fmt::Display for Commitment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for Commitment {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.strip_prefix("0x").unwrap_or(s);
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(digits, &mut bytes)?;
        Ok(Self::from_bytes(bytes))
    }
}

impl From<B256> for Commitment {
    fn from(value: B256) -> Self {
        Self(value)
    }
}

impl From<Commitment> for B256 {
    fn from(value: Commitment) -> Self {
        value.0
    }
}

/// Commitment and nullifier derived together from one secret.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderCommitment {
    pub commitment: Commitment,
    pub nullifier: Nullifier,
}

/// Derive the commitment and nullifier for an order.
///
/// Pure and deterministic: the same salt, parameters and trader always give
/// byte-identical outputs. Any input outside the field fails with
/// `EncodingError::Overflow` before hashing.
pub fn commit(
    salt: &Salt,
    params: &OrderParameters,
    trader: Address,
) -> Result<OrderCommitment, EncodingError> {
    let salt_word = FieldWord::from_b256("salt", salt.0)?;
    let trader_word = FieldWord::from_address(trader);

    let fields = [
        salt_word,
        FieldWord::from_address(params.instrument.contract),
        FieldWord::from_u256("instrument_id", params.instrument.instance_id)?,
        FieldWord::from_u8(params.kind.as_u8()),
        FieldWord::from_u8(params.side.as_u8()),
        FieldWord::from_u256("quantity", params.quantity)?,
        FieldWord::from_u256("limit_price", params.limit_price)?,
        FieldWord::from_u256("minimum_fill", params.minimum_fill)?,
        FieldWord::from_u64(params.expiry),
        trader_word,
    ];

    let commitment = Commitment(poseidon_tagged(DOMAIN_ORDER_COMMITMENT, &fields)?);
    let nullifier = derive_nullifier(salt, trader)?;

    Ok(OrderCommitment {
        commitment,
        nullifier,
    })
}

/// nullifier = H("dark_pool.order_nullifier", salt, trader)
pub fn derive_nullifier(salt: &Salt, trader: Address) -> Result<Nullifier, EncodingError> {
    let fields = [
        FieldWord::from_b256("salt", salt.0)?,
        FieldWord::from_address(trader),
    ];
    Ok(Nullifier(poseidon_tagged(DOMAIN_ORDER_NULLIFIER, &fields)?))
}
