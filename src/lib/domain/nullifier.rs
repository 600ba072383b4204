use alloy_primitives::B256;
use serde::{Deserialize, Serialize};

/// Marks an order as revealed on the ledger so it cannot be revealed twice.
/// nullifier = H("dark_pool.order_nullifier", salt, trader)
///
/// It shares no hash domain with the commitment, so publishing both at reveal
/// time does not link the nullifier to anything but its own order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Nullifier(pub B256);

impl Nullifier {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(B256::from(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0.0
    }
}

impl From<B256> for Nullifier {
    fn from(value: B256) -> Self {
        Self(value)
    }
}

impl From<Nullifier> for B256 {
    fn from(value: Nullifier) -> Self {
        value.0
    }
}
