use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::domain::commitment::Commitment;
use crate::domain::secret::PendingSecret;
use crate::ports::store::{SecretStore, StoreError};

/// In-memory implementation of `SecretStore` for testing.
///
/// Not durable: secrets are lost with the process. The lock is only held for
/// map operations, never across I/O, so unrelated keys do not wait on each
/// other in any meaningful way.
pub struct InMemorySecretStore {
    secrets: RwLock<HashMap<Commitment, PendingSecret>>,
}

impl InMemorySecretStore {
    pub fn new() -> Self {
        Self {
            secrets: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemorySecretStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SecretStore for InMemorySecretStore {
    async fn put(&self, commitment: Commitment, secret: &PendingSecret) -> Result<(), StoreError> {
        let mut secrets = self.secrets.write().await;
        match secrets.get(&commitment) {
            Some(existing) if existing == secret => Ok(()),
            Some(_) => Err(StoreError::Collision(commitment)),
            None => {
                secrets.insert(commitment, secret.clone());
                Ok(())
            }
        }
    }

    async fn get(&self, commitment: Commitment) -> Result<Option<PendingSecret>, StoreError> {
        Ok(self.secrets.read().await.get(&commitment).cloned())
    }

    async fn remove(&self, commitment: Commitment) -> Result<(), StoreError> {
        self.secrets.write().await.remove(&commitment);
        Ok(())
    }

    async fn list_pending(&self) -> Result<Vec<Commitment>, StoreError> {
        let mut keys: Vec<Commitment> = self.secrets.read().await.keys().copied().collect();
        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use alloy_primitives::{Address, B256, U256};

    use super::*;
    use crate::crypto::salt::Salt;
    use crate::domain::order::{InstrumentRef, OrderKind, OrderParameters, Side};

    fn test_secret(quantity: u64) -> (Commitment, PendingSecret) {
        let params = OrderParameters {
            instrument: InstrumentRef::new(Address::repeat_byte(0x01), U256::ZERO),
            kind: OrderKind::Limit,
            side: Side::Buy,
            quantity: U256::from(quantity),
            limit_price: U256::from(10),
            minimum_fill: U256::ZERO,
            expiry: 10_000,
        };
        PendingSecret::create(
            params,
            Salt(B256::left_padding_from(&[0x05])),
            Address::repeat_byte(0xBB),
            U256::ZERO,
            100,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_put_then_get() {
        let store = InMemorySecretStore::new();
        let (commitment, secret) = test_secret(1);

        store.put(commitment, &secret).await.unwrap();
        assert_eq!(store.get(commitment).await.unwrap(), Some(secret));
    }

    #[tokio::test]
    async fn test_get_unknown_is_none() {
        let store = InMemorySecretStore::new();
        let missing = Commitment(B256::repeat_byte(0x99));
        assert!(store.get(missing).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_identical_put_is_noop() {
        let store = InMemorySecretStore::new();
        let (commitment, secret) = test_secret(1);

        store.put(commitment, &secret).await.unwrap();
        store.put(commitment, &secret).await.unwrap();
        assert_eq!(store.list_pending().await.unwrap(), vec![commitment]);
    }

    #[tokio::test]
    async fn test_different_contents_collide() {
        let store = InMemorySecretStore::new();
        let (commitment, secret) = test_secret(1);
        let (_, other) = test_secret(2);

        store.put(commitment, &secret).await.unwrap();
        let err = store.put(commitment, &other).await.unwrap_err();
        assert!(matches!(err, StoreError::Collision(c) if c == commitment));
        // original untouched
        assert_eq!(store.get(commitment).await.unwrap(), Some(secret));
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let store = InMemorySecretStore::new();
        let (commitment, secret) = test_secret(1);

        store.put(commitment, &secret).await.unwrap();
        store.remove(commitment).await.unwrap();
        store.remove(commitment).await.unwrap();
        assert!(store.get(commitment).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_pending_returns_all_keys() {
        let store = InMemorySecretStore::new();
        let (c1, s1) = test_secret(1);
        let (c2, s2) = test_secret(2);

        store.put(c1, &s1).await.unwrap();
        store.put(c2, &s2).await.unwrap();

        let mut expected = vec![c1, c2];
        expected.sort();
        assert_eq!(store.list_pending().await.unwrap(), expected);
    }
}
