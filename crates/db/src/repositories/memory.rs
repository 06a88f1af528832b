use std::collections::HashMap;

use tokio::sync::RwLock;

use cartstore_core::errors::StorageError;
use cartstore_core::ports::KeyValueStore;

/// Process-local key-value store; contents vanish with the process.
#[derive(Default)]
pub struct InMemoryKeyValueStore {
    values: RwLock<HashMap<String, Vec<u8>>>,
}

#[async_trait::async_trait]
impl KeyValueStore for InMemoryKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let values = self.values.read().await;
        Ok(values.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        let mut values = self.values.write().await;
        values.insert(key.to_string(), value.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use cartstore_core::ports::KeyValueStore;

    use crate::repositories::InMemoryKeyValueStore;

    #[tokio::test]
    async fn in_memory_store_round_trip() {
        let store = InMemoryKeyValueStore::default();

        assert_eq!(store.get("cart").await.expect("get missing"), None);

        store.set("cart", b"[]").await.expect("set cart");
        store.set("cart", b"[{\"id\":1}]").await.expect("overwrite cart");

        assert_eq!(store.get("cart").await.expect("get cart"), Some(b"[{\"id\":1}]".to_vec()));
        assert_eq!(store.get("other").await.expect("get other"), None);
    }
}
