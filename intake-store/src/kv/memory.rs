//! In-memory key/value store

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::KvStore;
use crate::error::StoreResult;

/// In-memory key/value store
///
/// Clones share the same map, which stands in for two processes opening
/// the same local storage.
#[derive(Clone, Debug, Default)]
pub struct MemoryKvStore {
    entries: Arc<RwLock<BTreeMap<String, Vec<u8>>>>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl KvStore for MemoryKvStore {
    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn put(&self, key: &str, value: Vec<u8>) -> StoreResult<()> {
        self.entries.write().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> StoreResult<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<Vec<u8>>,
        new: Option<Vec<u8>>,
    ) -> StoreResult<bool> {
        let mut entries = self.entries.write().await;
        if entries.get(key) != expected.as_ref() {
            return Ok(false);
        }
        match new {
            Some(value) => {
                entries.insert(key.to_string(), value);
            }
            None => {
                entries.remove(key);
            }
        }
        Ok(true)
    }

    async fn keys_with_prefix(&self, prefix: &str) -> StoreResult<Vec<String>> {
        Ok(self
            .entries
            .read()
            .await
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::{get_json, put_json};

    #[tokio::test]
    async fn test_compare_and_swap() {
        let kv = MemoryKvStore::new();
        assert!(kv.compare_and_swap("k", None, Some(b"a".to_vec())).await.unwrap());
        assert!(!kv.compare_and_swap("k", None, Some(b"b".to_vec())).await.unwrap());
        assert!(kv
            .compare_and_swap("k", Some(b"a".to_vec()), Some(b"b".to_vec()))
            .await
            .unwrap());
        assert_eq!(kv.get("k").await.unwrap(), Some(b"b".to_vec()));

        assert!(kv.compare_and_swap("k", Some(b"b".to_vec()), None).await.unwrap());
        assert!(kv.is_empty().await);
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let kv = MemoryKvStore::new();
        let other = kv.clone();
        put_json(&kv, "n", &7u32).await.unwrap();
        assert_eq!(get_json::<u32>(&other, "n").await.unwrap(), Some(7));
    }

    #[tokio::test]
    async fn test_prefix_scan() {
        let kv = MemoryKvStore::new();
        for key in ["outbox/2", "outbox/1", "pending/u1", "outboxes"] {
            kv.put(key, vec![]).await.unwrap();
        }
        assert_eq!(
            kv.keys_with_prefix("outbox/").await.unwrap(),
            vec!["outbox/1".to_string(), "outbox/2".to_string()]
        );
    }
}
