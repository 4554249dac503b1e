//! Sled key/value store
//!
//! Every write is flushed before returning so state survives a crash or a
//! full reload. Sled calls block, so they run on the blocking pool.

use async_trait::async_trait;
use std::path::Path;

use super::KvStore;
use crate::error::{StoreError, StoreResult};

const INTAKE_TREE: &str = "intake_state";

/// Sled-backed key/value store
#[derive(Clone)]
pub struct SledKvStore {
    db: sled::Db,
    tree: sled::Tree,
}

impl SledKvStore {
    /// Open or create a database at `path`
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let db = sled::open(path)
            .map_err(|e| StoreError::storage(format!("Failed to open sled db: {}", e)))?;
        let tree = db
            .open_tree(INTAKE_TREE)
            .map_err(|e| StoreError::storage(format!("Failed to open {} tree: {}", INTAKE_TREE, e)))?;
        Ok(Self { db, tree })
    }

    /// Flush to disk
    pub fn flush(&self) -> StoreResult<()> {
        self.db
            .flush()
            .map_err(|e| StoreError::storage(format!("Failed to flush db: {}", e)))?;
        Ok(())
    }

    async fn blocking<T, F>(&self, work: F) -> StoreResult<T>
    where
        F: FnOnce(&SledKvStore) -> StoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let store = self.clone();
        tokio::task::spawn_blocking(move || work(&store))
            .await
            .map_err(|e| StoreError::storage(format!("Sled task failed: {}", e)))?
    }
}

#[async_trait]
impl KvStore for SledKvStore {
    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let key = key.to_string();
        self.blocking(move |s| Ok(s.tree.get(key)?.map(|v| v.to_vec())))
            .await
    }

    async fn put(&self, key: &str, value: Vec<u8>) -> StoreResult<()> {
        let key = key.to_string();
        self.blocking(move |s| {
            s.tree.insert(key, value)?;
            s.flush()
        })
        .await
    }

    async fn remove(&self, key: &str) -> StoreResult<()> {
        let key = key.to_string();
        self.blocking(move |s| {
            s.tree.remove(key)?;
            s.flush()
        })
        .await
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<Vec<u8>>,
        new: Option<Vec<u8>>,
    ) -> StoreResult<bool> {
        let key = key.to_string();
        self.blocking(move |s| {
            let swapped = s.tree.compare_and_swap(key, expected, new)?.is_ok();
            if swapped {
                s.flush()?;
            }
            Ok(swapped)
        })
        .await
    }

    async fn keys_with_prefix(&self, prefix: &str) -> StoreResult<Vec<String>> {
        let prefix = prefix.to_string();
        self.blocking(move |s| {
            let mut keys = Vec::new();
            for item in s.tree.scan_prefix(prefix) {
                let (key, _) = item?;
                let key = String::from_utf8(key.to_vec())
                    .map_err(|e| StoreError::storage(format!("Non-UTF-8 key: {}", e)))?;
                keys.push(key);
            }
            Ok(keys)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_values_survive_reopen() {
        let dir = tempdir().unwrap();
        {
            let kv = SledKvStore::open(dir.path()).unwrap();
            kv.put("tracker", b"state".to_vec()).await.unwrap();
        }
        let kv = SledKvStore::open(dir.path()).unwrap();
        assert_eq!(kv.get("tracker").await.unwrap(), Some(b"state".to_vec()));
    }

    #[tokio::test]
    async fn test_compare_and_swap() {
        let dir = tempdir().unwrap();
        let kv = SledKvStore::open(dir.path()).unwrap();

        assert!(kv.compare_and_swap("k", None, Some(b"1".to_vec())).await.unwrap());
        assert!(!kv.compare_and_swap("k", None, Some(b"2".to_vec())).await.unwrap());
        assert!(kv
            .compare_and_swap("k", Some(b"1".to_vec()), None)
            .await
            .unwrap());
        assert_eq!(kv.get("k").await.unwrap(), None);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_writers_share_the_store() {
        let dir = tempdir().unwrap();
        let kv = SledKvStore::open(dir.path()).unwrap();

        let writers: Vec<_> = (0..16)
            .map(|i| {
                let kv = kv.clone();
                tokio::spawn(async move { kv.put(&format!("outbox/{:02}", i), vec![i]).await })
            })
            .collect();
        for writer in writers {
            writer.await.unwrap().unwrap();
        }

        assert_eq!(kv.keys_with_prefix("outbox/").await.unwrap().len(), 16);
        assert_eq!(kv.get("outbox/07").await.unwrap(), Some(vec![7]));
    }

    #[tokio::test]
    async fn test_prefix_scan() {
        let dir = tempdir().unwrap();
        let kv = SledKvStore::open(dir.path()).unwrap();
        kv.put("outbox/b", vec![]).await.unwrap();
        kv.put("outbox/a", vec![]).await.unwrap();
        kv.put("pending/u1", vec![]).await.unwrap();
        assert_eq!(
            kv.keys_with_prefix("outbox/").await.unwrap(),
            vec!["outbox/a".to_string(), "outbox/b".to_string()]
        );
    }
}
