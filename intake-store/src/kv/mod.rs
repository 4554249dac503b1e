//! Durable Key/Value Port
//!
//! Local storage that outlives the process: pending snapshots, tracker
//! state, force-retry flags and the activity outbox. Values are opaque
//! bytes; [`get_json`] and [`put_json`] cover the common JSON case.

pub mod memory;
pub mod sled;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::StoreResult;

pub use self::memory::MemoryKvStore;
pub use self::sled::SledKvStore;

/// Key/value storage interface
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>>;

    async fn put(&self, key: &str, value: Vec<u8>) -> StoreResult<()>;

    async fn remove(&self, key: &str) -> StoreResult<()>;

    /// Replace the value at `key` only if it still equals `expected`
    ///
    /// `None` on either side means "absent". Returns `false` when another
    /// writer got there first.
    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<Vec<u8>>,
        new: Option<Vec<u8>>,
    ) -> StoreResult<bool>;

    /// Keys starting with `prefix`, in ascending order
    async fn keys_with_prefix(&self, prefix: &str) -> StoreResult<Vec<String>>;
}

/// Read and decode a JSON value
pub async fn get_json<T: DeserializeOwned>(kv: &dyn KvStore, key: &str) -> StoreResult<Option<T>> {
    match kv.get(key).await? {
        Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        None => Ok(None),
    }
}

/// Encode and write a JSON value
pub async fn put_json<T: Serialize + ?Sized>(kv: &dyn KvStore, key: &str, value: &T) -> StoreResult<()> {
    let bytes = serde_json::to_vec(value)?;
    kv.put(key, bytes).await
}
