//! Pending Snapshot Store
//!
//! The full request is written to durable local storage before the first
//! network call and cleared only after the tracker records completion, so
//! a crash, a closed tab or a verification redirect never loses the
//! user's answers. Answers given before anyone is signed in go to a
//! single anonymous slot that the first resolved user adopts.

use chrono::{DateTime, Utc};
use intake_core::{ContactInfo, IntakeGraph, UserId};
use intake_store::{get_json, put_json, KvStore, StoreResult};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

const PENDING_PREFIX: &str = "pending/";
const ANONYMOUS_KEY: &str = "pending_anonymous";

/// Snapshot of an attempt that has not completed
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingSubmission {
    #[serde(default)]
    pub user_id: Option<UserId>,
    pub graph: IntakeGraph,
    pub contact: ContactInfo,
    pub saved_at: DateTime<Utc>,
}

/// Durable pending snapshots, one per user
#[derive(Clone)]
pub struct PendingStore {
    kv: Arc<dyn KvStore>,
}

impl PendingStore {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }

    fn key(user: &UserId) -> String {
        format!("{}{}", PENDING_PREFIX, user)
    }

    fn snapshot(user: Option<&UserId>, graph: &IntakeGraph, contact: &ContactInfo) -> PendingSubmission {
        PendingSubmission {
            user_id: user.cloned(),
            graph: graph.clone(),
            contact: contact.clone(),
            saved_at: Utc::now(),
        }
    }

    pub async fn save(
        &self,
        user: &UserId,
        graph: &IntakeGraph,
        contact: &ContactInfo,
    ) -> StoreResult<()> {
        put_json(self.kv.as_ref(), &Self::key(user), &Self::snapshot(Some(user), graph, contact)).await?;
        debug!(user = %user, "Pending snapshot saved");
        Ok(())
    }

    /// Save answers given before the user is known
    pub async fn save_anonymous(&self, graph: &IntakeGraph, contact: &ContactInfo) -> StoreResult<()> {
        put_json(self.kv.as_ref(), ANONYMOUS_KEY, &Self::snapshot(None, graph, contact)).await?;
        debug!("Anonymous pending snapshot saved");
        Ok(())
    }

    pub async fn load_anonymous(&self) -> StoreResult<Option<PendingSubmission>> {
        get_json(self.kv.as_ref(), ANONYMOUS_KEY).await
    }

    pub async fn clear_anonymous(&self) -> StoreResult<()> {
        self.kv.remove(ANONYMOUS_KEY).await
    }

    /// Move the anonymous snapshot onto `user`
    ///
    /// The user-keyed copy is written before the anonymous slot is removed.
    pub async fn adopt(&self, user: &UserId) -> StoreResult<Option<PendingSubmission>> {
        let Some(mut snapshot) = self.load_anonymous().await? else {
            return Ok(None);
        };
        snapshot.user_id = Some(user.clone());
        put_json(self.kv.as_ref(), &Self::key(user), &snapshot).await?;
        self.clear_anonymous().await?;
        debug!(user = %user, "Anonymous pending snapshot adopted");
        Ok(Some(snapshot))
    }

    pub async fn load(&self, user: &UserId) -> StoreResult<Option<PendingSubmission>> {
        get_json(self.kv.as_ref(), &Self::key(user)).await
    }

    pub async fn clear(&self, user: &UserId) -> StoreResult<()> {
        self.kv.remove(&Self::key(user)).await
    }

    /// Users with a snapshot waiting
    pub async fn users(&self) -> StoreResult<Vec<UserId>> {
        Ok(self
            .kv
            .keys_with_prefix(PENDING_PREFIX)
            .await?
            .into_iter()
            .map(|k| UserId::new(&k[PENDING_PREFIX.len()..]))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use intake_core::fixtures;
    use intake_store::MemoryKvStore;

    #[tokio::test]
    async fn test_save_load_clear() {
        let store = PendingStore::new(Arc::new(MemoryKvStore::new()));
        let user = UserId::new("u1");
        let graph = fixtures::two_owners_one_rental();

        assert!(store.load(&user).await.unwrap().is_none());
        store.save(&user, &graph, &fixtures::contact()).await.unwrap();

        let snapshot = store.load(&user).await.unwrap().unwrap();
        assert_eq!(snapshot.graph, graph);
        assert_eq!(snapshot.contact, fixtures::contact());
        assert_eq!(store.users().await.unwrap(), vec![user.clone()]);

        store.clear(&user).await.unwrap();
        assert!(store.load(&user).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_anonymous_snapshot_is_adopted() {
        let store = PendingStore::new(Arc::new(MemoryKvStore::new()));
        let user = UserId::new("u1");
        let graph = fixtures::two_owners_one_rental();

        assert!(store.adopt(&user).await.unwrap().is_none());

        store.save_anonymous(&graph, &fixtures::contact()).await.unwrap();
        let anonymous = store.load_anonymous().await.unwrap().unwrap();
        assert_eq!(anonymous.user_id, None);
        assert!(store.users().await.unwrap().is_empty());

        let adopted = store.adopt(&user).await.unwrap().unwrap();
        assert_eq!(adopted.user_id, Some(user.clone()));
        assert_eq!(adopted.graph, graph);
        assert_eq!(store.load(&user).await.unwrap(), Some(adopted));
        assert!(store.load_anonymous().await.unwrap().is_none());
    }
}
