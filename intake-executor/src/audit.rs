//! Activity Audit Logger
//!
//! Records what happened to a submission for support and forensics.
//! Recording never fails the caller: a failed primary sink falls back to a
//! secondary one, and a failed fallback is only logged.

use async_trait::async_trait;
use chrono::Utc;
use intake_core::UserId;
use intake_store::{get_json, put_json, ActivityRow, Datastore, KvStore, StoreResult};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

/// Audited event types
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityEvent {
    SubmissionStarted,
    SubmissionCompleted,
    SubmissionFailed,
    SubmissionDeduplicated,
    AuthorizationPending,
    /// A compensating delete did not go through; the header may be orphaned
    CompensationFailed,
}

impl ActivityEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityEvent::SubmissionStarted => "submission_started",
            ActivityEvent::SubmissionCompleted => "submission_completed",
            ActivityEvent::SubmissionFailed => "submission_failed",
            ActivityEvent::SubmissionDeduplicated => "submission_deduplicated",
            ActivityEvent::AuthorizationPending => "authorization_pending",
            ActivityEvent::CompensationFailed => "compensation_failed",
        }
    }
}

impl std::fmt::Display for ActivityEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry to record
#[derive(Clone, Debug, PartialEq)]
pub struct ActivityEntry {
    pub user_id: Option<UserId>,
    pub event: ActivityEvent,
    pub description: String,
    pub entity_type: Option<String>,
    pub entity_id: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

impl ActivityEntry {
    pub fn new(event: ActivityEvent, description: impl Into<String>) -> Self {
        Self {
            user_id: None,
            event,
            description: description.into(),
            entity_type: None,
            entity_id: None,
            metadata: None,
        }
    }

    pub fn for_user(mut self, user: &UserId) -> Self {
        self.user_id = Some(user.clone());
        self
    }

    pub fn entity(mut self, entity_type: impl Into<String>, entity_id: impl ToString) -> Self {
        self.entity_type = Some(entity_type.into());
        self.entity_id = Some(entity_id.to_string());
        self
    }

    pub fn metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    fn into_row(self) -> ActivityRow {
        ActivityRow {
            user_id: self.user_id,
            event_type: self.event.as_str().to_string(),
            description: self.description,
            entity_type: self.entity_type,
            entity_id: self.entity_id,
            metadata: self.metadata,
            created_at: Utc::now(),
        }
    }
}

/// Destination for activity rows
#[async_trait]
pub trait ActivitySink: Send + Sync {
    fn name(&self) -> &'static str;

    async fn write(&self, row: &ActivityRow) -> StoreResult<()>;
}

/// Writes to the remote activity table
pub struct DatastoreActivitySink {
    datastore: Arc<dyn Datastore>,
}

impl DatastoreActivitySink {
    pub fn new(datastore: Arc<dyn Datastore>) -> Self {
        Self { datastore }
    }
}

#[async_trait]
impl ActivitySink for DatastoreActivitySink {
    fn name(&self) -> &'static str {
        "datastore"
    }

    async fn write(&self, row: &ActivityRow) -> StoreResult<()> {
        self.datastore.insert_activity(row).await
    }
}

const OUTBOX_PREFIX: &str = "outbox/activity/";

/// Appends to a durable local outbox, replayed later
pub struct OutboxActivitySink {
    kv: Arc<dyn KvStore>,
}

impl OutboxActivitySink {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }

    /// Rows waiting in the outbox, oldest first
    pub async fn pending(&self) -> StoreResult<Vec<ActivityRow>> {
        let mut rows = Vec::new();
        for key in self.kv.keys_with_prefix(OUTBOX_PREFIX).await? {
            if let Some(row) = get_json(self.kv.as_ref(), &key).await? {
                rows.push(row);
            }
        }
        Ok(rows)
    }

    /// Push outbox rows to `datastore`, removing each one written
    ///
    /// Stops at the first failure and returns how many rows went out.
    pub async fn replay(&self, datastore: &dyn Datastore) -> StoreResult<usize> {
        let mut sent = 0;
        for key in self.kv.keys_with_prefix(OUTBOX_PREFIX).await? {
            let Some(row) = get_json::<ActivityRow>(self.kv.as_ref(), &key).await? else {
                continue;
            };
            datastore.insert_activity(&row).await?;
            self.kv.remove(&key).await?;
            sent += 1;
        }
        Ok(sent)
    }
}

#[async_trait]
impl ActivitySink for OutboxActivitySink {
    fn name(&self) -> &'static str {
        "outbox"
    }

    async fn write(&self, row: &ActivityRow) -> StoreResult<()> {
        // Timestamp first so a prefix scan returns rows in write order
        let key = format!(
            "{}{:020}-{}",
            OUTBOX_PREFIX,
            row.created_at.timestamp_micros(),
            Uuid::new_v4()
        );
        put_json(self.kv.as_ref(), &key, row).await
    }
}

/// Activity logger with primary and fallback sinks
#[derive(Clone)]
pub struct ActivityLogger {
    primary: Arc<dyn ActivitySink>,
    fallback: Option<Arc<dyn ActivitySink>>,
    detached: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl ActivityLogger {
    pub fn new(primary: Arc<dyn ActivitySink>) -> Self {
        Self {
            primary,
            fallback: None,
            detached: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_fallback(mut self, fallback: Arc<dyn ActivitySink>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    /// Record an entry, falling back on failure
    pub async fn record(&self, entry: ActivityEntry) {
        let row = entry.into_row();
        let err = match self.primary.write(&row).await {
            Ok(()) => {
                debug!(event = %row.event_type, sink = self.primary.name(), "Activity recorded");
                return;
            }
            Err(e) => e,
        };

        let Some(fallback) = &self.fallback else {
            warn!(event = %row.event_type, sink = self.primary.name(), error = %err, "Activity dropped");
            return;
        };
        warn!(
            event = %row.event_type,
            sink = self.primary.name(),
            fallback = fallback.name(),
            error = %err,
            "Activity sink failed, using fallback"
        );
        if let Err(e) = fallback.write(&row).await {
            warn!(event = %row.event_type, sink = fallback.name(), error = %e, "Activity dropped");
        }
    }

    /// Record on a background task; pair with [`flush`](Self::flush)
    pub fn record_detached(&self, entry: ActivityEntry) {
        let logger = self.clone();
        let handle = tokio::spawn(async move { logger.record(entry).await });
        let mut handles = self.handles();
        handles.retain(|h| !h.is_finished());
        handles.push(handle);
    }

    /// Detached writes not yet known to be finished
    pub fn detached_in_flight(&self) -> usize {
        let mut handles = self.handles();
        handles.retain(|h| !h.is_finished());
        handles.len()
    }

    /// Wait for every detached write issued so far
    pub async fn flush(&self) {
        let handles = std::mem::take(&mut *self.handles());
        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "Detached activity write panicked");
            }
        }
    }

    fn handles(&self) -> MutexGuard<'_, Vec<JoinHandle<()>>> {
        match self.detached.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use intake_store::{InjectedFailure, MemoryDatastore, MemoryKvStore, Table};

    fn entry() -> ActivityEntry {
        ActivityEntry::new(ActivityEvent::SubmissionStarted, "Submission started")
            .for_user(&UserId::new("u1"))
            .entity("submission", "sub-1")
    }

    #[tokio::test]
    async fn test_primary_sink() {
        let datastore = Arc::new(MemoryDatastore::new());
        let logger = ActivityLogger::new(Arc::new(DatastoreActivitySink::new(datastore.clone())));

        logger.record(entry()).await;
        let rows = datastore.rows(Table::ActivityLogs).await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["event_type"], "submission_started");
        assert_eq!(rows[0]["entity_id"], "sub-1");
    }

    #[tokio::test]
    async fn test_falls_back_to_outbox() {
        let datastore = Arc::new(MemoryDatastore::new());
        datastore
            .fail_inserts(Table::ActivityLogs, InjectedFailure::Unavailable)
            .await;
        let outbox = Arc::new(OutboxActivitySink::new(Arc::new(MemoryKvStore::new())));
        let logger = ActivityLogger::new(Arc::new(DatastoreActivitySink::new(datastore.clone())))
            .with_fallback(outbox.clone());

        logger.record(entry()).await;
        assert_eq!(datastore.count(Table::ActivityLogs).await, 0);
        assert_eq!(outbox.pending().await.unwrap().len(), 1);

        datastore.clear_failures().await;
        assert_eq!(outbox.replay(datastore.as_ref()).await.unwrap(), 1);
        assert_eq!(datastore.count(Table::ActivityLogs).await, 1);
        assert!(outbox.pending().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failing_fallback_is_swallowed() {
        let datastore = Arc::new(MemoryDatastore::new());
        datastore
            .fail_inserts(Table::ActivityLogs, InjectedFailure::Network)
            .await;
        let sink: Arc<dyn ActivitySink> = Arc::new(DatastoreActivitySink::new(datastore.clone()));
        let logger = ActivityLogger::new(sink.clone()).with_fallback(sink);

        logger.record(entry()).await;
        assert_eq!(datastore.count(Table::ActivityLogs).await, 0);
    }

    #[tokio::test]
    async fn test_detached_writes_flush() {
        let datastore = Arc::new(MemoryDatastore::new());
        let logger = ActivityLogger::new(Arc::new(DatastoreActivitySink::new(datastore.clone())));

        for _ in 0..3 {
            logger.record_detached(entry());
        }
        logger.flush().await;
        assert_eq!(datastore.count(Table::ActivityLogs).await, 3);
    }

    #[tokio::test]
    async fn test_finished_detached_writes_are_pruned() {
        let datastore = Arc::new(MemoryDatastore::new());
        let logger = ActivityLogger::new(Arc::new(DatastoreActivitySink::new(datastore.clone())));

        for _ in 0..200 {
            logger.record_detached(entry());
            tokio::task::yield_now().await;
            assert!(logger.detached_in_flight() <= 8);
        }

        logger.flush().await;
        assert_eq!(logger.detached_in_flight(), 0);
        assert_eq!(datastore.count(Table::ActivityLogs).await, 200);
    }
}
