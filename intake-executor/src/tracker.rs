//! Submission Tracker
//!
//! Durable per-user state machine guarding against duplicate and
//! concurrent submissions:
//!
//! ```text
//! NoSubmission --begin--> InFlight --complete--> Completed
//!                            |
//!                         release
//!                            v
//!                      NoSubmission
//! ```
//!
//! The whole table lives under one key and every mutation is a
//! read-modify-write committed with compare-and-swap, so two processes
//! sharing the same local storage never both win `begin`.

use chrono::{DateTime, Utc};
use intake_core::{SubmissionId, UserId};
use intake_store::{KvStore, StoreError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::TrackerConfig;
use crate::error::{TrackerError, TrackerResult};

const TRACKER_STATE_KEY: &str = "tracker/state";
const FORCE_RETRY_PREFIX: &str = "tracker/force_retry/";

/// Per-user submission state
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SubmissionState {
    NoSubmission,
    InFlight {
        since: DateTime<Utc>,
    },
    Completed {
        submission_id: SubmissionId,
        completed_at: DateTime<Utc>,
    },
}

impl SubmissionState {
    pub fn is_in_flight(&self) -> bool {
        matches!(self, SubmissionState::InFlight { .. })
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
struct TrackerTable {
    #[serde(default)]
    states: BTreeMap<String, SubmissionState>,
    /// Last server submission id per user
    #[serde(default)]
    remembered: BTreeMap<String, SubmissionId>,
}

impl TrackerTable {
    fn is_expired(state: &SubmissionState, now: DateTime<Utc>, config: &TrackerConfig) -> bool {
        match state {
            SubmissionState::InFlight { since } => (now - *since)
                .to_std()
                .map(|elapsed| elapsed > config.in_flight_ttl)
                .unwrap_or(false),
            _ => false,
        }
    }

    fn purge_expired(&mut self, now: DateTime<Utc>, config: &TrackerConfig) -> usize {
        let before = self.states.len();
        self.states
            .retain(|_, state| !Self::is_expired(state, now, config));
        before - self.states.len()
    }

    fn in_flight(&self) -> usize {
        self.states.values().filter(|s| s.is_in_flight()).count()
    }
}

/// Submission tracker
#[derive(Clone)]
pub struct SubmissionTracker {
    kv: Arc<dyn KvStore>,
    config: TrackerConfig,
}

impl SubmissionTracker {
    pub fn new(kv: Arc<dyn KvStore>, config: TrackerConfig) -> Self {
        Self { kv, config }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    async fn load(&self) -> TrackerResult<(Option<Vec<u8>>, TrackerTable)> {
        let raw = self.kv.get(TRACKER_STATE_KEY).await?;
        let table = match &raw {
            Some(bytes) => serde_json::from_slice(bytes).map_err(StoreError::from)?,
            None => TrackerTable::default(),
        };
        Ok((raw, table))
    }

    /// Apply `change` to the latest persisted table and commit it
    async fn mutate<T, F>(&self, change: F) -> TrackerResult<T>
    where
        F: Fn(&mut TrackerTable) -> TrackerResult<T> + Send,
        T: Send,
    {
        for _ in 0..self.config.max_cas_retries {
            let (raw, mut table) = self.load().await?;
            let purged = table.purge_expired(Utc::now(), &self.config);
            if purged > 0 {
                info!(purged, "Purged abandoned in-flight submissions");
            }

            let out = change(&mut table)?;
            let next = serde_json::to_vec(&table).map_err(StoreError::from)?;
            if self
                .kv
                .compare_and_swap(TRACKER_STATE_KEY, raw, Some(next))
                .await?
            {
                return Ok(out);
            }
            debug!("Tracker state changed underneath, retrying");
            tokio::task::yield_now().await;
        }
        Err(TrackerError::Contended {
            attempts: self.config.max_cas_retries,
        })
    }

    /// Current state of `user`
    pub async fn state(&self, user: &UserId) -> TrackerResult<SubmissionState> {
        let (_, table) = self.load().await?;
        let state = table
            .states
            .get(user.as_str())
            .filter(|s| !TrackerTable::is_expired(s, Utc::now(), &self.config))
            .cloned()
            .unwrap_or(SubmissionState::NoSubmission);
        Ok(state)
    }

    /// Last submission id recorded for `user`
    pub async fn remembered_submission(&self, user: &UserId) -> TrackerResult<Option<SubmissionId>> {
        let (_, table) = self.load().await?;
        Ok(table.remembered.get(user.as_str()).cloned())
    }

    /// Users currently in flight, system-wide
    pub async fn in_flight_count(&self) -> TrackerResult<usize> {
        let (_, mut table) = self.load().await?;
        table.purge_expired(Utc::now(), &self.config);
        Ok(table.in_flight())
    }

    /// Move `user` to InFlight
    ///
    /// Refuses a user who is InFlight or Completed; a Completed marker has to
    /// be cleared with [`clear_completed`](Self::clear_completed) first.
    pub async fn begin(&self, user: &UserId) -> TrackerResult<()> {
        let max = self.config.max_concurrent;
        self.mutate(|table| {
            match table.states.get(user.as_str()) {
                Some(SubmissionState::InFlight { .. }) => {
                    return Err(TrackerError::AlreadyInFlight { user: user.clone() });
                }
                Some(SubmissionState::Completed { submission_id, .. }) => {
                    return Err(TrackerError::AlreadyCompleted {
                        submission_id: submission_id.clone(),
                    });
                }
                _ => {}
            }
            let in_flight = table.in_flight();
            if in_flight >= max {
                return Err(TrackerError::CapacityExhausted { in_flight, max });
            }
            table
                .states
                .insert(user.to_string(), SubmissionState::InFlight { since: Utc::now() });
            Ok(())
        })
        .await?;
        debug!(user = %user, "Submission in flight");
        Ok(())
    }

    /// Move `user` to Completed and remember the submission id
    pub async fn complete(&self, user: &UserId, submission_id: &SubmissionId) -> TrackerResult<()> {
        self.mutate(|table| {
            table.states.insert(
                user.to_string(),
                SubmissionState::Completed {
                    submission_id: submission_id.clone(),
                    completed_at: Utc::now(),
                },
            );
            table
                .remembered
                .insert(user.to_string(), submission_id.clone());
            Ok(())
        })
        .await?;
        debug!(user = %user, submission_id = %submission_id, "Submission completed");
        Ok(())
    }

    /// Drop the InFlight entry of a failed attempt
    pub async fn release(&self, user: &UserId) -> TrackerResult<()> {
        self.mutate(|table| {
            if table
                .states
                .get(user.as_str())
                .map(SubmissionState::is_in_flight)
                .unwrap_or(false)
            {
                table.states.remove(user.as_str());
            }
            Ok(())
        })
        .await?;
        debug!(user = %user, "Submission released");
        Ok(())
    }

    /// Forget a Completed marker and the remembered id
    pub async fn clear_completed(&self, user: &UserId) -> TrackerResult<()> {
        self.mutate(|table| {
            if matches!(
                table.states.get(user.as_str()),
                Some(SubmissionState::Completed { .. })
            ) {
                table.states.remove(user.as_str());
            }
            table.remembered.remove(user.as_str());
            Ok(())
        })
        .await?;
        debug!(user = %user, "Completed marker cleared");
        Ok(())
    }

    fn force_retry_key(user: &UserId) -> String {
        format!("{}{}", FORCE_RETRY_PREFIX, user)
    }

    /// Flag that the next attempt must ignore a Completed marker
    pub async fn mark_force_retry(&self, user: &UserId) -> TrackerResult<()> {
        self.kv
            .put(&Self::force_retry_key(user), Utc::now().to_rfc3339().into_bytes())
            .await?;
        Ok(())
    }

    pub async fn force_retry_requested(&self, user: &UserId) -> TrackerResult<bool> {
        Ok(self.kv.get(&Self::force_retry_key(user)).await?.is_some())
    }

    pub async fn clear_force_retry(&self, user: &UserId) -> TrackerResult<()> {
        self.kv.remove(&Self::force_retry_key(user)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use intake_store::{MemoryKvStore, SledKvStore};
    use std::time::Duration;
    use tempfile::tempdir;

    fn tracker() -> SubmissionTracker {
        SubmissionTracker::new(Arc::new(MemoryKvStore::new()), TrackerConfig::default())
    }

    #[tokio::test]
    async fn test_lifecycle() {
        let tracker = tracker();
        let user = UserId::new("u1");
        let id = SubmissionId::new("sub-1");

        assert_eq!(tracker.state(&user).await.unwrap(), SubmissionState::NoSubmission);
        tracker.begin(&user).await.unwrap();
        assert!(tracker.state(&user).await.unwrap().is_in_flight());

        tracker.complete(&user, &id).await.unwrap();
        assert!(matches!(
            tracker.state(&user).await.unwrap(),
            SubmissionState::Completed { ref submission_id, .. } if submission_id == &id
        ));
        assert_eq!(tracker.remembered_submission(&user).await.unwrap(), Some(id));

        tracker.clear_completed(&user).await.unwrap();
        assert_eq!(tracker.state(&user).await.unwrap(), SubmissionState::NoSubmission);
        assert_eq!(tracker.remembered_submission(&user).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_begin_twice_is_rejected() {
        let tracker = tracker();
        let user = UserId::new("u1");
        tracker.begin(&user).await.unwrap();
        assert_eq!(
            tracker.begin(&user).await.unwrap_err(),
            TrackerError::AlreadyInFlight { user: user.clone() }
        );

        tracker.release(&user).await.unwrap();
        assert!(tracker.begin(&user).await.is_ok());
    }

    #[tokio::test]
    async fn test_capacity_is_three() {
        let tracker = tracker();
        for user in ["u1", "u2", "u3"] {
            tracker.begin(&UserId::new(user)).await.unwrap();
        }
        assert_eq!(
            tracker.begin(&UserId::new("u4")).await.unwrap_err(),
            TrackerError::CapacityExhausted { in_flight: 3, max: 3 }
        );

        tracker.complete(&UserId::new("u1"), &SubmissionId::new("s1")).await.unwrap();
        assert!(tracker.begin(&UserId::new("u4")).await.is_ok());
    }

    #[tokio::test]
    async fn test_begin_refuses_completed_user() {
        let tracker = tracker();
        let user = UserId::new("u1");
        let id = SubmissionId::new("sub-1");
        tracker.begin(&user).await.unwrap();
        tracker.complete(&user, &id).await.unwrap();

        assert_eq!(
            tracker.begin(&user).await.unwrap_err(),
            TrackerError::AlreadyCompleted {
                submission_id: id.clone()
            }
        );
        assert!(matches!(
            tracker.state(&user).await.unwrap(),
            SubmissionState::Completed { .. }
        ));

        tracker.clear_completed(&user).await.unwrap();
        assert!(tracker.begin(&user).await.is_ok());
    }

    #[tokio::test]
    async fn test_abandoned_entries_expire() {
        let config = TrackerConfig::default().with_in_flight_ttl(Duration::from_millis(10));
        let tracker = SubmissionTracker::new(Arc::new(MemoryKvStore::new()), config);
        let user = UserId::new("u1");

        tracker.begin(&user).await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;

        assert_eq!(tracker.state(&user).await.unwrap(), SubmissionState::NoSubmission);
        assert_eq!(tracker.in_flight_count().await.unwrap(), 0);
        assert!(tracker.begin(&user).await.is_ok());
    }

    #[tokio::test]
    async fn test_two_handles_share_state() {
        let kv = MemoryKvStore::new();
        let a = SubmissionTracker::new(Arc::new(kv.clone()), TrackerConfig::default());
        let b = SubmissionTracker::new(Arc::new(kv), TrackerConfig::default());
        let user = UserId::new("u1");

        a.begin(&user).await.unwrap();
        assert!(matches!(
            b.begin(&user).await,
            Err(TrackerError::AlreadyInFlight { .. })
        ));
    }

    #[tokio::test]
    async fn test_concurrent_begin_has_one_winner() {
        let tracker = tracker();
        let user = UserId::new("u1");
        let (first, second) = tokio::join!(tracker.begin(&user), tracker.begin(&user));
        assert!(first.is_ok() ^ second.is_ok());
    }

    #[tokio::test]
    async fn test_force_retry_flag() {
        let tracker = tracker();
        let user = UserId::new("u1");
        assert!(!tracker.force_retry_requested(&user).await.unwrap());
        tracker.mark_force_retry(&user).await.unwrap();
        assert!(tracker.force_retry_requested(&user).await.unwrap());
        tracker.clear_force_retry(&user).await.unwrap();
        assert!(!tracker.force_retry_requested(&user).await.unwrap());
    }

    #[tokio::test]
    async fn test_state_survives_reopen() {
        let dir = tempdir().unwrap();
        let user = UserId::new("u1");
        {
            let kv = SledKvStore::open(dir.path()).unwrap();
            let tracker = SubmissionTracker::new(Arc::new(kv), TrackerConfig::default());
            tracker.begin(&user).await.unwrap();
            tracker.complete(&user, &SubmissionId::new("sub-9")).await.unwrap();
        }
        let kv = SledKvStore::open(dir.path()).unwrap();
        let tracker = SubmissionTracker::new(Arc::new(kv), TrackerConfig::default());
        assert_eq!(
            tracker.remembered_submission(&user).await.unwrap(),
            Some(SubmissionId::new("sub-9"))
        );
    }
}
