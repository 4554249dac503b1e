//! In-memory Datastore
//!
//! Backs tests and the CLI's `--memory` mode. Supports failure injection
//! per table, artificial latency and users whose writes are denied until
//! they verify.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::Datastore;
use crate::entities::{
    ActivityRow, AssignmentRow, OwnerRow, ProfileRow, PropertyRow, PurchaseRow, SubmissionRow,
    Table,
};
use crate::error::{StoreError, StoreResult};
use intake_core::{ServerId, SubmissionId, UserId};

/// Failure a rule injects
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InjectedFailure {
    /// Row-level security denial
    Authorization,
    /// 503 from the datastore
    Unavailable,
    /// Connection dropped
    Network,
}

impl InjectedFailure {
    fn to_error(self, table: Table) -> StoreError {
        match self {
            InjectedFailure::Authorization => StoreError::authorization(format!(
                "new row violates row-level security policy for table \"{}\"",
                table
            )),
            InjectedFailure::Unavailable => StoreError::Remote {
                status: 503,
                code: None,
                message: format!("{} temporarily unavailable", table),
            },
            InjectedFailure::Network => StoreError::Network("connection reset by peer".to_string()),
        }
    }
}

#[derive(Clone, Debug)]
struct FailureRule {
    table: Table,
    /// Inserts allowed through before the rule fires
    skip: usize,
    failure: InjectedFailure,
}

/// In-memory datastore
#[derive(Clone, Debug, Default)]
pub struct MemoryDatastore {
    tables: Arc<RwLock<HashMap<Table, BTreeMap<String, Value>>>>,
    attempts: Arc<RwLock<HashMap<Table, usize>>>,
    rules: Arc<RwLock<Vec<FailureRule>>>,
    unverified: Arc<RwLock<HashSet<UserId>>>,
    fail_deletes: Arc<RwLock<bool>>,
    latency: Option<Duration>,
}

impl MemoryDatastore {
    /// Create an empty datastore
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every operation by `latency`
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Fail every insert into `table`
    pub async fn fail_inserts(&self, table: Table, failure: InjectedFailure) {
        self.fail_inserts_after(table, 0, failure).await;
    }

    /// Let `skip` inserts into `table` through, fail the rest
    pub async fn fail_inserts_after(&self, table: Table, skip: usize, failure: InjectedFailure) {
        let already = self.attempts.read().await.get(&table).copied().unwrap_or(0);
        self.rules.write().await.push(FailureRule {
            table,
            skip: already + skip,
            failure,
        });
    }

    /// Make compensating deletes fail
    pub async fn fail_deletes(&self, fail: bool) {
        *self.fail_deletes.write().await = fail;
    }

    /// Drop all failure rules
    pub async fn clear_failures(&self) {
        self.rules.write().await.clear();
        *self.fail_deletes.write().await = false;
    }

    /// Deny writes owned by `user` until [`verify_user`](Self::verify_user)
    pub async fn require_verification(&self, user: &UserId) {
        self.unverified.write().await.insert(user.clone());
    }

    /// Mark `user` as verified
    pub async fn verify_user(&self, user: &UserId) {
        self.unverified.write().await.remove(user);
    }

    /// Number of rows in `table`
    pub async fn count(&self, table: Table) -> usize {
        self.tables
            .read()
            .await
            .get(&table)
            .map(|rows| rows.len())
            .unwrap_or(0)
    }

    /// All rows in `table`, ordered by id
    pub async fn rows(&self, table: Table) -> Vec<Value> {
        self.tables
            .read()
            .await
            .get(&table)
            .map(|rows| rows.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Clear all data
    pub async fn clear(&self) {
        self.tables.write().await.clear();
        self.attempts.write().await.clear();
    }

    async fn pause(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }

    async fn check_rules(&self, table: Table) -> StoreResult<()> {
        let attempt = {
            let mut attempts = self.attempts.write().await;
            let counter = attempts.entry(table).or_insert(0);
            let current = *counter;
            *counter += 1;
            current
        };
        let rules = self.rules.read().await;
        match rules.iter().find(|r| r.table == table && attempt >= r.skip) {
            Some(rule) => Err(rule.failure.to_error(table)),
            None => Ok(()),
        }
    }

    async fn check_verified(&self, table: Table, user: &str) -> StoreResult<()> {
        let unverified = self.unverified.read().await;
        if unverified.iter().any(|u| u.as_str() == user) {
            return Err(StoreError::authorization(format!(
                "new row violates row-level security policy for table \"{}\"",
                table
            )));
        }
        Ok(())
    }

    async fn insert_row<R: Serialize + Sync>(
        &self,
        table: Table,
        owner: &str,
        row: &R,
    ) -> StoreResult<ServerId> {
        self.pause().await;
        self.check_rules(table).await?;
        self.check_verified(table, owner).await?;

        let mut value = serde_json::to_value(row)?;
        let id = Uuid::new_v4().to_string();
        if let Some(object) = value.as_object_mut() {
            object.insert("id".to_string(), Value::String(id.clone()));
        }
        self.tables
            .write()
            .await
            .entry(table)
            .or_default()
            .insert(id.clone(), value);
        Ok(ServerId::new(id))
    }

    async fn submission_owner(&self, id: &SubmissionId) -> StoreResult<String> {
        let tables = self.tables.read().await;
        tables
            .get(&Table::Submissions)
            .and_then(|rows| rows.get(id.as_str()))
            .and_then(|row| row.get("user_id"))
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| StoreError::Conflict {
                message: format!(
                    "insert violates foreign key constraint: submission {} does not exist",
                    id
                ),
            })
    }
}

#[async_trait]
impl Datastore for MemoryDatastore {
    async fn insert_submission(&self, row: &SubmissionRow) -> StoreResult<ServerId> {
        self.insert_row(Table::Submissions, row.user_id.as_str(), row).await
    }

    async fn submission_exists(&self, id: &SubmissionId) -> StoreResult<bool> {
        self.pause().await;
        Ok(self
            .tables
            .read()
            .await
            .get(&Table::Submissions)
            .map(|rows| rows.contains_key(id.as_str()))
            .unwrap_or(false))
    }

    async fn delete_submission(&self, id: &SubmissionId) -> StoreResult<()> {
        self.pause().await;
        if *self.fail_deletes.read().await {
            return Err(StoreError::Remote {
                status: 503,
                code: None,
                message: "delete rejected".to_string(),
            });
        }

        let mut tables = self.tables.write().await;
        if let Some(rows) = tables.get_mut(&Table::Submissions) {
            rows.remove(id.as_str());
        }
        for table in [
            Table::Owners,
            Table::Properties,
            Table::Assignments,
            Table::Purchases,
        ] {
            if let Some(rows) = tables.get_mut(&table) {
                rows.retain(|_, row| row.get("submission_id").and_then(|v| v.as_str()) != Some(id.as_str()));
            }
        }
        Ok(())
    }

    async fn upsert_profile(&self, row: &ProfileRow) -> StoreResult<()> {
        self.pause().await;
        self.check_rules(Table::UserProfiles).await?;
        self.check_verified(Table::UserProfiles, row.user_id.as_str()).await?;

        let mut value = serde_json::to_value(row)?;
        if let Some(object) = value.as_object_mut() {
            object.insert("id".to_string(), Value::String(row.user_id.to_string()));
        }
        self.tables
            .write()
            .await
            .entry(Table::UserProfiles)
            .or_default()
            .insert(row.user_id.to_string(), value);
        Ok(())
    }

    async fn insert_owner(&self, row: &OwnerRow) -> StoreResult<ServerId> {
        self.submission_owner(&row.submission_id).await?;
        self.insert_row(Table::Owners, row.user_id.as_str(), row).await
    }

    async fn insert_property(&self, row: &PropertyRow) -> StoreResult<ServerId> {
        self.submission_owner(&row.submission_id).await?;
        self.insert_row(Table::Properties, row.user_id.as_str(), row).await
    }

    async fn insert_assignment(&self, row: &AssignmentRow) -> StoreResult<ServerId> {
        let owner = self.submission_owner(&row.submission_id).await?;
        self.insert_row(Table::Assignments, &owner, row).await
    }

    async fn insert_purchase(&self, row: &PurchaseRow) -> StoreResult<ServerId> {
        self.insert_row(Table::Purchases, row.user_id.as_str(), row).await
    }

    async fn insert_activity(&self, row: &ActivityRow) -> StoreResult<()> {
        let owner = row.user_id.as_ref().map(|u| u.to_string()).unwrap_or_default();
        self.insert_row(Table::ActivityLogs, &owner, row).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use intake_core::fixtures;

    fn header(user: &str) -> SubmissionRow {
        SubmissionRow {
            user_id: UserId::new(user),
            submitted_at: Utc::now(),
            state: Default::default(),
            use_document_retrieval: false,
            owner_count: 1,
            property_count: 1,
        }
    }

    #[tokio::test]
    async fn test_insert_assigns_distinct_ids() {
        let store = MemoryDatastore::new();
        let a = store.insert_submission(&header("u1")).await.unwrap();
        let b = store.insert_submission(&header("u1")).await.unwrap();
        assert_ne!(a, b);
        assert_eq!(store.count(Table::Submissions).await, 2);
        assert!(store.submission_exists(&a.clone().into()).await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_cascades() {
        let store = MemoryDatastore::new();
        let sub: SubmissionId = store.insert_submission(&header("u1")).await.unwrap().into();
        store
            .insert_owner(&OwnerRow {
                submission_id: sub.clone(),
                user_id: UserId::new("u1"),
                owner: fixtures::owner("o1", "Anna", "Bianchi"),
            })
            .await
            .unwrap();
        assert_eq!(store.count(Table::Owners).await, 1);

        store.delete_submission(&sub).await.unwrap();
        assert_eq!(store.count(Table::Submissions).await, 0);
        assert_eq!(store.count(Table::Owners).await, 0);
        assert!(!store.submission_exists(&sub).await.unwrap());
    }

    #[tokio::test]
    async fn test_owner_requires_header() {
        let store = MemoryDatastore::new();
        let err = store
            .insert_owner(&OwnerRow {
                submission_id: SubmissionId::new("missing"),
                user_id: UserId::new("u1"),
                owner: fixtures::owner("o1", "Anna", "Bianchi"),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict { .. }));
        assert!(!err.is_authorization());
    }

    #[tokio::test]
    async fn test_unverified_user_is_denied() {
        let store = MemoryDatastore::new();
        let user = UserId::new("u1");
        store.require_verification(&user).await;

        let err = store.insert_submission(&header("u1")).await.unwrap_err();
        assert!(err.is_authorization());

        store.verify_user(&user).await;
        assert!(store.insert_submission(&header("u1")).await.is_ok());
    }

    #[tokio::test]
    async fn test_fail_after_skip() {
        let store = MemoryDatastore::new();
        store
            .fail_inserts_after(Table::Submissions, 1, InjectedFailure::Unavailable)
            .await;

        assert!(store.insert_submission(&header("u1")).await.is_ok());
        let err = store.insert_submission(&header("u1")).await.unwrap_err();
        assert!(err.is_transient());

        store.clear_failures().await;
        assert!(store.insert_submission(&header("u1")).await.is_ok());
    }

    #[tokio::test]
    async fn test_profile_upsert_is_keyed_on_user() {
        let store = MemoryDatastore::new();
        let row = ProfileRow::from_contact(UserId::new("u1"), &fixtures::contact());
        store.upsert_profile(&row).await.unwrap();
        store.upsert_profile(&row).await.unwrap();
        assert_eq!(store.count(Table::UserProfiles).await, 1);
    }
}
