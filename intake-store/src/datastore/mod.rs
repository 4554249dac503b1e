//! Datastore Port
//!
//! The remote relational store a submission is written to. Every insert
//! returns the server-assigned id; rows may be rejected by row-level
//! authorization, surfaced as [`StoreError::Authorization`](crate::StoreError).

pub mod memory;
pub mod rest;

use async_trait::async_trait;
use intake_core::{ServerId, SubmissionId};

use crate::entities::{
    ActivityRow, AssignmentRow, OwnerRow, ProfileRow, PropertyRow, PurchaseRow, SubmissionRow,
};
use crate::error::StoreResult;

pub use memory::{InjectedFailure, MemoryDatastore};
pub use rest::{RestConfig, RestDatastore};

/// Datastore interface
#[async_trait]
pub trait Datastore: Send + Sync {
    // ==================== Submission ====================

    /// Insert the submission header
    async fn insert_submission(&self, row: &SubmissionRow) -> StoreResult<ServerId>;

    /// Whether a submission header still exists
    async fn submission_exists(&self, id: &SubmissionId) -> StoreResult<bool>;

    /// Delete a submission header and everything hanging off it
    async fn delete_submission(&self, id: &SubmissionId) -> StoreResult<()>;

    // ==================== Graph ====================

    /// Insert or update the profile keyed on `user_id`
    async fn upsert_profile(&self, row: &ProfileRow) -> StoreResult<()>;

    async fn insert_owner(&self, row: &OwnerRow) -> StoreResult<ServerId>;

    async fn insert_property(&self, row: &PropertyRow) -> StoreResult<ServerId>;

    async fn insert_assignment(&self, row: &AssignmentRow) -> StoreResult<ServerId>;

    // ==================== Billing / Audit ====================

    async fn insert_purchase(&self, row: &PurchaseRow) -> StoreResult<ServerId>;

    async fn insert_activity(&self, row: &ActivityRow) -> StoreResult<()>;
}
