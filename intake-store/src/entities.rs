//! Datastore Rows
//!
//! Row shapes written to the remote datastore. Owners and Properties are
//! flattened into their rows; nested values (addresses, allocations) are
//! stored as JSON columns.

use chrono::{DateTime, NaiveDate, Utc};
use intake_core::{ContactInfo, Owner, Property, ServerId, SubmissionId, UserId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Tables the engine writes to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    Submissions,
    UserProfiles,
    Owners,
    Properties,
    Assignments,
    Purchases,
    ActivityLogs,
}

impl Table {
    pub fn name(&self) -> &'static str {
        match self {
            Table::Submissions => "submissions",
            Table::UserProfiles => "user_profiles",
            Table::Owners => "owners",
            Table::Properties => "properties",
            Table::Assignments => "owner_property_assignments",
            Table::Purchases => "purchases",
            Table::ActivityLogs => "activity_logs",
        }
    }
}

impl std::fmt::Display for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Submission state
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionState {
    #[default]
    Submitted,
    InReview,
    Completed,
}

/// Submission header row
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SubmissionRow {
    pub user_id: UserId,
    pub submitted_at: DateTime<Utc>,
    pub state: SubmissionState,
    pub use_document_retrieval: bool,
    pub owner_count: usize,
    pub property_count: usize,
}

/// User profile row, upserted on `user_id`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProfileRow {
    pub user_id: UserId,
    pub email: String,
    pub phone: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl ProfileRow {
    pub fn from_contact(user_id: UserId, contact: &ContactInfo) -> Self {
        Self {
            user_id,
            email: contact.email.trim().to_string(),
            phone: contact.phone.clone(),
            first_name: contact.first_name.clone(),
            last_name: contact.last_name.clone(),
            updated_at: Utc::now(),
        }
    }
}

/// Owner row
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OwnerRow {
    pub submission_id: SubmissionId,
    pub user_id: UserId,
    #[serde(flatten)]
    pub owner: Owner,
}

/// Property row
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PropertyRow {
    pub submission_id: SubmissionId,
    pub user_id: UserId,
    #[serde(flatten)]
    pub property: Property,
}

/// Assignment row, referencing server ids only
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AssignmentRow {
    pub submission_id: SubmissionId,
    pub owner_id: ServerId,
    pub property_id: ServerId,
    pub ownership_percentage: Decimal,
    pub resident_at_property: bool,
    pub residency_from: Option<NaiveDate>,
    pub residency_to: Option<NaiveDate>,
    pub tax_credit: Option<Decimal>,
}

/// Payment status of a purchase
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Paid,
    Failed,
}

/// Billing row
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PurchaseRow {
    pub submission_id: SubmissionId,
    pub user_id: UserId,
    pub amount: Decimal,
    pub currency: String,
    pub payment_status: PaymentStatus,
    pub property_count: usize,
    pub created_at: DateTime<Utc>,
}

/// Audit row
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActivityRow {
    pub user_id: Option<UserId>,
    pub event_type: String,
    pub description: String,
    pub entity_type: Option<String>,
    pub entity_id: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}
