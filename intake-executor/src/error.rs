//! Intake Executor Error Types

use intake_core::{EntityKind, GraphViolation, IntakeError, SubmissionId, UserId};
use intake_store::StoreError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Submission Result type
pub type SubmissionResult<T> = Result<T, SubmissionError>;

/// Tracker Result type
pub type TrackerResult<T> = Result<T, TrackerError>;

/// Protocol step, used to report where an attempt stopped
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStep {
    Guard,
    Header,
    Profile,
    Owners,
    Properties,
    Assignments,
    Purchase,
    Complete,
    ClearPending,
}

impl SubmissionStep {
    pub fn name(&self) -> &'static str {
        match self {
            SubmissionStep::Guard => "guard",
            SubmissionStep::Header => "header",
            SubmissionStep::Profile => "profile",
            SubmissionStep::Owners => "owners",
            SubmissionStep::Properties => "properties",
            SubmissionStep::Assignments => "assignments",
            SubmissionStep::Purchase => "purchase",
            SubmissionStep::Complete => "complete",
            SubmissionStep::ClearPending => "clear_pending",
        }
    }
}

impl std::fmt::Display for SubmissionStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Submission Tracker Error
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TrackerError {
    #[error("[INTAKE-TRK-001] A submission is already in flight for user {user}")]
    AlreadyInFlight { user: UserId },

    #[error("[INTAKE-TRK-002] Too many submissions in flight ({in_flight}/{max})")]
    CapacityExhausted { in_flight: usize, max: usize },

    /// Compare-and-swap kept losing to other writers
    #[error("[INTAKE-TRK-003] Tracker state contended after {attempts} attempts")]
    Contended { attempts: u32 },

    #[error("[INTAKE-TRK-004] Tracker storage error: {0}")]
    Store(#[from] StoreError),

    /// The user already has a completed submission on record
    #[error("[INTAKE-TRK-005] Submission {submission_id} already completed")]
    AlreadyCompleted { submission_id: SubmissionId },
}

/// Submission Error
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SubmissionError {
    /// Graph rejected before any network call
    #[error("{0}")]
    Validation(GraphViolation),

    /// No user yet, or the datastore denied a write until the user verifies
    #[error("[INTAKE-SUB-001] Authorization pending: {reason}")]
    AuthorizationPending { reason: String },

    #[error("[INTAKE-SUB-002] Unresolved reference: {kind} {local_id}")]
    UnresolvedReference { kind: EntityKind, local_id: String },

    /// Another attempt holds the tracker
    #[error("[INTAKE-SUB-003] Duplicate attempt: {reason}")]
    DuplicateAttempt { reason: String },

    #[error("[INTAKE-SUB-004] Remote failure during {step}: {message}")]
    TransientRemote { step: SubmissionStep, message: String },

    #[error("[INTAKE-SUB-005] {0}")]
    Tracker(#[from] TrackerError),

    #[error("[INTAKE-SUB-006] Internal error: {0}")]
    Internal(String),
}

impl SubmissionError {
    /// Create an authorization pending error
    pub fn authorization_pending(reason: impl Into<String>) -> Self {
        Self::AuthorizationPending {
            reason: reason.into(),
        }
    }

    /// Create a duplicate attempt error
    pub fn duplicate_attempt(reason: impl Into<String>) -> Self {
        Self::DuplicateAttempt {
            reason: reason.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Classify a datastore failure at `step`
    pub fn from_store(step: SubmissionStep, err: StoreError) -> Self {
        if err.is_authorization() {
            Self::AuthorizationPending {
                reason: format!("{} write denied: {}", step, err),
            }
        } else {
            Self::TransientRemote {
                step,
                message: err.to_string(),
            }
        }
    }

    /// A later attempt with the same input may succeed
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            SubmissionError::AuthorizationPending { .. }
                | SubmissionError::DuplicateAttempt { .. }
                | SubmissionError::TransientRemote { .. }
                | SubmissionError::Tracker(_)
        )
    }

    /// Text for the person filling in the wizard
    pub fn user_message(&self) -> String {
        match self {
            SubmissionError::Validation(violation) => {
                format!("Please review your answers: {}", violation)
            }
            SubmissionError::AuthorizationPending { .. } => {
                "Please confirm your email address, then submit again. Your answers have been saved."
                    .to_string()
            }
            SubmissionError::DuplicateAttempt { .. } => {
                "Your submission is already being processed. Please wait a moment and refresh."
                    .to_string()
            }
            SubmissionError::TransientRemote { .. } | SubmissionError::Tracker(_) => {
                "We could not save your submission. Your answers have been kept, please try again."
                    .to_string()
            }
            SubmissionError::UnresolvedReference { .. } | SubmissionError::Internal(_) => {
                "Something went wrong while saving your submission. Please contact support."
                    .to_string()
            }
        }
    }
}

impl From<IntakeError> for SubmissionError {
    fn from(err: IntakeError) -> Self {
        match err {
            IntakeError::Validation(violation) => Self::Validation(violation),
            IntakeError::UnresolvedReference { kind, local_id } => {
                Self::UnresolvedReference { kind, local_id }
            }
            other => Self::Internal(other.to_string()),
        }
    }
}
