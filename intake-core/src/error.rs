//! Intake Error Codes
//!
//! Error code format: INTAKE-{area}-{sequence}
//! - INTAKE-VAL: Graph validation (see [`GraphViolation`])
//! - INTAKE-OCC: Occupancy allocation (see `OccupancyViolation`)
//! - INTAKE-MAP: Identifier reconciliation

use crate::types::EntityKind;
use crate::validation::GraphViolation;
use thiserror::Error;

/// Intake Result type
pub type IntakeResult<T> = Result<T, IntakeError>;

/// Intake Error type
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IntakeError {
    /// Graph failed validation
    #[error("{0}")]
    Validation(#[from] GraphViolation),

    /// [INTAKE-MAP-001] Local id already mapped to another server id
    #[error("[INTAKE-MAP-001] {kind} {local_id} already mapped to {existing}, refusing {attempted}")]
    DuplicateMapping {
        kind: EntityKind,
        local_id: String,
        existing: String,
        attempted: String,
    },

    /// [INTAKE-MAP-002] No server id recorded for a local id
    #[error("[INTAKE-MAP-002] {kind} {local_id} has no server identifier in this attempt")]
    UnresolvedReference { kind: EntityKind, local_id: String },

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for IntakeError {
    fn from(err: serde_json::Error) -> Self {
        IntakeError::Serialization(err.to_string())
    }
}
