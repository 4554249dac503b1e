//! Intake Core - Domain Model and Pure Validation
//!
//! The wizard collects a graph of Owners, Properties and Owner-Property
//! Assignments. This crate holds everything about that graph that needs no
//! I/O:
//!
//! - **Types**: [`Owner`], [`Property`], [`Assignment`], [`IntakeGraph`] and
//!   the id newtypes ([`LocalId`], [`ServerId`], [`UserId`], [`SubmissionId`])
//! - **Occupancy**: allocation validation and legacy-input normalization
//! - **Validation**: ordered, deterministic checks over the whole graph
//! - **Reconciliation**: per-attempt local id -> server id map
//!
//! Persistence lives in `intake-store`, the write protocol in
//! `intake-executor`.

pub mod error;
pub mod fixtures;
pub mod occupancy;
pub mod reconcile;
pub mod types;
pub mod validation;

pub use error::{IntakeError, IntakeResult};
pub use occupancy::{
    normalize, validate_allocations, OccupancySummary, OccupancyViolation, RawAllocation,
    MONTHS_PER_YEAR,
};
pub use reconcile::ReconciliationMap;
pub use types::*;
pub use validation::{
    validate_assignment, validate_graph, validate_owner, validate_property, FieldIssue,
    GraphViolation, ValidationReport, ValidationWarning,
};

/// Intake core version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_graph_round_trips_through_json() {
        let graph = fixtures::two_owners_one_rental();
        let json = serde_json::to_string(&graph).unwrap();
        let back: IntakeGraph = serde_json::from_str(&json).unwrap();
        assert_eq!(back, graph);
    }

    #[test]
    fn test_validation_error_converts() {
        let err: IntakeError = GraphViolation::NoOwners.into();
        assert!(err.to_string().starts_with("[INTAKE-VAL-001]"));
    }
}
