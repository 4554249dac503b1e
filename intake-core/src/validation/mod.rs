//! Entity Graph Validation
//!
//! Validates the Owner / Property / Assignment graph as a whole. Rules are
//! evaluated in a fixed order and the first violation is reported, so the
//! same graph always produces the same message:
//!
//! 1. at least one owner
//! 2. every owner well-formed, local ids unique
//! 3. at least one property
//! 4. every property well-formed (occupancy included), local ids unique
//! 5. every assignment well-formed and pointing at known entities, and
//!    every property assigned at least once
//! 6. no property owned more than 100%
//!
//! Under-allocation (< 100%) is reported as a warning, never a violation.

mod entity;

pub use entity::{validate_assignment, validate_owner, validate_property, FieldIssue};

use crate::types::{EntityKind, IntakeGraph, LocalId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// First rule a graph violates
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum GraphViolation {
    /// [INTAKE-VAL-001] No owners
    #[error("[INTAKE-VAL-001] at least one owner is required")]
    NoOwners,

    /// [INTAKE-VAL-002] Owner not well-formed
    #[error("[INTAKE-VAL-002] owner {owner_id}: {issue}")]
    InvalidOwner { owner_id: LocalId, issue: FieldIssue },

    /// [INTAKE-VAL-003] No properties
    #[error("[INTAKE-VAL-003] at least one property is required")]
    NoProperties,

    /// [INTAKE-VAL-004] Property not well-formed
    #[error("[INTAKE-VAL-004] property {property_id} ({label}): {issue}")]
    InvalidProperty {
        property_id: LocalId,
        label: String,
        issue: FieldIssue,
    },

    /// [INTAKE-VAL-005] Same local id used twice
    #[error("[INTAKE-VAL-005] {kind} id {local_id} is used more than once")]
    DuplicateLocalId { kind: EntityKind, local_id: LocalId },

    /// [INTAKE-VAL-006] Assignment not well-formed
    #[error("[INTAKE-VAL-006] assignment of owner {owner_id} to property {property_id}: {issue}")]
    InvalidAssignment {
        owner_id: LocalId,
        property_id: LocalId,
        issue: FieldIssue,
    },

    /// [INTAKE-VAL-007] Assignment points at an entity not in the graph
    #[error("[INTAKE-VAL-007] assignment references unknown {kind} {local_id}")]
    DanglingReference { kind: EntityKind, local_id: LocalId },

    /// [INTAKE-VAL-008] Property without any owner
    #[error("[INTAKE-VAL-008] property {property_id} ({label}) has no owner assigned")]
    UnassignedProperty { property_id: LocalId, label: String },

    /// [INTAKE-VAL-009] Ownership above 100%
    #[error("[INTAKE-VAL-009] property {property_id} ({label}) is {total}% owned, more than 100%")]
    OwnershipExceeded {
        property_id: LocalId,
        label: String,
        total: Decimal,
    },
}

impl GraphViolation {
    /// Stable error code
    pub fn code(&self) -> &'static str {
        match self {
            GraphViolation::NoOwners => "INTAKE-VAL-001",
            GraphViolation::InvalidOwner { .. } => "INTAKE-VAL-002",
            GraphViolation::NoProperties => "INTAKE-VAL-003",
            GraphViolation::InvalidProperty { .. } => "INTAKE-VAL-004",
            GraphViolation::DuplicateLocalId { .. } => "INTAKE-VAL-005",
            GraphViolation::InvalidAssignment { .. } => "INTAKE-VAL-006",
            GraphViolation::DanglingReference { .. } => "INTAKE-VAL-007",
            GraphViolation::UnassignedProperty { .. } => "INTAKE-VAL-008",
            GraphViolation::OwnershipExceeded { .. } => "INTAKE-VAL-009",
        }
    }
}

/// Non-blocking finding
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "warning", rename_all = "snake_case")]
pub enum ValidationWarning {
    /// Ownership shares add up to less than 100%
    UnderAllocated { property_id: LocalId, total: Decimal },
    /// 0% and not resident
    EmptyAssignment {
        owner_id: LocalId,
        property_id: LocalId,
    },
    /// Owner not linked to any property
    UnassignedOwner { owner_id: LocalId },
}

impl std::fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationWarning::UnderAllocated { property_id, total } => {
                write!(f, "property {} is only {}% owned", property_id, total)
            }
            ValidationWarning::EmptyAssignment {
                owner_id,
                property_id,
            } => write!(
                f,
                "owner {} holds 0% of property {} and does not live there",
                owner_id, property_id
            ),
            ValidationWarning::UnassignedOwner { owner_id } => {
                write!(f, "owner {} is not assigned to any property", owner_id)
            }
        }
    }
}

/// Outcome of a passing validation
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub owners: usize,
    pub properties: usize,
    pub assignments: usize,
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationReport {
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}

/// Validate the whole graph
pub fn validate_graph(graph: &IntakeGraph) -> Result<ValidationReport, GraphViolation> {
    // 1-2
    if graph.owners.is_empty() {
        return Err(GraphViolation::NoOwners);
    }
    let mut owner_ids: HashSet<&LocalId> = HashSet::new();
    for owner in &graph.owners {
        validate_owner(owner).map_err(|issue| GraphViolation::InvalidOwner {
            owner_id: owner.local_id.clone(),
            issue,
        })?;
        if !owner_ids.insert(&owner.local_id) {
            return Err(GraphViolation::DuplicateLocalId {
                kind: EntityKind::Owner,
                local_id: owner.local_id.clone(),
            });
        }
    }

    // 3-4
    if graph.properties.is_empty() {
        return Err(GraphViolation::NoProperties);
    }
    let mut property_ids: HashSet<&LocalId> = HashSet::new();
    for property in &graph.properties {
        validate_property(property).map_err(|issue| GraphViolation::InvalidProperty {
            property_id: property.local_id.clone(),
            label: property.display_name(),
            issue,
        })?;
        if !property_ids.insert(&property.local_id) {
            return Err(GraphViolation::DuplicateLocalId {
                kind: EntityKind::Property,
                local_id: property.local_id.clone(),
            });
        }
    }

    // 5
    let mut totals: HashMap<&LocalId, Decimal> = HashMap::new();
    let mut assigned_owners: HashSet<&LocalId> = HashSet::new();
    let mut warnings = Vec::new();
    for assignment in &graph.assignments {
        validate_assignment(assignment).map_err(|issue| GraphViolation::InvalidAssignment {
            owner_id: assignment.owner_id.clone(),
            property_id: assignment.property_id.clone(),
            issue,
        })?;
        if !owner_ids.contains(&assignment.owner_id) {
            return Err(GraphViolation::DanglingReference {
                kind: EntityKind::Owner,
                local_id: assignment.owner_id.clone(),
            });
        }
        if !property_ids.contains(&assignment.property_id) {
            return Err(GraphViolation::DanglingReference {
                kind: EntityKind::Property,
                local_id: assignment.property_id.clone(),
            });
        }

        *totals.entry(&assignment.property_id).or_insert(Decimal::ZERO) +=
            assignment.ownership_percentage;
        assigned_owners.insert(&assignment.owner_id);

        if assignment.is_empty_link() {
            warnings.push(ValidationWarning::EmptyAssignment {
                owner_id: assignment.owner_id.clone(),
                property_id: assignment.property_id.clone(),
            });
        }
    }

    for property in &graph.properties {
        if !totals.contains_key(&property.local_id) {
            return Err(GraphViolation::UnassignedProperty {
                property_id: property.local_id.clone(),
                label: property.display_name(),
            });
        }
    }

    // 6
    for property in &graph.properties {
        let total = totals
            .get(&property.local_id)
            .copied()
            .unwrap_or(Decimal::ZERO);
        if total > Decimal::ONE_HUNDRED {
            return Err(GraphViolation::OwnershipExceeded {
                property_id: property.local_id.clone(),
                label: property.display_name(),
                total,
            });
        }
        if total < Decimal::ONE_HUNDRED {
            warnings.push(ValidationWarning::UnderAllocated {
                property_id: property.local_id.clone(),
                total,
            });
        }
    }

    for owner in &graph.owners {
        if !assigned_owners.contains(&owner.local_id) {
            warnings.push(ValidationWarning::UnassignedOwner {
                owner_id: owner.local_id.clone(),
            });
        }
    }

    Ok(ValidationReport {
        owners: graph.owners.len(),
        properties: graph.properties.len(),
        assignments: graph.assignments.len(),
        warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use crate::types::*;

    fn pct(v: i64) -> Decimal {
        Decimal::new(v, 0)
    }

    #[test]
    fn test_reference_graph_passes() {
        let report = validate_graph(&fixtures::two_owners_one_rental()).unwrap();
        assert_eq!(report.owners, 2);
        assert_eq!(report.properties, 1);
        assert_eq!(report.assignments, 2);
        assert!(report.is_clean());
    }

    #[test]
    fn test_empty_graph_reports_owners_first() {
        assert_eq!(
            validate_graph(&IntakeGraph::default()),
            Err(GraphViolation::NoOwners)
        );
    }

    #[test]
    fn test_rule_order_owner_before_property() {
        let mut graph = fixtures::two_owners_one_rental();
        graph.owners[1].tax_id.clear();
        graph.properties[0].occupancy[0].months = 11;
        let err = validate_graph(&graph).unwrap_err();
        assert_eq!(err.code(), "INTAKE-VAL-002");
    }

    #[test]
    fn test_no_properties() {
        let mut graph = fixtures::two_owners_one_rental();
        graph.properties.clear();
        graph.assignments.clear();
        assert_eq!(validate_graph(&graph), Err(GraphViolation::NoProperties));
    }

    #[test]
    fn test_eleven_months_fails() {
        let mut graph = fixtures::two_owners_one_rental();
        graph.properties[0].occupancy[0].months = 11;
        match validate_graph(&graph) {
            Err(GraphViolation::InvalidProperty { property_id, issue, .. }) => {
                assert_eq!(property_id.as_str(), "prop-1");
                assert_eq!(issue.field, "occupancy");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_unassigned_property_named() {
        let mut graph = fixtures::two_owners_one_rental();
        let mut second = graph.properties[0].clone();
        second.local_id = LocalId::new("prop-2");
        second.label = "Rustico".into();
        graph.properties.push(second);

        let err = validate_graph(&graph).unwrap_err();
        assert_eq!(
            err,
            GraphViolation::UnassignedProperty {
                property_id: LocalId::new("prop-2"),
                label: "Rustico".into(),
            }
        );
        assert!(err.to_string().contains("prop-2"));
    }

    #[test]
    fn test_ownership_boundaries() {
        for (a, b, ok) in [(60, 40, true), (50, 40, true), (60, 41, false), (100, 1, false)] {
            let mut graph = fixtures::two_owners_one_rental();
            graph.assignments[0].ownership_percentage = pct(a);
            graph.assignments[1].ownership_percentage = pct(b);
            assert_eq!(validate_graph(&graph).is_ok(), ok, "{} + {}", a, b);
        }
    }

    #[test]
    fn test_under_allocation_is_warning() {
        let mut graph = fixtures::two_owners_one_rental();
        graph.assignments[1].ownership_percentage = pct(10);
        let report = validate_graph(&graph).unwrap();
        assert_eq!(
            report.warnings,
            vec![ValidationWarning::UnderAllocated {
                property_id: LocalId::new("prop-1"),
                total: pct(70),
            }]
        );
    }

    #[test]
    fn test_zero_percent_link_is_valid_with_warning() {
        let mut graph = fixtures::two_owners_one_rental();
        graph.assignments[0].ownership_percentage = pct(100);
        graph.assignments[1].ownership_percentage = pct(0);
        let report = validate_graph(&graph).unwrap();
        assert!(report
            .warnings
            .iter()
            .any(|w| matches!(w, ValidationWarning::EmptyAssignment { .. })));
    }

    #[test]
    fn test_dangling_owner_reference() {
        let mut graph = fixtures::two_owners_one_rental();
        graph.assignments[0].owner_id = LocalId::new("ghost");
        assert_eq!(
            validate_graph(&graph),
            Err(GraphViolation::DanglingReference {
                kind: EntityKind::Owner,
                local_id: LocalId::new("ghost"),
            })
        );
    }

    #[test]
    fn test_duplicate_owner_ids() {
        let mut graph = fixtures::two_owners_one_rental();
        graph.owners[1].local_id = graph.owners[0].local_id.clone();
        assert_eq!(validate_graph(&graph).unwrap_err().code(), "INTAKE-VAL-005");
    }
}
