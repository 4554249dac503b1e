//! Per-entity validation
//!
//! Each check returns the first offending field. The wizard runs these on
//! every step transition, the graph validator runs them all before submit.

use crate::occupancy::{validate_allocations, OccupancySummary};
use crate::types::{Assignment, Owner, Property, ResidencyFlag};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A single field that failed validation
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldIssue {
    pub field: String,
    pub reason: String,
}

impl FieldIssue {
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }

    fn required(field: &str) -> Self {
        Self::new(field, "is required")
    }
}

impl std::fmt::Display for FieldIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.field, self.reason)
    }
}

fn require_text(value: &str, field: &str) -> Result<(), FieldIssue> {
    if value.trim().is_empty() {
        Err(FieldIssue::required(field))
    } else {
        Ok(())
    }
}

fn require_positive(value: Option<Decimal>, field: &str) -> Result<(), FieldIssue> {
    match value {
        None => Err(FieldIssue::required(field)),
        Some(v) if v <= Decimal::ZERO => Err(FieldIssue::new(field, "must be greater than zero")),
        Some(_) => Ok(()),
    }
}

/// Validate a single owner
pub fn validate_owner(owner: &Owner) -> Result<(), FieldIssue> {
    require_text(&owner.first_name, "first_name")?;
    require_text(&owner.last_name, "last_name")?;
    if owner.date_of_birth.is_none() {
        return Err(FieldIssue::required("date_of_birth"));
    }
    require_text(&owner.country_of_birth, "country_of_birth")?;
    require_text(&owner.citizenship, "citizenship")?;
    require_text(&owner.address.street, "address.street")?;
    require_text(&owner.address.city, "address.city")?;
    require_text(&owner.address.zip, "address.zip")?;
    require_text(&owner.address.country, "address.country")?;
    require_text(&owner.tax_id, "tax_id")?;

    if owner.italian_resident == ResidencyFlag::No {
        let details = owner
            .residency_details
            .as_ref()
            .ok_or_else(|| FieldIssue::new("residency_details", "is required for non-residents"))?;
        require_text(&details.comune, "residency_details.comune")?;
        require_text(&details.address, "residency_details.address")?;
        if details.spent_over_183_days.is_none() {
            return Err(FieldIssue::required("residency_details.spent_over_183_days"));
        }
    }

    Ok(())
}

/// Validate a single property, including its occupancy allocations
pub fn validate_property(property: &Property) -> Result<OccupancySummary, FieldIssue> {
    require_text(&property.address.comune, "address.comune")?;
    require_text(&property.address.province, "address.province")?;
    require_text(&property.address.street, "address.street")?;
    require_text(&property.address.zip, "address.zip")?;

    if property.activity_2024.implies_purchase() {
        if property.purchase_date.is_none() {
            return Err(FieldIssue::required("purchase_date"));
        }
        require_positive(property.purchase_price, "purchase_price")?;
    }
    if property.activity_2024.implies_sale() {
        if property.sale_date.is_none() {
            return Err(FieldIssue::required("sale_date"));
        }
        require_positive(property.sale_price, "sale_price")?;
    }
    if let (Some(bought), Some(sold)) = (property.purchase_date, property.sale_date) {
        if sold < bought {
            return Err(FieldIssue::new("sale_date", "precedes purchase_date"));
        }
    }

    let summary = validate_allocations(&property.occupancy)
        .map_err(|violation| FieldIssue::new("occupancy", violation.to_string()))?;

    if property.has_rental_occupancy() {
        require_positive(property.rental_income, "rental_income").map_err(|issue| {
            FieldIssue::new(
                issue.field,
                format!("{} when the property is rented", issue.reason),
            )
        })?;
    }

    Ok(summary)
}

/// Validate the fields of a single assignment
pub fn validate_assignment(assignment: &Assignment) -> Result<(), FieldIssue> {
    let pct = assignment.ownership_percentage;
    if pct < Decimal::ZERO || pct > Decimal::ONE_HUNDRED {
        return Err(FieldIssue::new(
            "ownership_percentage",
            format!("must be between 0 and 100, got {}", pct),
        ));
    }
    if let (Some(from), Some(to)) = (assignment.residency_from, assignment.residency_to) {
        if to < from {
            return Err(FieldIssue::new("residency_to", "precedes residency_from"));
        }
    }
    if let Some(credit) = assignment.tax_credit {
        if credit < Decimal::ZERO {
            return Err(FieldIssue::new("tax_credit", "must not be negative"));
        }
    }
    Ok(())
}
