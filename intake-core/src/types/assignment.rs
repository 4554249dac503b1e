//! Assignment Types

use super::ids::LocalId;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Links one Owner to one Property
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub property_id: LocalId,
    pub owner_id: LocalId,
    /// Share of ownership, 0..=100
    pub ownership_percentage: Decimal,
    #[serde(default)]
    pub resident_at_property: bool,
    #[serde(default)]
    pub residency_from: Option<NaiveDate>,
    #[serde(default)]
    pub residency_to: Option<NaiveDate>,
    #[serde(default)]
    pub tax_credit: Option<Decimal>,
}

impl Assignment {
    pub fn new(
        owner_id: impl Into<LocalId>,
        property_id: impl Into<LocalId>,
        ownership_percentage: Decimal,
    ) -> Self {
        Self {
            property_id: property_id.into(),
            owner_id: owner_id.into(),
            ownership_percentage,
            resident_at_property: false,
            residency_from: None,
            residency_to: None,
            tax_credit: None,
        }
    }

    /// 0% and not resident: the row carries no information
    pub fn is_empty_link(&self) -> bool {
        self.ownership_percentage.is_zero() && !self.resident_at_property
    }
}
