//! Property Types

use super::ids::LocalId;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Property type
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyType {
    Residential,
    BAndB,
    Commercial,
    Land,
    Other,
}

/// What happened to the property during the 2024 tax year
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum YearActivity {
    Purchased,
    Sold,
    PurchasedAndSold,
    #[default]
    OwnedAllYear,
}

impl YearActivity {
    /// Whether purchase date and price are required
    pub fn implies_purchase(&self) -> bool {
        matches!(self, YearActivity::Purchased | YearActivity::PurchasedAndSold)
    }

    /// Whether sale date and price are required
    pub fn implies_sale(&self) -> bool {
        matches!(self, YearActivity::Sold | YearActivity::PurchasedAndSold)
    }
}

/// How the property was used for part of the year
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OccupancyStatus {
    PersonalUse,
    LongTermRent,
    ShortTermRent,
}

impl OccupancyStatus {
    /// Canonical ordering used by normalization
    pub const ALL: [OccupancyStatus; 3] = [
        OccupancyStatus::PersonalUse,
        OccupancyStatus::LongTermRent,
        OccupancyStatus::ShortTermRent,
    ];

    pub fn is_rental(&self) -> bool {
        matches!(self, OccupancyStatus::LongTermRent | OccupancyStatus::ShortTermRent)
    }

    pub fn name(&self) -> &'static str {
        match self {
            OccupancyStatus::PersonalUse => "personal_use",
            OccupancyStatus::LongTermRent => "long_term_rent",
            OccupancyStatus::ShortTermRent => "short_term_rent",
        }
    }

    /// Parse a status name, accepting the spellings older clients stored
    pub fn parse(s: &str) -> Option<Self> {
        let normalized: String = s
            .trim()
            .to_lowercase()
            .chars()
            .map(|c| if c == '-' || c == ' ' { '_' } else { c })
            .collect();
        match normalized.as_str() {
            "personal_use" | "personal" | "owner_occupied" | "primary_residence" => {
                Some(OccupancyStatus::PersonalUse)
            }
            "long_term_rent" | "long_term_rental" | "long_term" | "rented_long" => {
                Some(OccupancyStatus::LongTermRent)
            }
            "short_term_rent" | "short_term_rental" | "short_term" | "rented_short" => {
                Some(OccupancyStatus::ShortTermRent)
            }
            _ => None,
        }
    }
}

impl std::fmt::Display for OccupancyStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A `{status, months}` slice of the year
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OccupancyAllocation {
    pub status: OccupancyStatus,
    pub months: u32,
}

impl OccupancyAllocation {
    pub fn new(status: OccupancyStatus, months: u32) -> Self {
        Self { status, months }
    }
}

/// Italian address of a property
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyAddress {
    pub comune: String,
    pub province: String,
    pub street: String,
    pub zip: String,
}

/// Reference to an uploaded document
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRef {
    pub name: String,
    pub url: String,
}

/// A real-estate asset
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Property {
    pub local_id: LocalId,
    #[serde(default)]
    pub label: String,
    pub address: PropertyAddress,
    pub property_type: PropertyType,
    #[serde(default)]
    pub activity_2024: YearActivity,
    #[serde(default)]
    pub purchase_date: Option<NaiveDate>,
    #[serde(default)]
    pub purchase_price: Option<Decimal>,
    #[serde(default)]
    pub sale_date: Option<NaiveDate>,
    #[serde(default)]
    pub sale_price: Option<Decimal>,
    #[serde(default)]
    pub remodeling: bool,
    #[serde(default)]
    pub occupancy: Vec<OccupancyAllocation>,
    #[serde(default)]
    pub rental_income: Option<Decimal>,
    #[serde(default)]
    pub documents: Vec<DocumentRef>,
    /// Use the document-retrieval service instead of uploads
    #[serde(default)]
    pub use_document_retrieval: bool,
}

impl Property {
    /// Label if present, otherwise the street address
    pub fn display_name(&self) -> String {
        if self.label.trim().is_empty() {
            format!("{}, {}", self.address.street.trim(), self.address.comune.trim())
        } else {
            self.label.trim().to_string()
        }
    }

    /// Any allocation carries a rental status, whatever its month count
    pub fn has_rental_occupancy(&self) -> bool {
        self.occupancy.iter().any(|a| a.status.is_rental())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_parse_aliases() {
        assert_eq!(OccupancyStatus::parse("Personal Use"), Some(OccupancyStatus::PersonalUse));
        assert_eq!(OccupancyStatus::parse("long-term"), Some(OccupancyStatus::LongTermRent));
        assert_eq!(OccupancyStatus::parse("short_term_rental"), Some(OccupancyStatus::ShortTermRent));
        assert_eq!(OccupancyStatus::parse("vacant"), None);
    }

    #[test]
    fn test_activity_gating() {
        assert!(YearActivity::Purchased.implies_purchase());
        assert!(!YearActivity::Purchased.implies_sale());
        assert!(YearActivity::PurchasedAndSold.implies_purchase());
        assert!(YearActivity::PurchasedAndSold.implies_sale());
        assert!(!YearActivity::OwnedAllYear.implies_purchase());
    }

    #[test]
    fn test_allocation_wire_format() {
        let alloc: OccupancyAllocation =
            serde_json::from_str(r#"{"status":"long_term_rent","months":12}"#).unwrap();
        assert_eq!(alloc, OccupancyAllocation::new(OccupancyStatus::LongTermRent, 12));
    }
}
