//! Owner Types

use super::ids::LocalId;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Marital status
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaritalStatus {
    Unmarried,
    Married,
    Divorced,
    Widowed,
}

/// Tri-state answer to "is the owner resident in Italy"
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResidencyFlag {
    Yes,
    No,
    #[default]
    Unknown,
}

/// Postal address of an owner
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostalAddress {
    pub street: String,
    pub city: String,
    pub zip: String,
    pub country: String,
    /// Subdivision (state, province), when the country uses one
    #[serde(default)]
    pub state: Option<String>,
}

/// Residency details collected for owners who are not Italian residents
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResidencyDetails {
    /// Comune of the in-country dwelling
    #[serde(default)]
    pub comune: String,
    /// In-country address
    #[serde(default)]
    pub address: String,
    /// Whether the owner spent more than 183 days in Italy during the year
    #[serde(default)]
    pub spent_over_183_days: Option<bool>,
}

/// A natural person owning one or more properties
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Owner {
    pub local_id: LocalId,
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: Option<NaiveDate>,
    pub country_of_birth: String,
    pub citizenship: String,
    pub address: PostalAddress,
    /// National tax identifier, free-form
    pub tax_id: String,
    pub marital_status: MaritalStatus,
    #[serde(default)]
    pub italian_resident: ResidencyFlag,
    #[serde(default)]
    pub residency_details: Option<ResidencyDetails>,
}

impl Owner {
    /// Display name used in audit messages
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name.trim(), self.last_name.trim())
            .trim()
            .to_string()
    }
}
