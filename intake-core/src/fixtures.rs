//! Sample Graphs
//!
//! Ready-made graphs used by tests across the workspace and by the CLI's
//! `sample` command.

use crate::types::*;
use chrono::NaiveDate;
use rust_decimal::Decimal;

/// A well-formed owner with the given local id
pub fn owner(local_id: &str, first_name: &str, last_name: &str) -> Owner {
    Owner {
        local_id: LocalId::new(local_id),
        first_name: first_name.to_string(),
        last_name: last_name.to_string(),
        date_of_birth: NaiveDate::from_ymd_opt(1968, 9, 14),
        country_of_birth: "US".to_string(),
        citizenship: "US".to_string(),
        address: PostalAddress {
            street: "221 Commonwealth Ave".to_string(),
            city: "Boston".to_string(),
            zip: "02116".to_string(),
            country: "US".to_string(),
            state: Some("MA".to_string()),
        },
        tax_id: format!("TAX-{}", local_id.to_uppercase()),
        marital_status: MaritalStatus::Married,
        italian_resident: ResidencyFlag::No,
        residency_details: Some(ResidencyDetails {
            comune: "Ostuni".to_string(),
            address: "Via Cattedrale 4".to_string(),
            spent_over_183_days: Some(false),
        }),
    }
}

/// A well-formed property rented long term all year
pub fn long_term_rental(local_id: &str, label: &str, rental_income: Decimal) -> Property {
    Property {
        local_id: LocalId::new(local_id),
        label: label.to_string(),
        address: PropertyAddress {
            comune: "Ostuni".to_string(),
            province: "BR".to_string(),
            street: "Via Cattedrale 4".to_string(),
            zip: "72017".to_string(),
        },
        property_type: PropertyType::Residential,
        activity_2024: YearActivity::OwnedAllYear,
        purchase_date: None,
        purchase_price: None,
        sale_date: None,
        sale_price: None,
        remodeling: false,
        occupancy: vec![OccupancyAllocation::new(OccupancyStatus::LongTermRent, 12)],
        rental_income: Some(rental_income),
        documents: vec![],
        use_document_retrieval: false,
    }
}

/// Two owners sharing one long-term rental 60/40
pub fn two_owners_one_rental() -> IntakeGraph {
    IntakeGraph {
        owners: vec![
            owner("owner-1", "Maria", "Esposito"),
            owner("owner-2", "Luca", "Esposito"),
        ],
        properties: vec![long_term_rental("prop-1", "Casa Bianca", Decimal::new(1200, 0))],
        assignments: vec![
            Assignment::new("owner-1", "prop-1", Decimal::new(60, 0)),
            Assignment::new("owner-2", "prop-1", Decimal::new(40, 0)),
        ],
    }
}

/// Contact details matching [`two_owners_one_rental`]
pub fn contact() -> ContactInfo {
    ContactInfo {
        email: "maria.esposito@example.com".to_string(),
        phone: Some("+1 617 555 0142".to_string()),
        first_name: Some("Maria".to_string()),
        last_name: Some("Esposito".to_string()),
    }
}
