//! Billing
//!
//! The purchase row written in step 7 carries the amount due for the
//! submission: a base fee per property plus a fee for every property that
//! asked for document retrieval.

use crate::config::parse_var;
use intake_core::IntakeGraph;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Fees applied to a submission
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingPolicy {
    pub base_fee_per_property: Decimal,
    pub document_retrieval_fee: Decimal,
    pub currency: String,
}

impl Default for BillingPolicy {
    fn default() -> Self {
        Self {
            base_fee_per_property: Decimal::new(4900, 2),
            document_retrieval_fee: Decimal::new(1500, 2),
            currency: "EUR".to_string(),
        }
    }
}

/// Breakdown of an amount
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingQuote {
    pub property_count: usize,
    pub retrieval_count: usize,
    pub amount: Decimal,
    pub currency: String,
}

impl BillingPolicy {
    /// Load from `INTAKE_BILLING_BASE_FEE`, `INTAKE_BILLING_RETRIEVAL_FEE`
    /// and `INTAKE_BILLING_CURRENCY`
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            base_fee_per_property: parse_var("INTAKE_BILLING_BASE_FEE")
                .unwrap_or(defaults.base_fee_per_property),
            document_retrieval_fee: parse_var("INTAKE_BILLING_RETRIEVAL_FEE")
                .unwrap_or(defaults.document_retrieval_fee),
            currency: std::env::var("INTAKE_BILLING_CURRENCY").unwrap_or(defaults.currency),
        }
    }

    pub fn quote(&self, graph: &IntakeGraph) -> BillingQuote {
        let property_count = graph.properties.len();
        let retrieval_count = graph
            .properties
            .iter()
            .filter(|p| p.use_document_retrieval)
            .count();
        let amount = self.base_fee_per_property * Decimal::from(property_count)
            + self.document_retrieval_fee * Decimal::from(retrieval_count);

        BillingQuote {
            property_count,
            retrieval_count,
            amount,
            currency: self.currency.clone(),
        }
    }

    pub fn amount_for(&self, graph: &IntakeGraph) -> Decimal {
        self.quote(graph).amount
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use intake_core::fixtures;

    #[test]
    fn test_single_property() {
        let graph = fixtures::two_owners_one_rental();
        assert_eq!(BillingPolicy::default().amount_for(&graph), Decimal::new(4900, 2));
    }

    #[test]
    fn test_retrieval_fee_per_property() {
        let mut graph = fixtures::two_owners_one_rental();
        let mut second = fixtures::long_term_rental("prop-2", "Trullo", Decimal::new(800, 0));
        second.use_document_retrieval = true;
        graph.properties.push(second);

        let quote = BillingPolicy::default().quote(&graph);
        assert_eq!(quote.property_count, 2);
        assert_eq!(quote.retrieval_count, 1);
        assert_eq!(quote.amount, Decimal::new(11300, 2));
        assert_eq!(quote.currency, "EUR");
    }
}
