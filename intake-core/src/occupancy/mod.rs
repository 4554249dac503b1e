//! Occupancy Allocation
//!
//! A property's year is split into `{status, months}` allocations that must
//! cover exactly twelve months. This module validates such lists and turns
//! legacy or malformed input into a well-formed list (see [`normalize`]).

mod normalize;

pub use normalize::{normalize, RawAllocation};

use crate::types::{OccupancyAllocation, OccupancyStatus};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Months an allocation list must cover
pub const MONTHS_PER_YEAR: u32 = 12;

/// Why an allocation list is not well-formed
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OccupancyViolation {
    /// [INTAKE-OCC-001] A single allocation exceeds a year
    #[error("[INTAKE-OCC-001] allocation #{index} ({status}) has {months} months, expected 0 to 12")]
    MonthsOutOfRange {
        index: usize,
        status: OccupancyStatus,
        months: u32,
    },

    /// [INTAKE-OCC-002] Nothing allocated at all
    #[error("[INTAKE-OCC-002] no allocation has a positive number of months")]
    NoOccupiedMonths,

    /// [INTAKE-OCC-003] Allocations do not cover the year exactly
    #[error("[INTAKE-OCC-003] allocations total {total} months, expected 12")]
    TotalMismatch { total: u32 },
}

/// Summary of a valid allocation list
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OccupancySummary {
    pub total_months: u32,
    pub rental_months: u32,
}

impl OccupancySummary {
    pub fn has_rental(&self) -> bool {
        self.rental_months > 0
    }
}

/// Validate an allocation list
///
/// Callers decide whether a violation blocks submission or is only shown as
/// a warning on the current wizard step.
pub fn validate_allocations(
    allocations: &[OccupancyAllocation],
) -> Result<OccupancySummary, OccupancyViolation> {
    for (index, alloc) in allocations.iter().enumerate() {
        if alloc.months > MONTHS_PER_YEAR {
            return Err(OccupancyViolation::MonthsOutOfRange {
                index,
                status: alloc.status,
                months: alloc.months,
            });
        }
    }

    if !allocations.iter().any(|a| a.months > 0) {
        return Err(OccupancyViolation::NoOccupiedMonths);
    }

    let total_months: u32 = allocations.iter().map(|a| a.months).sum();
    if total_months != MONTHS_PER_YEAR {
        return Err(OccupancyViolation::TotalMismatch { total: total_months });
    }

    let rental_months = allocations
        .iter()
        .filter(|a| a.status.is_rental())
        .map(|a| a.months)
        .sum();

    Ok(OccupancySummary {
        total_months,
        rental_months,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use OccupancyStatus::*;

    fn alloc(status: OccupancyStatus, months: u32) -> OccupancyAllocation {
        OccupancyAllocation::new(status, months)
    }

    #[test]
    fn test_full_year_single_status() {
        let summary = validate_allocations(&[alloc(LongTermRent, 12)]).unwrap();
        assert_eq!(summary.total_months, 12);
        assert!(summary.has_rental());
    }

    #[test]
    fn test_split_year() {
        let summary =
            validate_allocations(&[alloc(PersonalUse, 4), alloc(ShortTermRent, 8)]).unwrap();
        assert_eq!(summary.rental_months, 8);
    }

    #[test]
    fn test_zero_month_entries_allowed() {
        assert!(validate_allocations(&[alloc(PersonalUse, 12), alloc(LongTermRent, 0)]).is_ok());
    }

    #[test]
    fn test_eleven_months_rejected() {
        assert_eq!(
            validate_allocations(&[alloc(PersonalUse, 11)]),
            Err(OccupancyViolation::TotalMismatch { total: 11 })
        );
    }

    #[test]
    fn test_overfull_year_rejected() {
        assert_eq!(
            validate_allocations(&[alloc(PersonalUse, 8), alloc(LongTermRent, 8)]),
            Err(OccupancyViolation::TotalMismatch { total: 16 })
        );
    }

    #[test]
    fn test_out_of_range_reports_index() {
        let err = validate_allocations(&[alloc(PersonalUse, 0), alloc(LongTermRent, 13)])
            .unwrap_err();
        assert_eq!(
            err,
            OccupancyViolation::MonthsOutOfRange {
                index: 1,
                status: LongTermRent,
                months: 13
            }
        );
        assert!(err.to_string().contains("INTAKE-OCC-001"));
    }

    #[test]
    fn test_empty_and_all_zero_rejected() {
        assert_eq!(validate_allocations(&[]), Err(OccupancyViolation::NoOccupiedMonths));
        assert_eq!(
            validate_allocations(&[alloc(PersonalUse, 0)]),
            Err(OccupancyViolation::NoOccupiedMonths)
        );
    }
}
