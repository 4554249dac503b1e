//! Output Formatting
//!
//! Utilities for formatting CLI output in various formats.

use crate::commands::OutputFormat;
use intake_core::{OccupancyAllocation, ValidationReport};
use intake_executor::{SubmissionOutcome, SubmissionState};
use intake_store::ActivityRow;
use serde::Serialize;

/// Format and print data based on output format
pub fn print_output<T: Serialize>(data: &T, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(data),
        OutputFormat::Table | OutputFormat::Plain => print_json(data),
    }
}

/// Print as JSON
fn print_json<T: Serialize>(data: &T) {
    match serde_json::to_string_pretty(data) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Error formatting JSON: {}", e),
    }
}

/// Print a validation report
pub fn print_report(report: &ValidationReport, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(report),
        OutputFormat::Table | OutputFormat::Plain => {
            println!("Validation Passed");
            println!("=================");
            print_row("Owners:", &report.owners.to_string());
            print_row("Properties:", &report.properties.to_string());
            print_row("Assignments:", &report.assignments.to_string());
            if !report.warnings.is_empty() {
                println!();
                println!("Warnings:");
                for warning in &report.warnings {
                    println!("  - {}", warning);
                }
            }
        }
    }
}

/// Print normalized allocations
pub fn print_allocations(allocations: &[OccupancyAllocation], format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&allocations),
        OutputFormat::Table => {
            println!("{:<20} {}", "Status", "Months");
            print_separator();
            for allocation in allocations {
                print_row(allocation.status.name(), &allocation.months.to_string());
            }
        }
        OutputFormat::Plain => {
            let parts: Vec<String> = allocations
                .iter()
                .map(|a| format!("{}:{}", a.status, a.months))
                .collect();
            println!("{}", parts.join(","));
        }
    }
}

/// Print a submission outcome
pub fn print_outcome(outcome: &SubmissionOutcome, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(outcome),
        OutputFormat::Plain => println!("{}", outcome.submission_id()),
        OutputFormat::Table => match outcome {
            SubmissionOutcome::AlreadySubmitted { submission_id } => {
                println!("Already Submitted");
                println!("=================");
                print_row("Submission ID:", submission_id.as_str());
            }
            SubmissionOutcome::Submitted(receipt) => {
                println!("Submission Created");
                println!("==================");
                print_row("Submission ID:", receipt.submission_id.as_str());
                print_row("User:", receipt.user_id.as_str());
                print_row("Amount:", &receipt.amount.to_string());
                if let Some(purchase) = &receipt.purchase_id {
                    print_row("Purchase ID:", purchase.as_str());
                }
                println!();
                println!("Owners:");
                for (local, server) in &receipt.owners {
                    println!("  {} -> {}", local, server);
                }
                println!("Properties:");
                for (local, server) in &receipt.properties {
                    println!("  {} -> {}", local, server);
                }
                print_row("Assignments:", &receipt.assignments.len().to_string());
                for step in &receipt.degraded_steps {
                    print_warning(&format!("best-effort step {} failed", step));
                }
                for warning in &receipt.warnings {
                    print_warning(&warning.to_string());
                }
            }
        },
    }
}

/// Tracker view of a single user
#[derive(Debug, Serialize)]
pub struct TrackerStatus {
    pub user_id: String,
    pub state: SubmissionState,
    pub remembered_submission: Option<String>,
    pub force_retry: bool,
    pub pending_snapshot: bool,
    pub in_flight_total: usize,
}

/// Print tracker status
pub fn print_tracker_status(status: &TrackerStatus, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(status),
        OutputFormat::Table | OutputFormat::Plain => {
            let state = match &status.state {
                SubmissionState::NoSubmission => "no_submission".to_string(),
                SubmissionState::InFlight { since } => format!("in_flight (since {})", since),
                SubmissionState::Completed {
                    submission_id,
                    completed_at,
                } => format!("completed {} at {}", submission_id, completed_at),
            };
            println!("Tracker Status");
            println!("==============");
            print_row("User:", &status.user_id);
            print_row("State:", &state);
            print_row(
                "Remembered:",
                status.remembered_submission.as_deref().unwrap_or("-"),
            );
            print_row("Force retry:", &status.force_retry.to_string());
            print_row("Pending:", &status.pending_snapshot.to_string());
            print_row("In flight:", &status.in_flight_total.to_string());
        }
    }
}

/// Print outbox rows
pub fn print_activity(rows: &[ActivityRow], format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&rows),
        OutputFormat::Table | OutputFormat::Plain => {
            if rows.is_empty() {
                print_info("Outbox is empty");
                return;
            }
            for row in rows {
                println!(
                    "{}  {:<24} {}",
                    row.created_at.format("%Y-%m-%d %H:%M:%S"),
                    row.event_type,
                    row.description
                );
            }
        }
    }
}

/// Print success message
pub fn print_success(message: &str) {
    println!("{}", message);
}

/// Print warning message
pub fn print_warning(message: &str) {
    eprintln!("Warning: {}", message);
}

/// Print info message
pub fn print_info(message: &str) {
    println!("{}", message);
}

/// Print a table row
pub fn print_row(key: &str, value: &str) {
    println!("{:<20} {}", key, value);
}

/// Print a separator line
pub fn print_separator() {
    println!("{}", "-".repeat(40));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_print_row_format() {
        print_row("Key", "Value");
    }

    #[test]
    fn test_tracker_status_serializes_state_tag() {
        let status = TrackerStatus {
            user_id: "u1".to_string(),
            state: SubmissionState::NoSubmission,
            remembered_submission: None,
            force_retry: false,
            pending_snapshot: true,
            in_flight_total: 0,
        };
        let value = serde_json::to_value(&status).unwrap();
        assert_eq!(value["state"]["state"], "no_submission");
        assert_eq!(value["pending_snapshot"], true);
    }
}
