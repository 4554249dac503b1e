//! Intake Executor - Submission Write Protocol
//!
//! Turns a validated intake graph into datastore rows exactly once:
//!
//! - [`SubmissionTracker`]: durable duplicate guard
//! - [`PendingStore`]: crash-recovery snapshots
//! - [`SubmissionOrchestrator`]: the ordered write protocol with
//!   compensation
//! - [`ActivityLogger`]: best-effort audit trail
//! - [`BillingPolicy`]: amount written to the purchase record

pub mod audit;
pub mod billing;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod pending;
pub mod tracker;

pub use audit::{
    ActivityEntry, ActivityEvent, ActivityLogger, ActivitySink, DatastoreActivitySink,
    OutboxActivitySink,
};
pub use billing::{BillingPolicy, BillingQuote};
pub use config::{OrchestratorConfig, TrackerConfig};
pub use error::{
    SubmissionError, SubmissionResult, SubmissionStep, TrackerError, TrackerResult,
};
pub use orchestrator::{
    SubmissionOrchestrator, SubmissionOutcome, SubmissionReceipt, SubmissionRequest,
};
pub use pending::{PendingStore, PendingSubmission};
pub use tracker::{SubmissionState, SubmissionTracker};

/// Intake executor version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
