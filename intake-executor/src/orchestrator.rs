//! Submission Orchestrator
//!
//! Runs the write protocol for one submission attempt:
//!
//! 1. Guard against duplicates through the tracker
//! 2. Insert the submission header
//! 3. Upsert the user profile (best-effort)
//! 4. Insert owners
//! 5. Insert properties
//! 6. Insert assignments, resolved through the reconciliation map
//! 7. Insert the purchase record (best-effort)
//! 8. Mark the tracker completed
//! 9. Clear the pending snapshot (best-effort)
//!
//! A fatal failure after step 2 deletes the header and releases the
//! tracker so a manual retry starts clean. The pending snapshot is written
//! before the first network call, under an anonymous slot when the user is
//! not known yet, and survives every failure.

use futures::{stream, Future, StreamExt, TryStreamExt};
use intake_core::{
    validate_graph, ContactInfo, EntityKind, IntakeGraph, LocalId, ReconciliationMap, ServerId,
    SubmissionId, UserId, ValidationReport, ValidationWarning,
};
use intake_store::{
    AssignmentRow, Datastore, IdentityProvider, KvStore, OwnerRow, PaymentStatus, ProfileRow,
    PropertyRow, PurchaseRow, StoreResult, SubmissionRow,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::audit::{ActivityEntry, ActivityEvent, ActivityLogger};
use crate::config::OrchestratorConfig;
use crate::error::{SubmissionError, SubmissionResult, SubmissionStep, TrackerError};
use crate::pending::PendingStore;
use crate::tracker::SubmissionTracker;

/// Inbound submit intent
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionRequest {
    pub graph: IntakeGraph,
    pub contact: ContactInfo,
    /// Known user; resolved through the identity provider when absent
    #[serde(default)]
    pub user_id: Option<UserId>,
}

impl SubmissionRequest {
    pub fn new(graph: IntakeGraph, contact: ContactInfo) -> Self {
        Self {
            graph,
            contact,
            user_id: None,
        }
    }

    pub fn with_user(mut self, user: UserId) -> Self {
        self.user_id = Some(user);
        self
    }
}

/// Everything a successful attempt wrote
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionReceipt {
    pub submission_id: SubmissionId,
    pub user_id: UserId,
    pub owners: Vec<(LocalId, ServerId)>,
    pub properties: Vec<(LocalId, ServerId)>,
    pub assignments: Vec<ServerId>,
    pub purchase_id: Option<ServerId>,
    pub amount: Decimal,
    /// Best-effort steps that failed without failing the attempt
    pub degraded_steps: Vec<SubmissionStep>,
    pub warnings: Vec<ValidationWarning>,
}

/// Result of a submit
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SubmissionOutcome {
    Submitted(SubmissionReceipt),
    /// An earlier or concurrent attempt already created this submission
    AlreadySubmitted { submission_id: SubmissionId },
}

impl SubmissionOutcome {
    pub fn submission_id(&self) -> &SubmissionId {
        match self {
            SubmissionOutcome::Submitted(receipt) => &receipt.submission_id,
            SubmissionOutcome::AlreadySubmitted { submission_id } => submission_id,
        }
    }

    pub fn is_new(&self) -> bool {
        matches!(self, SubmissionOutcome::Submitted(_))
    }
}

/// Submission orchestrator
pub struct SubmissionOrchestrator {
    datastore: Arc<dyn Datastore>,
    identity: Arc<dyn IdentityProvider>,
    tracker: SubmissionTracker,
    pending: PendingStore,
    audit: ActivityLogger,
    config: OrchestratorConfig,
}

impl SubmissionOrchestrator {
    pub fn new(
        datastore: Arc<dyn Datastore>,
        identity: Arc<dyn IdentityProvider>,
        kv: Arc<dyn KvStore>,
        audit: ActivityLogger,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            datastore,
            identity,
            tracker: SubmissionTracker::new(kv.clone(), config.tracker.clone()),
            pending: PendingStore::new(kv),
            audit,
            config,
        }
    }

    pub fn tracker(&self) -> &SubmissionTracker {
        &self.tracker
    }

    pub fn pending(&self) -> &PendingStore {
        &self.pending
    }

    pub fn audit(&self) -> &ActivityLogger {
        &self.audit
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Validate and submit a graph
    pub async fn submit(&self, request: SubmissionRequest) -> SubmissionResult<SubmissionOutcome> {
        let report = validate_graph(&request.graph).map_err(SubmissionError::Validation)?;
        for warning in &report.warnings {
            warn!(warning = %warning, "Validation warning");
        }

        // Snapshot before the first network call, identity lookup included
        let saved = match &request.user_id {
            Some(user) => self.pending.save(user, &request.graph, &request.contact).await,
            None => self.pending.save_anonymous(&request.graph, &request.contact).await,
        };
        saved.map_err(|e| SubmissionError::internal(format!("failed to save pending snapshot: {}", e)))?;

        let user = self.resolve_user(request.user_id.as_ref()).await?;
        if request.user_id.is_none() {
            self.pending
                .adopt(&user)
                .await
                .map_err(|e| SubmissionError::internal(format!("failed to move pending snapshot: {}", e)))?;
        }

        // Step 1: Guard
        if let Some(submission_id) = self.guard(&user).await? {
            info!(user = %user, submission_id = %submission_id, "Already submitted");
            self.clear_pending(&user).await;
            self.audit.record_detached(
                ActivityEntry::new(ActivityEvent::SubmissionDeduplicated, "Duplicate submit ignored")
                    .for_user(&user)
                    .entity("submission", &submission_id),
            );
            return Ok(SubmissionOutcome::AlreadySubmitted { submission_id });
        }

        let receipt = self.run(&user, &request, report).await?;
        Ok(SubmissionOutcome::Submitted(receipt))
    }

    /// Re-run the pending snapshot stored for `user`, if any
    ///
    /// A snapshot saved before anyone was signed in is claimed by `user`.
    pub async fn resume_pending(&self, user: &UserId) -> SubmissionResult<Option<SubmissionOutcome>> {
        let snapshot = match self.pending.load(user).await {
            Ok(Some(snapshot)) => Ok(Some(snapshot)),
            Ok(None) => self.pending.adopt(user).await,
            Err(e) => Err(e),
        }
        .map_err(|e| SubmissionError::internal(format!("failed to load pending snapshot: {}", e)))?;
        let Some(snapshot) = snapshot else {
            return Ok(None);
        };

        info!(user = %user, saved_at = %snapshot.saved_at, "Resuming pending submission");
        let request = SubmissionRequest::new(snapshot.graph, snapshot.contact).with_user(user.clone());
        self.submit(request).await.map(Some)
    }

    async fn resolve_user(&self, known: Option<&UserId>) -> SubmissionResult<UserId> {
        if let Some(user) = known {
            return Ok(user.clone());
        }
        match self.identity.current_user().await {
            Ok(Some(user)) => Ok(user),
            Ok(None) => Err(SubmissionError::authorization_pending("no signed-in user")),
            Err(e) => Err(SubmissionError::authorization_pending(format!(
                "identity unavailable: {}",
                e
            ))),
        }
    }

    /// Returns the id of an existing submission, or `None` once this
    /// attempt holds the tracker
    ///
    /// The Completed check happens inside `begin`, so a concurrent attempt
    /// that completes between two reads is still seen.
    async fn guard(&self, user: &UserId) -> SubmissionResult<Option<SubmissionId>> {
        if self.tracker.force_retry_requested(user).await? {
            info!(user = %user, "Force retry requested, ignoring previous completion");
            self.tracker.clear_completed(user).await?;
            self.tracker.clear_force_retry(user).await?;
        }

        let deadline = Instant::now() + self.config.in_flight_wait;
        loop {
            match self.tracker.begin(user).await {
                Ok(()) => return Ok(None),
                Err(TrackerError::AlreadyCompleted { submission_id }) => {
                    let exists = self
                        .datastore
                        .submission_exists(&submission_id)
                        .await
                        .map_err(|e| SubmissionError::from_store(SubmissionStep::Guard, e))?;
                    if exists {
                        return Ok(Some(submission_id));
                    }
                    warn!(user = %user, submission_id = %submission_id, "Remembered submission is gone, starting over");
                    self.tracker.clear_completed(user).await?;
                    continue;
                }
                Err(TrackerError::AlreadyInFlight { .. }) => {}
                Err(TrackerError::CapacityExhausted { in_flight, max }) => {
                    return Err(SubmissionError::duplicate_attempt(format!(
                        "{} of {} submission slots in use",
                        in_flight, max
                    )));
                }
                Err(e) => return Err(e.into()),
            }

            if Instant::now() >= deadline {
                return Err(SubmissionError::duplicate_attempt(
                    "another attempt for this user is still in flight",
                ));
            }
            tokio::time::sleep(self.config.in_flight_poll_interval).await;
        }
    }

    async fn run(
        &self,
        user: &UserId,
        request: &SubmissionRequest,
        report: ValidationReport,
    ) -> SubmissionResult<SubmissionReceipt> {
        let graph = &request.graph;
        info!(
            user = %user,
            owners = graph.owners.len(),
            properties = graph.properties.len(),
            assignments = graph.assignments.len(),
            "Submission started"
        );
        self.audit.record_detached(
            ActivityEntry::new(ActivityEvent::SubmissionStarted, "Submission started")
                .for_user(user)
                .metadata(json!({
                    "owners": graph.owners.len(),
                    "properties": graph.properties.len(),
                })),
        );

        // Step 2: Submission header
        let header = SubmissionRow {
            user_id: user.clone(),
            submitted_at: chrono::Utc::now(),
            state: Default::default(),
            use_document_retrieval: graph.uses_document_retrieval(),
            owner_count: graph.owners.len(),
            property_count: graph.properties.len(),
        };
        let submission_id: SubmissionId = match self.datastore.insert_submission(&header).await {
            Ok(id) => id.into(),
            Err(e) => {
                let err = SubmissionError::from_store(SubmissionStep::Header, e);
                return Err(self.abandon(user, None, err).await);
            }
        };
        info!(user = %user, submission_id = %submission_id, "Submission header created");

        match self.write_graph(user, &submission_id, request, report).await {
            Ok(receipt) => Ok(receipt),
            Err(err) => Err(self.abandon(user, Some(&submission_id), err).await),
        }
    }

    /// Steps 3 through 9, once the header exists
    async fn write_graph(
        &self,
        user: &UserId,
        submission_id: &SubmissionId,
        request: &SubmissionRequest,
        report: ValidationReport,
    ) -> SubmissionResult<SubmissionReceipt> {
        let graph = &request.graph;
        let concurrency = self.config.entity_write_concurrency.max(1);
        let mut degraded = Vec::new();
        let mut map = ReconciliationMap::new();

        // Step 3: Profile
        let profile = ProfileRow::from_contact(user.clone(), &request.contact);
        if let Err(e) = self.datastore.upsert_profile(&profile).await {
            warn!(user = %user, error = %e, "Profile upsert failed");
            degraded.push(SubmissionStep::Profile);
        }

        // Step 4: Owners
        let owner_rows: Vec<OwnerRow> = graph
            .owners
            .iter()
            .map(|owner| OwnerRow {
                submission_id: submission_id.clone(),
                user_id: user.clone(),
                owner: owner.clone(),
            })
            .collect();
        let owner_ids = self
            .write_all(
                SubmissionStep::Owners,
                concurrency,
                owner_rows.iter().map(|row| self.datastore.insert_owner(row)),
            )
            .await?;
        for (owner, id) in graph.owners.iter().zip(owner_ids) {
            map.record(EntityKind::Owner, owner.local_id.clone(), id)?;
        }

        // Step 5: Properties
        let property_rows: Vec<PropertyRow> = graph
            .properties
            .iter()
            .map(|property| PropertyRow {
                submission_id: submission_id.clone(),
                user_id: user.clone(),
                property: property.clone(),
            })
            .collect();
        let property_ids = self
            .write_all(
                SubmissionStep::Properties,
                concurrency,
                property_rows.iter().map(|row| self.datastore.insert_property(row)),
            )
            .await?;
        for (property, id) in graph.properties.iter().zip(property_ids) {
            map.record(EntityKind::Property, property.local_id.clone(), id)?;
        }

        // Step 6: Assignments
        let mut assignment_rows = Vec::with_capacity(graph.assignments.len());
        for assignment in &graph.assignments {
            assignment_rows.push(AssignmentRow {
                submission_id: submission_id.clone(),
                owner_id: map.resolve(EntityKind::Owner, &assignment.owner_id)?.clone(),
                property_id: map.resolve(EntityKind::Property, &assignment.property_id)?.clone(),
                ownership_percentage: assignment.ownership_percentage,
                resident_at_property: assignment.resident_at_property,
                residency_from: assignment.residency_from,
                residency_to: assignment.residency_to,
                tax_credit: assignment.tax_credit,
            });
        }
        let assignment_ids = self
            .write_all(
                SubmissionStep::Assignments,
                1,
                assignment_rows.iter().map(|row| self.datastore.insert_assignment(row)),
            )
            .await?;

        // Step 7: Purchase
        let quote = self.config.billing.quote(graph);
        let purchase = PurchaseRow {
            submission_id: submission_id.clone(),
            user_id: user.clone(),
            amount: quote.amount,
            currency: quote.currency.clone(),
            payment_status: PaymentStatus::Pending,
            property_count: quote.property_count,
            created_at: chrono::Utc::now(),
        };
        let purchase_id = match self.datastore.insert_purchase(&purchase).await {
            Ok(id) => Some(id),
            Err(e) => {
                warn!(submission_id = %submission_id, error = %e, "Purchase record failed");
                degraded.push(SubmissionStep::Purchase);
                None
            }
        };

        // Step 8: Complete
        self.tracker.complete(user, submission_id).await?;

        // Step 9: Clear pending snapshot
        if !self.clear_pending(user).await {
            degraded.push(SubmissionStep::ClearPending);
        }

        info!(
            user = %user,
            submission_id = %submission_id,
            assignments = assignment_ids.len(),
            amount = %quote.amount,
            "Submission completed"
        );
        self.audit.record_detached(
            ActivityEntry::new(ActivityEvent::SubmissionCompleted, "Submission completed")
                .for_user(user)
                .entity("submission", submission_id)
                .metadata(json!({
                    "owners": owner_rows.len(),
                    "properties": property_rows.len(),
                    "assignments": assignment_ids.len(),
                    "amount": quote.amount.to_string(),
                    "degraded_steps": degraded,
                })),
        );

        Ok(SubmissionReceipt {
            submission_id: submission_id.clone(),
            user_id: user.clone(),
            owners: map.mappings(EntityKind::Owner),
            properties: map.mappings(EntityKind::Property),
            assignments: assignment_ids,
            purchase_id,
            amount: quote.amount,
            degraded_steps: degraded,
            warnings: report.warnings,
        })
    }

    /// Run `writes` with at most `concurrency` in flight, preserving order;
    /// the first failure stops the step
    async fn write_all<I, F>(
        &self,
        step: SubmissionStep,
        concurrency: usize,
        writes: I,
    ) -> SubmissionResult<Vec<ServerId>>
    where
        I: IntoIterator<Item = F>,
        F: Future<Output = StoreResult<ServerId>>,
    {
        stream::iter(writes)
            .buffered(concurrency)
            .try_collect()
            .await
            .map_err(|e| SubmissionError::from_store(step, e))
    }

    /// Undo what a failed attempt left behind and report it
    async fn abandon(
        &self,
        user: &UserId,
        submission_id: Option<&SubmissionId>,
        err: SubmissionError,
    ) -> SubmissionError {
        warn!(user = %user, error = %err, "Submission failed");

        if let Some(submission_id) = submission_id {
            if let Err(e) = self.datastore.delete_submission(submission_id).await {
                warn!(submission_id = %submission_id, error = %e, "Compensating delete failed");
                self.audit.record_detached(
                    ActivityEntry::new(
                        ActivityEvent::CompensationFailed,
                        format!("Could not delete submission after failure: {}", e),
                    )
                    .for_user(user)
                    .entity("submission", submission_id),
                );
            }
        }

        if let Err(e) = self.tracker.release(user).await {
            warn!(user = %user, error = %e, "Tracker release failed");
        }

        let event = match &err {
            SubmissionError::AuthorizationPending { .. } => {
                if let Err(e) = self.tracker.mark_force_retry(user).await {
                    warn!(user = %user, error = %e, "Failed to set force-retry flag");
                }
                ActivityEvent::AuthorizationPending
            }
            _ => ActivityEvent::SubmissionFailed,
        };
        let mut entry = ActivityEntry::new(event, err.to_string()).for_user(user);
        if let Some(submission_id) = submission_id {
            entry = entry.entity("submission", submission_id);
        }
        self.audit.record_detached(entry);

        err
    }

    async fn clear_pending(&self, user: &UserId) -> bool {
        match self.pending.clear(user).await {
            Ok(()) => true,
            Err(e) => {
                warn!(user = %user, error = %e, "Failed to clear pending snapshot");
                false
            }
        }
    }
}
