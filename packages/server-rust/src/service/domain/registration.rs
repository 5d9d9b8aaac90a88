//! Registration domain service: submission intake, cancellation and
//! waitlist promotion.
//!
//! Submissions are validated against the schema-derived validator first, then
//! run through the admission engine under optimistic concurrency: read the
//! counters with their version, decide, and apply the decision's delta with a
//! conditional update. A lost race re-reads and decides again. When the
//! attempts run out the submission is rejected as full, so no capacity check
//! is ever skipped.
//!
//! Counters move before the registration is written. If a later write fails
//! the delta is rolled back, so counters never overcount a registration that
//! does not exist.

use std::sync::Arc;

use sha2::{Digest, Sha256};
use tracing::{debug, error, info, warn};
use uuid::Uuid;
use workshop_core::{
    admit, derive_validator, promote, release, respondent_email, Admission, CounterDelta,
    Outcome, Registration, RegistrationStatus, RejectReason, WaitlistEntry, WorkshopStatus,
};

use crate::service::config::ServerConfig;
use crate::service::notify::NotificationQueue;
use crate::service::operation::{
    service_names, Operation, OperationContext, OperationError, OperationResponse, Submission,
    SubmissionReceipt,
};
use crate::traits::{StoreError, VersionedCounters, WorkshopStore};

/// Upper bound on re-reads when a release or rollback races other updates.
/// These deltas only free capacity, so they are not bounded by
/// `max_admission_attempts`.
const COUNTER_RETRY_LIMIT: u32 = 32;

/// Handles submissions and waitlist moves for all workshops.
pub struct RegistrationService {
    store: Arc<dyn WorkshopStore>,
    config: Arc<ServerConfig>,
    notifications: NotificationQueue,
}

domain_service!(RegistrationService, service_names::REGISTRATION);

impl RegistrationService {
    #[must_use]
    pub fn new(
        store: Arc<dyn WorkshopStore>,
        config: Arc<ServerConfig>,
        notifications: NotificationQueue,
    ) -> Self {
        Self {
            store,
            config,
            notifications,
        }
    }

    async fn handle(&self, op: Operation) -> Result<OperationResponse, OperationError> {
        match op {
            Operation::SubmitRegistration {
                ctx,
                workshop_id,
                submission,
            } => {
                let receipt = self.submit(&ctx, &workshop_id, submission).await?;
                Ok(OperationResponse::Submission(Box::new(receipt)))
            }
            Operation::CancelRegistration {
                ctx,
                workshop_id,
                registration_id,
            } => {
                let registration = self.cancel(&ctx, &workshop_id, &registration_id).await?;
                Ok(OperationResponse::Registration(Box::new(registration)))
            }
            Operation::PromoteFromWaitlist { ctx, workshop_id } => {
                self.store.load_workshop(&workshop_id).await?;
                let promoted = self.promote_next(ctx.timestamp, &workshop_id).await?;
                Ok(OperationResponse::Promoted(promoted.map(Box::new)))
            }
            Operation::GetWaitlist { workshop_id, .. } => {
                let entries = self.store.waitlist(&workshop_id).await?;
                Ok(OperationResponse::Waitlist(entries))
            }
            _ => Err(OperationError::WrongService),
        }
    }

    // -----------------------------------------------------------------------
    // Submission
    // -----------------------------------------------------------------------

    async fn submit(
        &self,
        ctx: &OperationContext,
        workshop_id: &str,
        submission: Submission,
    ) -> Result<SubmissionReceipt, OperationError> {
        let now = ctx.timestamp;
        let workshop = self.store.load_workshop(workshop_id).await?;

        let validator = derive_validator(&workshop.form);
        if let Err(failures) = validator.check(&submission.form_data) {
            metrics::counter!("workshop_submissions_invalid_total").increment(1);
            debug!(
                workshop_id,
                failures = failures.len(),
                "submission failed validation"
            );
            return Err(OperationError::ValidationFailed { failures });
        }

        if !workshop.is_published() {
            return Ok(rejected(workshop_id, RejectReason::Closed));
        }

        let form_data = validator.known_answers(&submission.form_data);
        let student_id = submission
            .student_id
            .filter(|id| !id.trim().is_empty())
            .or_else(|| ctx.actor.clone())
            .unwrap_or_else(|| format!("anon-{}", Uuid::new_v4()));

        let dedupe_key = if self.config.reject_duplicate_registrations {
            let identity = respondent_email(&form_data).unwrap_or_else(|| student_id.clone());
            let key = dedupe_key(workshop_id, &identity);
            if self
                .store
                .find_registration_by_key(workshop_id, &key)
                .await?
                .is_some()
            {
                return Ok(rejected(workshop_id, RejectReason::Duplicate));
            }
            Some(key)
        } else {
            None
        };

        let (admission, sequence) = self.admit_with_retry(workshop_id, now).await?;
        let Some((status, position)) = admission.outcome.placement() else {
            record_outcome(workshop_id, &admission.outcome);
            return Ok(SubmissionReceipt {
                outcome: admission.outcome,
                registration: None,
            });
        };

        let mut registration =
            Registration::new(workshop_id, student_id, form_data, status, position, now);
        registration.dedupe_key = dedupe_key;

        if let Err(err) = self.persist(&registration, sequence, now).await {
            self.rollback(workshop_id, admission.delta).await;
            return Err(err.into());
        }

        record_outcome(workshop_id, &admission.outcome);
        info!(
            workshop_id,
            registration_id = %registration.id,
            outcome = admission.outcome.label(),
            status = registration.status.as_str(),
            position = registration.waitlist_position,
            "registration admitted"
        );
        self.notifications
            .enqueue(admission.outcome, registration.clone());

        Ok(SubmissionReceipt {
            outcome: admission.outcome,
            registration: Some(registration),
        })
    }

    /// Read-decide-apply loop. Rejections carry no delta and return at once.
    ///
    /// Also returns the counter version the delta produced. Versions only
    /// grow, so it orders waitlist entries by admission.
    async fn admit_with_retry(
        &self,
        workshop_id: &str,
        now: u64,
    ) -> Result<(Admission, u64), OperationError> {
        let attempts = self.config.max_admission_attempts.max(1);
        for attempt in 1..=attempts {
            let snapshot = self.store.read_counters(workshop_id).await?;
            if snapshot.status != WorkshopStatus::Published {
                return Ok((Admission::rejected(RejectReason::Closed), snapshot.version));
            }

            let admission = admit(&snapshot.policy, snapshot.counters, now);
            if admission.delta.is_noop() {
                return Ok((admission, snapshot.version));
            }

            match self
                .store
                .apply_counter_delta(workshop_id, snapshot.version, admission.delta)
                .await
            {
                Ok(applied) => return Ok((admission, applied.version)),
                Err(StoreError::Conflict { .. }) => {
                    metrics::counter!("workshop_admission_conflicts_total").increment(1);
                    debug!(workshop_id, attempt, "admission conflict, retrying");
                }
                Err(err) => return Err(err.into()),
            }
        }

        warn!(
            workshop_id,
            attempts, "admission retries exhausted, rejecting as full"
        );
        Ok((Admission::rejected(RejectReason::Full), 0))
    }

    /// Writes the registration and, when waitlisted, its waitlist entry.
    async fn persist(
        &self,
        registration: &Registration,
        sequence: u64,
        now: u64,
    ) -> Result<(), StoreError> {
        self.store.write_registration(registration).await?;

        let Some(entry) = registration.waitlist_entry(sequence) else {
            return Ok(());
        };
        if let Err(err) = self
            .store
            .append_to_waitlist(&registration.workshop_id, entry)
            .await
        {
            let mut orphan = registration.clone();
            orphan.cancel(now);
            if let Err(cancel_err) = self.store.update_registration(&orphan).await {
                error!(
                    registration_id = %registration.id,
                    error = %cancel_err,
                    "could not cancel registration after waitlist append failed"
                );
            }
            return Err(err);
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Cancellation and promotion
    // -----------------------------------------------------------------------

    async fn cancel(
        &self,
        ctx: &OperationContext,
        workshop_id: &str,
        registration_id: &str,
    ) -> Result<Registration, OperationError> {
        let now = ctx.timestamp;
        let mut registration = self.store.load_registration(registration_id).await?;
        if registration.workshop_id != workshop_id {
            return Err(OperationError::RegistrationNotFound {
                id: registration_id.to_string(),
            });
        }
        if registration.status == RegistrationStatus::Cancelled {
            return Ok(registration);
        }

        if registration.status == RegistrationStatus::Waitlist
            && !self
                .store
                .remove_from_waitlist(workshop_id, registration_id)
                .await?
        {
            // Someone else took it off the waitlist; look at what they did.
            registration = self.store.load_registration(registration_id).await?;
            match registration.status {
                RegistrationStatus::Cancelled => return Ok(registration),
                RegistrationStatus::Waitlist => {
                    return Err(OperationError::PersistenceUnavailable(format!(
                        "registration {registration_id} is being promoted; retry"
                    )));
                }
                RegistrationStatus::Confirmed | RegistrationStatus::Pending => {}
            }
        }

        let freed = registration.status;
        registration.cancel(now);
        self.store.update_registration(&registration).await?;

        // The record is cancelled first: a failed release leaves counters
        // high, which can only under-admit.
        let delta = release(freed);
        if let Err(err) = self.apply_with_retry(workshop_id, delta).await {
            error!(
                workshop_id,
                registration_id,
                error = %err,
                "counter release failed after cancellation"
            );
        }
        info!(
            workshop_id,
            registration_id,
            freed = freed.as_str(),
            "registration cancelled"
        );

        if self.config.auto_promote_waitlist && freed.holds_slot() {
            if let Err(err) = self.promote_next(now, workshop_id).await {
                warn!(workshop_id, error = %err, "automatic waitlist promotion failed");
            }
        }

        Ok(registration)
    }

    /// Moves the waitlist head into a free slot, if there is one.
    async fn promote_next(
        &self,
        now: u64,
        workshop_id: &str,
    ) -> Result<Option<Registration>, OperationError> {
        let mut promotion = None;
        for _ in 0..self.config.max_admission_attempts.max(1) {
            let snapshot = self.store.read_counters(workshop_id).await?;
            if snapshot.status == WorkshopStatus::Archived {
                return Ok(None);
            }
            let Some(candidate) = promote(&snapshot.policy, snapshot.counters, now) else {
                return Ok(None);
            };
            match self
                .store
                .apply_counter_delta(workshop_id, snapshot.version, candidate.delta)
                .await
            {
                Ok(_) => {
                    promotion = Some(candidate);
                    break;
                }
                Err(StoreError::Conflict { .. }) => {
                    metrics::counter!("workshop_admission_conflicts_total").increment(1);
                }
                Err(err) => return Err(err.into()),
            }
        }
        let Some(promotion) = promotion else {
            return Ok(None);
        };

        let head = match self.store.pop_waitlist_head(workshop_id).await {
            Ok(Some(head)) => head,
            Ok(None) => {
                self.rollback(workshop_id, promotion.delta).await;
                return Ok(None);
            }
            Err(err) => {
                self.rollback(workshop_id, promotion.delta).await;
                return Err(err.into());
            }
        };

        let registration = match self.mark_promoted(&head, promotion.status, now).await {
            Ok(registration) => registration,
            Err(err) => {
                // Put the head back where it was and give the slot back.
                if let Err(requeue_err) = self.store.append_to_waitlist(workshop_id, head).await {
                    error!(
                        workshop_id,
                        error = %requeue_err,
                        "could not requeue waitlist head after failed promotion"
                    );
                }
                self.rollback(workshop_id, promotion.delta).await;
                return Err(err.into());
            }
        };

        metrics::counter!("workshop_waitlist_promotions_total").increment(1);
        info!(
            workshop_id,
            registration_id = %registration.id,
            status = registration.status.as_str(),
            "promoted from waitlist"
        );
        self.notifications.enqueue(
            Outcome::Accepted {
                status: promotion.status,
            },
            registration.clone(),
        );
        Ok(Some(registration))
    }

    async fn mark_promoted(
        &self,
        head: &WaitlistEntry,
        status: RegistrationStatus,
        now: u64,
    ) -> Result<Registration, StoreError> {
        let mut registration = self.store.load_registration(&head.registration_id).await?;
        registration.promote_to(status, now);
        self.store.update_registration(&registration).await?;
        Ok(registration)
    }

    // -----------------------------------------------------------------------
    // Counter helpers
    // -----------------------------------------------------------------------

    /// Applies `delta` against whatever version is current, re-reading on conflict.
    async fn apply_with_retry(
        &self,
        workshop_id: &str,
        delta: CounterDelta,
    ) -> Result<Option<VersionedCounters>, StoreError> {
        if delta.is_noop() {
            return Ok(None);
        }
        let mut last = StoreError::Conflict {
            workshop_id: workshop_id.to_string(),
        };
        for _ in 0..COUNTER_RETRY_LIMIT {
            let snapshot = self.store.read_counters(workshop_id).await?;
            match self
                .store
                .apply_counter_delta(workshop_id, snapshot.version, delta)
                .await
            {
                Ok(updated) => return Ok(Some(updated)),
                Err(err @ StoreError::Conflict { .. }) => last = err,
                Err(err) => return Err(err),
            }
        }
        Err(last)
    }

    async fn rollback(&self, workshop_id: &str, delta: CounterDelta) {
        match self.apply_with_retry(workshop_id, delta.negate()).await {
            Ok(_) => {
                metrics::counter!("workshop_admission_rollbacks_total").increment(1);
                warn!(workshop_id, ?delta, "counter update rolled back");
            }
            Err(err) => {
                error!(workshop_id, ?delta, error = %err, "counter rollback failed");
            }
        }
    }
}

fn rejected(workshop_id: &str, reason: RejectReason) -> SubmissionReceipt {
    let outcome = Outcome::Rejected { reason };
    record_outcome(workshop_id, &outcome);
    SubmissionReceipt {
        outcome,
        registration: None,
    }
}

fn record_outcome(workshop_id: &str, outcome: &Outcome) {
    let reason = match outcome {
        Outcome::Rejected { reason } => reason.as_str(),
        _ => "",
    };
    metrics::counter!(
        "workshop_admissions_total",
        "outcome" => outcome.label(),
        "reason" => reason,
    )
    .increment(1);
    if !reason.is_empty() {
        info!(workshop_id, reason, "submission rejected");
    }
}

/// Duplicate-detection key: SHA-256 over the workshop id and the respondent
/// identity, hex encoded.
fn dedupe_key(workshop_id: &str, identity: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(workshop_id.as_bytes());
    hasher.update(b"\n");
    hasher.update(identity.as_bytes());
    hex::encode(hasher.finalize())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
