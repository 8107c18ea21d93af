//! In-memory subscription store with per-subject locking.
//!
//! Each subject's record sits behind its own mutex so entitlement
//! resolution never serializes globally; the outer map lock is held only
//! long enough to find or insert the entry. The "at most one pending
//! submission" rule is enforced under the subject lock, so the
//! compare-and-set holds even when one subject hammers the submission
//! endpoint concurrently.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use chrono::{DateTime, Utc};
use tracing::info;

use crate::clock::Clock;
use crate::entitlement::state::{EntitlementState, SubscriptionRecord};
use crate::payment::pipeline::{OperatorDecision, VerificationOutcome};
use crate::payment::submission::{PaymentSubmission, SubmissionId};
use crate::TrialgateError;

/// Server-of-record store, keyed by subject id.
pub struct SubscriptionStore {
    trial_days: i64,
    subjects: RwLock<HashMap<String, Arc<Mutex<SubscriptionRecord>>>>,
}

impl SubscriptionStore {
    /// Create an empty store issuing trials of the given length.
    pub fn new(trial_days: i64) -> Self {
        Self {
            trial_days,
            subjects: RwLock::new(HashMap::new()),
        }
    }

    /// Find or create the subject's entry. First contact opens a trial.
    fn entry(&self, subject_id: &str, clock: &dyn Clock) -> Arc<Mutex<SubscriptionRecord>> {
        if let Some(entry) = self.subjects.read().expect("subjects lock").get(subject_id) {
            return Arc::clone(entry);
        }

        let mut map = self.subjects.write().expect("subjects lock");
        // Another request may have created the entry between the locks.
        Arc::clone(map.entry(subject_id.to_string()).or_insert_with(|| {
            info!(subject = subject_id, "first contact, opening trial window");
            Arc::new(Mutex::new(SubscriptionRecord::first_contact(
                subject_id,
                self.trial_days,
                clock,
            )))
        }))
    }

    /// Re-derive the subject's entitlement at decision time.
    ///
    /// Returns the state plus the suspicious marker and tier the gate and
    /// audit trail need, so callers take the subject lock exactly once.
    pub fn resolve(
        &self,
        subject_id: &str,
        clock: &dyn Clock,
    ) -> (EntitlementState, bool, String) {
        let entry = self.entry(subject_id, clock);
        let record = entry.lock().expect("subject lock");
        (
            record.entitlement(clock.now_utc()),
            record.flagged_suspicious,
            record.tier().to_string(),
        )
    }

    /// Hold a payment submission for the subject.
    ///
    /// # Errors
    /// `AlreadyPending` when a submission is already awaiting verification;
    /// the check and the write happen under one subject lock.
    pub fn begin_submission(
        &self,
        subject_id: &str,
        submission: PaymentSubmission,
        clock: &dyn Clock,
    ) -> Result<SubmissionId, TrialgateError> {
        let entry = self.entry(subject_id, clock);
        let mut record = entry.lock().expect("subject lock");
        let id = record.submit(submission)?;
        info!(subject = subject_id, submission = %id, "payment submission held for verification");
        Ok(id)
    }

    /// Apply an operator decision to the subject's pending submission.
    pub fn resolve_submission(
        &self,
        subject_id: &str,
        decision: &OperatorDecision,
        now: DateTime<Utc>,
    ) -> Result<VerificationOutcome, TrialgateError> {
        let entry = {
            let map = self.subjects.read().expect("subjects lock");
            map.get(subject_id)
                .cloned()
                .ok_or_else(|| TrialgateError::UnknownSubject(subject_id.to_string()))?
        };

        let mut record = entry.lock().expect("subject lock");
        let outcome = record.apply_decision(decision, now)?;
        info!(
            subject = subject_id,
            approved = outcome.approved,
            "operator decision applied"
        );
        Ok(outcome)
    }

    /// Set or clear the subject's suspicious marker.
    pub fn mark_suspicious(&self, subject_id: &str, flagged: bool, clock: &dyn Clock) {
        let entry = self.entry(subject_id, clock);
        entry.lock().expect("subject lock").flagged_suspicious = flagged;
    }

    /// Snapshot a subject's record, if one exists.
    pub fn get(&self, subject_id: &str) -> Option<SubscriptionRecord> {
        let map = self.subjects.read().expect("subjects lock");
        map.get(subject_id)
            .map(|entry| entry.lock().expect("subject lock").clone())
    }
}
