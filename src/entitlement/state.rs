//! The entitlement state machine.
//!
//! One tagged value combines trial status, payment verification outcome, and
//! subscription tier. It is re-derived from the server-held
//! [`SubscriptionRecord`] at every decision point; whatever the client says
//! about itself is a hint, never an input to the gate.
//!
//! Legal transitions:
//!
//! ```text
//! TrialActive ──(time)──► TrialExpired
//! TrialActive | TrialExpired | Rejected ──(submit)──► PaymentSubmitted
//! PaymentSubmitted ──(operator approve)──► Verified(plan)   terminal for the period
//! PaymentSubmitted ──(operator reject)───► Rejected         resubmission allowed
//! ```
//!
//! Only time expires a trial; no user action moves a record back to
//! `TrialExpired`, and nothing leaves `Verified` automatically.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::payment::pipeline::{OperatorDecision, VerificationOutcome};
use crate::payment::submission::{PaymentSubmission, SubmissionId};
use crate::TrialgateError;

const SECS_PER_DAY: i64 = 86_400;

/// Payment progress on the server-of-record side.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PaymentState {
    /// No payment activity; the trial window governs.
    None,
    /// A submission is held awaiting the operator.
    Pending {
        /// The claim under review.
        submission: PaymentSubmission,
    },
    /// Operator confirmed payment.
    Verified {
        /// Purchased plan tier.
        plan: String,
        /// When the operator confirmed.
        verified_at: DateTime<Utc>,
    },
    /// Operator rejected the claim; the user may resubmit.
    Rejected {
        /// Operator note, surfaced to the user.
        reason: Option<String>,
        /// When the operator rejected.
        rejected_at: DateTime<Utc>,
    },
}

/// Authoritative per-subject record consulted by the download gate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionRecord {
    /// Account or device the record is keyed by.
    pub subject_id: String,
    /// Start of the trial window, set on first contact.
    pub trial_started: DateTime<Utc>,
    /// End of the trial window; never extended by user action.
    pub trial_ends: DateTime<Utc>,
    /// Payment progress.
    pub payment: PaymentState,
    /// Operator- or heuristic-set review marker. Soft by default.
    pub flagged_suspicious: bool,
}

impl SubscriptionRecord {
    /// Create a record on first contact, opening the trial window.
    pub fn first_contact(subject_id: &str, trial_days: i64, clock: &dyn Clock) -> Self {
        let now = clock.now_utc();
        Self {
            subject_id: subject_id.to_string(),
            trial_started: now,
            trial_ends: now + Duration::days(trial_days),
            payment: PaymentState::None,
            flagged_suspicious: false,
        }
    }

    /// Hold a payment submission for verification.
    ///
    /// Legal only from the trial states and `Rejected`.
    ///
    /// # Errors
    /// `AlreadyPending` if a submission is already awaiting the operator
    /// (a second submission never displaces the first), `AlreadyVerified`
    /// if the subject already holds a confirmed payment — `Verified` is
    /// terminal for the billing period and is never overwritten.
    pub fn submit(&mut self, submission: PaymentSubmission) -> Result<SubmissionId, TrialgateError> {
        match self.payment {
            PaymentState::Pending { .. } => return Err(TrialgateError::AlreadyPending),
            PaymentState::Verified { .. } => return Err(TrialgateError::AlreadyVerified),
            PaymentState::None | PaymentState::Rejected { .. } => {}
        }
        let id = submission.id;
        self.payment = PaymentState::Pending { submission };
        Ok(id)
    }

    /// Apply the operator's terminal decision to the pending submission.
    ///
    /// # Errors
    /// `NoPendingSubmission` when nothing is awaiting verification.
    pub fn apply_decision(
        &mut self,
        decision: &OperatorDecision,
        now: DateTime<Utc>,
    ) -> Result<VerificationOutcome, TrialgateError> {
        let PaymentState::Pending { submission } = &self.payment else {
            return Err(TrialgateError::NoPendingSubmission);
        };

        let outcome = VerificationOutcome::from_decision(submission, decision, now);
        let plan = submission.plan.clone();
        self.payment = if decision.approved {
            PaymentState::Verified {
                plan,
                verified_at: now,
            }
        } else {
            PaymentState::Rejected {
                reason: decision.reason.clone(),
                rejected_at: now,
            }
        };
        Ok(outcome)
    }

    /// Re-derive the current entitlement value. Pure; call at decision time.
    pub fn entitlement(&self, now: DateTime<Utc>) -> EntitlementState {
        match &self.payment {
            PaymentState::Verified { plan, .. } => EntitlementState::Verified { plan: plan.clone() },
            PaymentState::Pending { .. } => EntitlementState::PaymentSubmitted,
            PaymentState::Rejected { .. } => EntitlementState::Rejected,
            PaymentState::None => {
                if now < self.trial_ends {
                    let secs = (self.trial_ends - now).num_seconds();
                    EntitlementState::TrialActive {
                        days_remaining: (secs + SECS_PER_DAY - 1) / SECS_PER_DAY,
                    }
                } else {
                    EntitlementState::TrialExpired
                }
            }
        }
    }

    /// Current plan tier label, for audit entries and status views.
    pub fn tier(&self) -> &str {
        match &self.payment {
            PaymentState::Verified { plan, .. } => plan,
            _ => "trial",
        }
    }
}

/// The single current entitlement value the download boundary trusts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum EntitlementState {
    /// Trial window still open.
    TrialActive {
        /// Whole days left, rounded up.
        days_remaining: i64,
    },
    /// Trial window lapsed with no verified payment.
    TrialExpired,
    /// A payment claim is awaiting manual verification.
    PaymentSubmitted,
    /// Payment confirmed; carries the purchased tier.
    Verified {
        /// Purchased plan tier.
        plan: String,
    },
    /// The most recent payment claim was rejected.
    Rejected,
}

impl EntitlementState {
    /// Whether this state, on its own, permits a download.
    pub fn permits_download(&self) -> bool {
        matches!(
            self,
            Self::TrialActive { .. } | Self::Verified { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{Clock, MockClock};
    use crate::payment::submission::PaymentMethod;

    fn submission(clock: &dyn Clock) -> PaymentSubmission {
        PaymentSubmission::new(PaymentMethod::Bank, "REF123456", "pro", 6, clock).unwrap()
    }

    #[test]
    fn first_contact_opens_an_active_trial() {
        let clock = MockClock::from_rfc3339("2025-03-01T00:00:00Z");
        let record = SubscriptionRecord::first_contact("acct-1", 5, &clock);

        assert_eq!(
            record.entitlement(clock.now_utc()),
            EntitlementState::TrialActive { days_remaining: 5 }
        );
    }

    #[test]
    fn trial_expires_by_time_alone() {
        let mut clock = MockClock::from_rfc3339("2025-03-01T00:00:00Z");
        let record = SubscriptionRecord::first_contact("acct-1", 5, &clock);

        clock.advance(Duration::days(5) + Duration::seconds(1));
        assert_eq!(
            record.entitlement(clock.now_utc()),
            EntitlementState::TrialExpired
        );
    }

    #[test]
    fn submission_moves_state_to_payment_submitted() {
        let clock = MockClock::from_rfc3339("2025-03-01T00:00:00Z");
        let mut record = SubscriptionRecord::first_contact("acct-1", 5, &clock);
        record.submit(submission(&clock)).unwrap();

        assert_eq!(
            record.entitlement(clock.now_utc()),
            EntitlementState::PaymentSubmitted
        );
    }

    #[test]
    fn second_submission_is_already_pending() {
        let clock = MockClock::from_rfc3339("2025-03-01T00:00:00Z");
        let mut record = SubscriptionRecord::first_contact("acct-1", 5, &clock);
        record.submit(submission(&clock)).unwrap();

        let result = record.submit(submission(&clock));
        assert!(matches!(result, Err(TrialgateError::AlreadyPending)));
        // The original claim was not displaced.
        assert!(matches!(record.payment, PaymentState::Pending { .. }));
    }

    #[test]
    fn approval_verifies_with_the_submitted_plan() {
        let mut clock = MockClock::from_rfc3339("2025-03-01T00:00:00Z");
        let mut record = SubscriptionRecord::first_contact("acct-1", 5, &clock);
        record.submit(submission(&clock)).unwrap();

        clock.advance(Duration::days(1));
        let outcome = record
            .apply_decision(&OperatorDecision::approve(), clock.now_utc())
            .unwrap();
        assert!(outcome.approved);

        // Verified access outlives the original trial window.
        clock.advance(Duration::days(30));
        assert_eq!(
            record.entitlement(clock.now_utc()),
            EntitlementState::Verified {
                plan: "pro".to_string()
            }
        );
        assert_eq!(record.tier(), "pro");
    }

    #[test]
    fn rejection_allows_resubmission() {
        let clock = MockClock::from_rfc3339("2025-03-01T00:00:00Z");
        let mut record = SubscriptionRecord::first_contact("acct-1", 5, &clock);
        record.submit(submission(&clock)).unwrap();
        record
            .apply_decision(&OperatorDecision::reject("no transfer found"), clock.now_utc())
            .unwrap();

        assert_eq!(
            record.entitlement(clock.now_utc()),
            EntitlementState::Rejected
        );

        // The resubmission edge is the one legal way out of Rejected.
        record.submit(submission(&clock)).unwrap();
        assert_eq!(
            record.entitlement(clock.now_utc()),
            EntitlementState::PaymentSubmitted
        );
    }

    #[test]
    fn verified_record_rejects_new_submissions() {
        let clock = MockClock::from_rfc3339("2025-03-01T00:00:00Z");
        let mut record = SubscriptionRecord::first_contact("acct-1", 5, &clock);
        record.submit(submission(&clock)).unwrap();
        record
            .apply_decision(&OperatorDecision::approve(), clock.now_utc())
            .unwrap();

        let result = record.submit(submission(&clock));
        assert!(matches!(result, Err(TrialgateError::AlreadyVerified)));

        // The verified plan was not displaced.
        assert!(matches!(record.payment, PaymentState::Verified { .. }));
        assert_eq!(
            record.entitlement(clock.now_utc()),
            EntitlementState::Verified {
                plan: "pro".to_string()
            }
        );
    }

    #[test]
    fn decision_without_pending_submission_fails() {
        let clock = MockClock::from_rfc3339("2025-03-01T00:00:00Z");
        let mut record = SubscriptionRecord::first_contact("acct-1", 5, &clock);

        let result = record.apply_decision(&OperatorDecision::approve(), clock.now_utc());
        assert!(matches!(result, Err(TrialgateError::NoPendingSubmission)));
    }

    #[test]
    fn resolution_is_pure_and_repeatable() {
        let clock = MockClock::from_rfc3339("2025-03-01T00:00:00Z");
        let record = SubscriptionRecord::first_contact("acct-1", 5, &clock);
        let now = clock.now_utc();

        assert_eq!(record.entitlement(now), record.entitlement(now));
    }

    #[test]
    fn permits_download_matches_gate_inputs() {
        assert!(EntitlementState::TrialActive { days_remaining: 2 }.permits_download());
        assert!(EntitlementState::Verified {
            plan: "pro".to_string()
        }
        .permits_download());
        assert!(!EntitlementState::TrialExpired.permits_download());
        assert!(!EntitlementState::PaymentSubmitted.permits_download());
        assert!(!EntitlementState::Rejected.permits_download());
    }
}
