//! Manual verification pipeline.
//!
//! Verification is a human step: an operator checks the claimed reference
//! against the out-of-band payment channel and records a decision. The
//! pipeline's job is to hold a submission in its pending state and apply
//! whatever terminal outcome the operator enters. Nothing in production
//! approves a payment automatically.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::payment::submission::{PaymentSubmission, SubmissionId};

/// The decision an operator records for a pending submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperatorDecision {
    /// Whether the payment was confirmed on the out-of-band channel.
    pub approved: bool,
    /// Free-form operator note, surfaced to the user on rejection.
    #[serde(default)]
    pub reason: Option<String>,
}

impl OperatorDecision {
    /// An approval with no note.
    pub fn approve() -> Self {
        Self {
            approved: true,
            reason: None,
        }
    }

    /// A rejection with an operator note.
    pub fn reject(reason: impl Into<String>) -> Self {
        Self {
            approved: false,
            reason: Some(reason.into()),
        }
    }
}

/// Terminal outcome applied to a submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationOutcome {
    /// The submission this outcome resolves.
    pub submission_id: SubmissionId,
    /// Whether the payment was approved.
    pub approved: bool,
    /// Operator note, if any.
    pub reason: Option<String>,
    /// When the decision was recorded.
    pub decided_at: DateTime<Utc>,
}

impl VerificationOutcome {
    /// Bind an operator decision to a submission.
    pub fn from_decision(
        submission: &PaymentSubmission,
        decision: &OperatorDecision,
        decided_at: DateTime<Utc>,
    ) -> Self {
        Self {
            submission_id: submission.id,
            approved: decision.approved,
            reason: decision.reason.clone(),
            decided_at,
        }
    }
}

/// Development-only auto-approval: accepts any reference of plausible length.
///
/// This mirrors the pattern-match stub the product shipped with during
/// development. It is compiled out of production builds and must never be
/// treated as a security control; the operator path above is the real
/// authority.
#[cfg(any(test, feature = "dev-autoverify"))]
pub fn dev_autoverify(submission: &PaymentSubmission) -> OperatorDecision {
    if submission.reference.len() > 5 {
        OperatorDecision::approve()
    } else {
        OperatorDecision::reject("reference too short to look real")
    }
}
