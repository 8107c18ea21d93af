//! Payment submission capture.
//!
//! A submission is a *claim*: method, reference, and plan, exactly as the
//! user typed them. It is immutable once created; retrying means creating a
//! new submission. Validation here is structural only ("looks like a real
//! reference"), never proof of payment — that is the operator's job.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::clock::Clock;
use crate::TrialgateError;

/// Out-of-band payment channels the operator can verify against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// EasyPaisa mobile wallet.
    Easypaisa,
    /// JazzCash mobile wallet.
    Jazzcash,
    /// Direct bank transfer.
    Bank,
    /// Cash handed over in person.
    Cash,
}

impl FromStr for PaymentMethod {
    type Err = TrialgateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "easypaisa" => Ok(Self::Easypaisa),
            "jazzcash" => Ok(Self::Jazzcash),
            "bank" => Ok(Self::Bank),
            "cash" => Ok(Self::Cash),
            other => Err(TrialgateError::Validation(format!(
                "unknown payment method: {other}"
            ))),
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Easypaisa => "easypaisa",
            Self::Jazzcash => "jazzcash",
            Self::Bank => "bank",
            Self::Cash => "cash",
        };
        f.write_str(s)
    }
}

/// Opaque submission identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubmissionId(uuid::Uuid);

impl SubmissionId {
    fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl fmt::Display for SubmissionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// An immutable payment claim awaiting manual verification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentSubmission {
    /// Unique id, referenced by the operator's decision.
    pub id: SubmissionId,
    /// Claimed payment channel.
    pub method: PaymentMethod,
    /// Transaction reference as supplied by the user.
    pub reference: String,
    /// Plan tier being purchased.
    pub plan: String,
    /// When the claim was made.
    pub submitted_at: DateTime<Utc>,
}

impl PaymentSubmission {
    /// Capture a new payment claim.
    ///
    /// # Errors
    /// `Validation` when the reference is empty, shorter than
    /// `min_reference_len`, or the plan is blank. No state changes on error.
    pub fn new(
        method: PaymentMethod,
        reference: &str,
        plan: &str,
        min_reference_len: usize,
        clock: &dyn Clock,
    ) -> Result<Self, TrialgateError> {
        let reference = reference.trim();
        if reference.is_empty() {
            return Err(TrialgateError::Validation(
                "payment reference is required".to_string(),
            ));
        }
        if reference.len() < min_reference_len {
            return Err(TrialgateError::Validation(format!(
                "payment reference must be at least {min_reference_len} characters"
            )));
        }
        let plan = plan.trim();
        if plan.is_empty() {
            return Err(TrialgateError::Validation("plan is required".to_string()));
        }

        Ok(Self {
            id: SubmissionId::new(),
            method,
            reference: reference.to_string(),
            plan: plan.to_string(),
            submitted_at: clock.now_utc(),
        })
    }
}
