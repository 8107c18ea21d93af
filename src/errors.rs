//! Trialgate error types.
//!
//! A gate refusal is *not* an error: [`crate::gate::Access::Deny`] carries a
//! machine-readable reason and is returned on the happy path. The variants
//! here cover malformed input, storage trouble, and transfer failures — none
//! of which are fatal to the host process.

use thiserror::Error;

/// Errors that can occur in the entitlement and download-gating subsystem.
#[derive(Debug, Error)]
pub enum TrialgateError {
    /// Configuration is invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed submission input. No state change occurred.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A payment submission is already awaiting verification for this subject.
    #[error("A payment submission is already pending")]
    AlreadyPending,

    /// The subject already holds a verified payment; there is nothing to
    /// submit until the billing period rolls over.
    #[error("Payment is already verified")]
    AlreadyVerified,

    /// An operator decision was recorded for a subject with nothing pending.
    #[error("No pending payment submission for subject")]
    NoPendingSubmission,

    /// Subject has no subscription record on the server.
    #[error("Unknown subject: {0}")]
    UnknownSubject(String),

    /// Client-side persistence failed. Callers degrade to ephemeral state.
    #[error("Local storage unavailable: {0}")]
    StorageUnavailable(String),

    /// Client store I/O error.
    #[error("Store I/O error: {0}")]
    StoreIO(String),

    /// Audit log I/O error.
    #[error("Audit I/O error: {0}")]
    AuditIO(String),

    /// Download transfer failed mid-stream. Safe to retry with a fresh
    /// authorization check.
    #[error("Download stream interrupted: {0}")]
    StreamInterrupted(String),
}
