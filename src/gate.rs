//! The access decision made immediately before releasing an artifact.
//!
//! `authorize` is a pure function of the server-resolved entitlement and the
//! abuse flag: deterministic, safe to call repeatedly and concurrently, and
//! free of side effects — the audit trail is appended by the caller.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::entitlement::state::EntitlementState;

/// Supported download targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    /// Windows installer (`.exe`).
    Windows,
    /// macOS disk image (`.dmg`).
    Mac,
    /// Linux AppImage.
    Linux,
}

impl Platform {
    /// Artifact filename served for this platform.
    pub fn artifact_name(&self) -> &'static str {
        match self {
            Self::Windows => "trialgate-setup-windows.exe",
            Self::Mac => "trialgate-setup-mac.dmg",
            Self::Linux => "trialgate-setup-linux.AppImage",
        }
    }

    /// All supported platforms.
    pub fn all() -> [Platform; 3] {
        [Self::Windows, Self::Mac, Self::Linux]
    }

    /// Best guess from a User-Agent string, for the info endpoint.
    pub fn recommend_from_user_agent(user_agent: &str) -> Platform {
        if user_agent.contains("Mac") {
            Self::Mac
        } else if user_agent.contains("Linux") {
            Self::Linux
        } else {
            Self::Windows
        }
    }
}

impl FromStr for Platform {
    type Err = UnsupportedPlatform;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "windows" => Ok(Self::Windows),
            "mac" | "macos" => Ok(Self::Mac),
            "linux" => Ok(Self::Linux),
            other => Err(UnsupportedPlatform(other.to_string())),
        }
    }
}

impl fmt::Display for Platform {
    // Matches the serde names so audit entries and URLs stay consistent.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Windows => "windows",
            Self::Mac => "mac",
            Self::Linux => "linux",
        };
        f.write_str(s)
    }
}

/// Requested platform is not a supported target.
///
/// Surfaced as a plain 404 so invalid requests learn nothing about the
/// requester's entitlement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsupportedPlatform(pub String);

/// Machine-readable reason for a refusal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    /// Trial window lapsed with no verified payment.
    TrialExpired,
    /// A payment claim is still awaiting manual verification.
    PaymentPending,
    /// The most recent payment claim was rejected.
    PaymentRejected,
    /// Device churn tripped the abuse heuristic under hard-block policy.
    SuspiciousActivity,
}

impl DenyReason {
    /// Human-readable message paired with the reason code.
    pub fn message(&self) -> &'static str {
        match self {
            Self::TrialExpired => {
                "Your trial has expired. Please upgrade to download the desktop app."
            }
            Self::PaymentPending => {
                "Your payment is being verified. You will regain access once it is confirmed."
            }
            Self::PaymentRejected => {
                "Your payment could not be verified. Please submit a new payment reference."
            }
            Self::SuspiciousActivity => "Suspicious activity detected. Please contact support.",
        }
    }

    /// Whether the refusal is resolved by purchasing a plan.
    pub fn upgrade_required(&self) -> bool {
        matches!(self, Self::TrialExpired | Self::PaymentRejected)
    }
}

/// Outcome of the gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Access {
    /// Stream the artifact.
    Allow,
    /// Refuse, with a machine-readable reason.
    Deny(DenyReason),
}

impl Access {
    /// Whether the gate allowed the request.
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }
}

/// Decide whether a subject may download right now.
///
/// The platform must already have been validated; this function only weighs
/// entitlement against the abuse flag. A suspicious flag denies only under
/// hard-block policy — by default it stays a soft signal for manual review.
pub fn authorize(entitlement: &EntitlementState, suspicious: bool, hard_block: bool) -> Access {
    if suspicious && hard_block {
        return Access::Deny(DenyReason::SuspiciousActivity);
    }

    match entitlement {
        EntitlementState::Verified { .. } | EntitlementState::TrialActive { .. } => Access::Allow,
        EntitlementState::TrialExpired => Access::Deny(DenyReason::TrialExpired),
        EntitlementState::PaymentSubmitted => Access::Deny(DenyReason::PaymentPending),
        EntitlementState::Rejected => Access::Deny(DenyReason::PaymentRejected),
    }
}
