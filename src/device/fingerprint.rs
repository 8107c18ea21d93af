//! Device fingerprinting for trial scoping.
//!
//! Derives a stable pseudo-identifier from environment signals supplied by
//! the host UI. This is a stable *label*, not cryptographic identity: a
//! motivated user can clear it, and the abuse heuristic exists precisely
//! because of that.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD as BASE64, Engine};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::clock::Clock;

/// Environment signals the host collects for fingerprinting.
///
/// All fields are free-form strings as reported by the embedding UI
/// (user agent, locale, screen geometry, timezone offset, rendered-canvas
/// hash). Missing signals may be left empty; the id is still stable as long
/// as the same signals are supplied on each boot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeviceSignals {
    /// Browser / host user agent string.
    pub user_agent: String,
    /// UI locale, e.g. "en-US".
    pub locale: String,
    /// Screen geometry, e.g. "1920x1080".
    pub screen: String,
    /// Timezone offset in minutes from UTC.
    pub timezone_offset: i32,
    /// Hash of a rendered canvas, as produced by the host.
    pub canvas_hash: String,
}

/// Stable device identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    /// Derive a fresh device id from environment signals plus a random salt.
    ///
    /// The salt (uuid + creation instant) makes ids from identical
    /// environments distinct; stability comes from persistence, not from
    /// re-derivation.
    pub fn derive(signals: &DeviceSignals, clock: &dyn Clock) -> Self {
        let salt = format!(
            "{}|{}",
            uuid::Uuid::new_v4(),
            clock.now_utc().timestamp_millis()
        );
        let combined = format!(
            "{}|{}|{}|{}|{}|{}",
            signals.user_agent,
            signals.locale,
            signals.screen,
            signals.timezone_offset,
            signals.canvas_hash,
            salt
        );

        let hash = Sha256::digest(combined.as_bytes());
        Self(format!("dev_{}", BASE64.encode(&hash[..16])))
    }

    /// The identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DeviceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Persisted record of a device's first contact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceRecord {
    /// The stable fingerprint-derived identifier.
    pub device_id: DeviceId,
    /// When the identifier was first created.
    pub created_at: DateTime<Utc>,
}

impl DeviceRecord {
    /// Create a record for a freshly derived device id.
    pub fn new(signals: &DeviceSignals, clock: &dyn Clock) -> Self {
        Self {
            device_id: DeviceId::derive(signals, clock),
            created_at: clock.now_utc(),
        }
    }
}
