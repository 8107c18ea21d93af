//! Trialgate configuration.

use std::path::PathBuf;

/// Configuration for trial and download gating.
///
/// One instance is shared by the client-side [`crate::manager::TrialManager`]
/// and the server-side gate. Defaults mirror the shipped product policy:
/// a 5-day trial, a 24-hour abuse window, and a 10-entry device history ring.
#[derive(Debug, Clone)]
pub struct TrialgateConfig {
    /// Length of the free trial window, in days.
    pub trial_days: i64,

    /// Namespace under `dirs::data_dir()` for the client store.
    /// Each product should use a unique namespace to avoid collisions.
    pub storage_namespace: String,

    /// Maximum device-history entries retained (FIFO eviction beyond this).
    pub history_retention: usize,

    /// Trailing window, in hours, inspected by the abuse heuristic.
    pub suspicion_window_hours: i64,

    /// More than this many device-history entries inside the window
    /// flags the device as suspicious.
    pub suspicion_threshold: usize,

    /// Whether a suspicious flag hard-blocks downloads. Default is a soft
    /// warning routed to manual review; the signal is self-reported by an
    /// untrusted client.
    pub suspicious_hard_block: bool,

    /// Minimum payment reference length accepted at submission time.
    pub min_reference_len: usize,

    /// Directory holding the downloadable artifacts, one file per platform.
    pub downloads_dir: PathBuf,
}

impl Default for TrialgateConfig {
    fn default() -> Self {
        Self {
            trial_days: 5,
            storage_namespace: "trialgate".to_string(),
            history_retention: 10,
            suspicion_window_hours: 24,
            suspicion_threshold: 3,
            suspicious_hard_block: false,
            min_reference_len: 6,
            downloads_dir: PathBuf::from("downloads"),
        }
    }
}

impl TrialgateConfig {
    /// Validate configuration for obvious errors.
    pub fn validate(&self) -> Result<(), crate::TrialgateError> {
        if self.trial_days <= 0 {
            return Err(crate::TrialgateError::Config(
                "trial_days must be positive".to_string(),
            ));
        }
        if self.storage_namespace.is_empty() {
            return Err(crate::TrialgateError::Config(
                "storage_namespace cannot be empty".to_string(),
            ));
        }
        if self.history_retention == 0 {
            return Err(crate::TrialgateError::Config(
                "history_retention must be at least 1".to_string(),
            ));
        }
        if self.min_reference_len == 0 {
            return Err(crate::TrialgateError::Config(
                "min_reference_len must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
