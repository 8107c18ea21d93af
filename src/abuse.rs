//! Trial-reset abuse heuristic.
//!
//! A cleared local store shows up as a brand-new device id, so rapid device
//! churn on one machine is the signature of someone farming trial windows.
//! The heuristic counts device sightings inside a trailing window and then
//! records the current sighting, making it a detector and a recorder in one
//! pass.
//!
//! This is a heuristic, not a proof. Shared machines and legitimate
//! reinstalls produce false positives, so the flag routes to a soft warning
//! and manual review unless the deployment explicitly opts into hard
//! blocking.

use chrono::{DateTime, Duration, Utc};
use tracing::warn;

use crate::config::TrialgateConfig;
use crate::device::fingerprint::DeviceId;
use crate::device::history::DeviceHistory;

/// Device-churn detector over a bounded history ring.
#[derive(Debug, Clone)]
pub struct AbuseHeuristic {
    window: Duration,
    threshold: usize,
}

impl AbuseHeuristic {
    /// Build a heuristic from configured thresholds.
    pub fn new(config: &TrialgateConfig) -> Self {
        Self {
            window: Duration::hours(config.suspicion_window_hours),
            threshold: config.suspicion_threshold,
        }
    }

    /// Inspect recent churn, then record the current sighting.
    ///
    /// Returns `true` when the sightings already inside the trailing window
    /// exceed the threshold. The append happens regardless of the verdict,
    /// and the ring's FIFO bound is enforced by [`DeviceHistory::push`].
    pub fn observe(
        &self,
        history: &mut DeviceHistory,
        device_id: &DeviceId,
        now: DateTime<Utc>,
    ) -> bool {
        let recent = history.count_within(now, self.window);
        let suspicious = recent > self.threshold;

        if suspicious {
            warn!(
                device = %device_id,
                recent,
                threshold = self.threshold,
                "device churn exceeds threshold, flagging for review"
            );
        }

        history.push(device_id.clone(), now);
        suspicious
    }
}
