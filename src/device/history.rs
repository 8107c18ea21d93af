//! Bounded device-history ring.
//!
//! One entry per client boot, owned by the abuse heuristic. Capacity is an
//! explicit invariant: the ring never exceeds its retention count and always
//! evicts the oldest entry first.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::device::fingerprint::DeviceId;

/// A single device sighting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceHistoryEntry {
    /// Device id active at the time.
    pub device_id: DeviceId,
    /// When the sighting was recorded.
    pub timestamp: DateTime<Utc>,
}

/// Append-only ring of recent device sightings with FIFO eviction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceHistory {
    entries: VecDeque<DeviceHistoryEntry>,
    retention: usize,
}

impl DeviceHistory {
    /// Create an empty history retaining at most `retention` entries.
    pub fn new(retention: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(retention),
            retention,
        }
    }

    /// Append a sighting, evicting the oldest entry when full.
    pub fn push(&mut self, device_id: DeviceId, timestamp: DateTime<Utc>) {
        while self.entries.len() >= self.retention {
            self.entries.pop_front();
        }
        self.entries.push_back(DeviceHistoryEntry {
            device_id,
            timestamp,
        });
    }

    /// Count entries with a timestamp inside the trailing window ending `now`.
    pub fn count_within(&self, now: DateTime<Utc>, window: chrono::Duration) -> usize {
        let cutoff = now - window;
        self.entries
            .iter()
            .filter(|e| e.timestamp > cutoff && e.timestamp <= now)
            .count()
    }

    /// Number of retained entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the ring holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over retained entries, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &DeviceHistoryEntry> {
        self.entries.iter()
    }
}
