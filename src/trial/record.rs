//! Trial record and window math.
//!
//! The record is client-held and therefore advisory: the server re-derives
//! entitlement at the download boundary. The one invariant the client side
//! does own is that `end_date = start_date + trial_days` at creation and is
//! never extended by any mutation here.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::device::fingerprint::DeviceId;

const SECS_PER_DAY: i64 = 86_400;

/// Payment progress recorded alongside the trial window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// No payment claimed; the trial window governs access.
    Trial,
    /// A payment claim is awaiting manual verification.
    Submitted,
    /// An operator confirmed the payment.
    Verified,
    /// An operator rejected the payment claim.
    Rejected,
}

/// Client-held trial record, one per device installation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrialRecord {
    /// Device the trial is scoped to.
    pub device_id: DeviceId,
    /// Start of the trial window.
    pub start_date: DateTime<Utc>,
    /// End of the trial window; always `start_date + trial_days`.
    pub end_date: DateTime<Utc>,
    /// Cached activity flag trusted by the host UI. Derivable from the
    /// fields above; recomputed and persisted on expiry, never set true
    /// without the backing condition holding.
    pub is_active: bool,
    /// Payment progress.
    pub payment_status: PaymentStatus,
    /// Method of the most recent payment claim, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<String>,
    /// When the most recent payment claim was made.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_date: Option<DateTime<Utc>>,
    /// Plan tier; `"trial"` until a payment is verified.
    pub plan: String,
}

/// Snapshot of the trial window at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrialStatus {
    /// Whether access is currently active.
    pub is_active: bool,
    /// Whole days remaining, rounded up, clamped to zero.
    pub days_remaining: i64,
    /// Share of the window consumed, 0–100.
    pub percentage_used: i64,
}

impl TrialRecord {
    /// Start a fresh trial window for a device.
    pub fn start(device_id: DeviceId, trial_days: i64, clock: &dyn Clock) -> Self {
        let start_date = clock.now_utc();
        Self {
            device_id,
            start_date,
            end_date: start_date + Duration::days(trial_days),
            is_active: true,
            payment_status: PaymentStatus::Trial,
            payment_method: None,
            payment_date: None,
            plan: "trial".to_string(),
        }
    }

    /// Configured trial length, reconstructed from the window bounds.
    pub fn trial_days(&self) -> i64 {
        (self.end_date - self.start_date).num_days()
    }

    /// Compute the current status without mutating the record.
    pub fn status(&self, now: DateTime<Utc>) -> TrialStatus {
        let remaining_secs = (self.end_date - now).num_seconds();
        let days_remaining = if remaining_secs <= 0 {
            0
        } else {
            (remaining_secs + SECS_PER_DAY - 1) / SECS_PER_DAY
        };

        let is_active = (now < self.end_date && self.payment_status == PaymentStatus::Trial)
            || self.payment_status == PaymentStatus::Verified;

        let total = self.trial_days().max(1);
        let used = (total - days_remaining).clamp(0, total);
        let percentage_used = (used as f64 / total as f64 * 100.0).round() as i64;

        TrialStatus {
            is_active,
            days_remaining,
            percentage_used,
        }
    }

    /// Persistably flip `is_active` off once the window has lapsed.
    ///
    /// This is the only mutation the clock performs. It is idempotent and
    /// last-write-safe so concurrent tabs racing on the same record converge.
    /// Returns whether the flag changed.
    pub fn expire_if_needed(&mut self, now: DateTime<Utc>) -> bool {
        if self.is_active && now >= self.end_date && self.payment_status == PaymentStatus::Trial {
            self.is_active = false;
            return true;
        }
        false
    }

    /// Record a payment claim awaiting verification.
    pub fn note_payment_submitted(&mut self, method: &str, now: DateTime<Utc>) {
        self.payment_status = PaymentStatus::Submitted;
        self.payment_method = Some(method.to_string());
        self.payment_date = Some(now);
        self.is_active = false;
    }

    /// Record an operator-confirmed payment. Keeps access active
    /// independent of the original trial window.
    pub fn note_payment_verified(&mut self, plan: &str, now: DateTime<Utc>) {
        self.payment_status = PaymentStatus::Verified;
        self.payment_date = Some(now);
        self.plan = plan.to_string();
        self.is_active = true;
    }

    /// Record an operator rejection. A fresh submission is required to retry.
    pub fn note_payment_rejected(&mut self) {
        self.payment_status = PaymentStatus::Rejected;
        self.is_active = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::MockClock;
    use crate::device::fingerprint::{DeviceId, DeviceSignals};

    fn device(clock: &MockClock) -> DeviceId {
        DeviceId::derive(&DeviceSignals::default(), clock)
    }

    #[test]
    fn end_date_is_start_plus_trial_days() {
        let clock = MockClock::from_rfc3339("2025-03-01T00:00:00Z");
        let record = TrialRecord::start(device(&clock), 5, &clock);
        assert_eq!(record.end_date - record.start_date, Duration::days(5));
        assert_eq!(record.trial_days(), 5);
    }

    #[test]
    fn day_four_of_five_reports_one_day_remaining() {
        let mut clock = MockClock::from_rfc3339("2025-03-01T00:00:00Z");
        let record = TrialRecord::start(device(&clock), 5, &clock);

        clock.advance(Duration::days(4));
        let status = record.status(clock.now_utc());
        assert!(status.is_active);
        assert_eq!(status.days_remaining, 1);
        assert_eq!(status.percentage_used, 80);
    }

    #[test]
    fn one_second_past_window_is_expired() {
        let mut clock = MockClock::from_rfc3339("2025-03-01T00:00:00Z");
        let record = TrialRecord::start(device(&clock), 5, &clock);

        clock.advance(Duration::days(5) + Duration::seconds(1));
        let status = record.status(clock.now_utc());
        assert!(!status.is_active);
        assert_eq!(status.days_remaining, 0);
        assert_eq!(status.percentage_used, 100);
    }

    #[test]
    fn partial_day_rounds_up() {
        let mut clock = MockClock::from_rfc3339("2025-03-01T00:00:00Z");
        let record = TrialRecord::start(device(&clock), 5, &clock);

        // 4.5 days in: half a day left still counts as one day.
        clock.advance(Duration::days(4) + Duration::hours(12));
        assert_eq!(record.status(clock.now_utc()).days_remaining, 1);
    }

    #[test]
    fn verified_payment_outlives_the_window() {
        let mut clock = MockClock::from_rfc3339("2025-03-01T00:00:00Z");
        let mut record = TrialRecord::start(device(&clock), 5, &clock);
        record.note_payment_verified("pro", clock.now_utc());

        clock.advance(Duration::days(30));
        assert!(record.status(clock.now_utc()).is_active);
    }

    #[test]
    fn expire_if_needed_is_idempotent() {
        let mut clock = MockClock::from_rfc3339("2025-03-01T00:00:00Z");
        let mut record = TrialRecord::start(device(&clock), 5, &clock);

        clock.advance(Duration::days(6));
        assert!(record.expire_if_needed(clock.now_utc()));
        assert!(!record.expire_if_needed(clock.now_utc()));
        assert!(!record.is_active);
    }

    #[test]
    fn expire_does_not_touch_verified_records() {
        let mut clock = MockClock::from_rfc3339("2025-03-01T00:00:00Z");
        let mut record = TrialRecord::start(device(&clock), 5, &clock);
        record.note_payment_verified("pro", clock.now_utc());

        clock.advance(Duration::days(10));
        assert!(!record.expire_if_needed(clock.now_utc()));
        assert!(record.is_active);
    }

    #[test]
    fn mutations_never_extend_the_window() {
        let clock = MockClock::from_rfc3339("2025-03-01T00:00:00Z");
        let mut record = TrialRecord::start(device(&clock), 5, &clock);
        let end = record.end_date;

        record.note_payment_submitted("bank", clock.now_utc());
        record.note_payment_rejected();
        record.note_payment_verified("pro", clock.now_utc());
        assert_eq!(record.end_date, end);
    }

    #[test]
    fn record_round_trips_through_json() {
        let clock = MockClock::from_rfc3339("2025-03-01T00:00:00Z");
        let record = TrialRecord::start(device(&clock), 5, &clock);

        let json = serde_json::to_string(&record).unwrap();
        let restored: TrialRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.device_id, record.device_id);
        assert_eq!(restored.end_date, record.end_date);
        assert_eq!(restored.payment_status, PaymentStatus::Trial);
    }
}
