//! Deterministic clock abstraction.
//!
//! Trial windows, the abuse heuristic, and audit retention all hinge on
//! wall-clock comparisons, so every time read goes through this trait.

use chrono::{DateTime, Utc};

/// Clock trait for deterministic time in tests.
pub trait Clock: Send + Sync {
    /// Get the current UTC time.
    fn now_utc(&self) -> DateTime<Utc>;
}

/// System clock using actual wall time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Mock clock frozen at a fixed instant, advanceable by hand.
#[cfg(any(test, feature = "test-seams"))]
#[derive(Debug, Clone)]
pub struct MockClock {
    now: DateTime<Utc>,
}

#[cfg(any(test, feature = "test-seams"))]
impl MockClock {
    /// Create a mock clock frozen at the given time.
    pub fn new(now: DateTime<Utc>) -> Self {
        Self { now }
    }

    /// Create a mock clock from an RFC 3339 string.
    pub fn from_rfc3339(s: &str) -> Self {
        Self {
            now: DateTime::parse_from_rfc3339(s)
                .expect("valid RFC 3339")
                .with_timezone(&Utc),
        }
    }

    /// Advance the clock by a duration.
    pub fn advance(&mut self, duration: chrono::Duration) {
        self.now += duration;
    }
}

#[cfg(any(test, feature = "test-seams"))]
impl Clock for MockClock {
    fn now_utc(&self) -> DateTime<Utc> {
        self.now
    }
}

/// Mock clock that can still be advanced after clones have been handed out,
/// for driving a running server through time in integration tests.
#[cfg(any(test, feature = "test-seams"))]
#[derive(Debug, Clone)]
pub struct SharedMockClock {
    now: std::sync::Arc<std::sync::Mutex<DateTime<Utc>>>,
}

#[cfg(any(test, feature = "test-seams"))]
impl SharedMockClock {
    /// Create a shared mock clock from an RFC 3339 string.
    pub fn from_rfc3339(s: &str) -> Self {
        let now = DateTime::parse_from_rfc3339(s)
            .expect("valid RFC 3339")
            .with_timezone(&Utc);
        Self {
            now: std::sync::Arc::new(std::sync::Mutex::new(now)),
        }
    }

    /// Advance the clock; every clone observes the new instant.
    pub fn advance(&self, duration: chrono::Duration) {
        *self.now.lock().expect("clock lock") += duration;
    }
}

#[cfg(any(test, feature = "test-seams"))]
impl Clock for SharedMockClock {
    fn now_utc(&self) -> DateTime<Utc> {
        *self.now.lock().expect("clock lock")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;

    #[test]
    fn system_clock_returns_current_time() {
        let now = SystemClock.now_utc();
        assert!(now.year() >= 2024);
    }

    #[test]
    fn mock_clock_is_frozen() {
        let clock = MockClock::from_rfc3339("2025-03-01T08:00:00Z");
        assert_eq!(clock.now_utc(), clock.now_utc());
    }

    #[test]
    fn mock_clock_advances() {
        let mut clock = MockClock::from_rfc3339("2025-03-01T08:00:00Z");
        clock.advance(chrono::Duration::days(5));
        assert_eq!(clock.now_utc().to_rfc3339(), "2025-03-06T08:00:00+00:00");
    }
}
