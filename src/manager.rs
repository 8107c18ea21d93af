//! Trial manager — the client-side facade.
//!
//! Owns the persisted client state (device identity, trial record, history
//! ring) and composes the trial clock with the abuse heuristic. Everything
//! here is advisory from the server's point of view: the download boundary
//! re-derives entitlement on its own. The manager's job is to keep the host
//! UI honest and never to crash it, whatever the local storage does.

use std::sync::Arc;

use tracing::{info, warn};

use crate::abuse::AbuseHeuristic;
use crate::clock::{Clock, SystemClock};
use crate::config::TrialgateConfig;
use crate::device::fingerprint::{DeviceId, DeviceRecord, DeviceSignals};
use crate::trial::record::{PaymentStatus, TrialRecord, TrialStatus};
use crate::trial::store::{ClientState, ClientStore};
use crate::TrialgateError;

/// Why the client-side check granted or withheld access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessReason {
    /// Trial active or payment verified.
    Valid,
    /// Trial window lapsed with no verified payment.
    TrialExpired,
    /// Device churn tripped the heuristic under hard-block policy.
    SuspiciousActivity,
}

/// Result of the client-side access check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessCheck {
    /// Whether the host UI should keep the product unlocked.
    pub has_access: bool,
    /// Machine-readable reason.
    pub reason: AccessReason,
    /// Whether the heuristic flagged this device, regardless of outcome.
    pub suspicious: bool,
}

/// Client-side trial facade. Create one per host process and reuse it.
pub struct TrialManager {
    config: TrialgateConfig,
    clock: Arc<dyn Clock>,
    store: ClientStore,
    heuristic: AbuseHeuristic,
    state: ClientState,
}

impl TrialManager {
    /// Create a manager using the system clock and the configured store.
    ///
    /// Storage trouble degrades to ephemeral state; only an invalid
    /// configuration is an error.
    pub fn new(config: TrialgateConfig, signals: &DeviceSignals) -> Result<Self, TrialgateError> {
        config.validate()?;
        let store = ClientStore::open(&config.storage_namespace, config.history_retention);
        Ok(Self::assemble(config, signals, store, Arc::new(SystemClock)))
    }

    /// Create a manager with an explicit store and clock (tests).
    #[cfg(any(test, feature = "test-seams"))]
    pub fn with_parts(
        config: TrialgateConfig,
        signals: &DeviceSignals,
        store: ClientStore,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, TrialgateError> {
        config.validate()?;
        Ok(Self::assemble(config, signals, store, clock))
    }

    fn assemble(
        config: TrialgateConfig,
        signals: &DeviceSignals,
        store: ClientStore,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let heuristic = AbuseHeuristic::new(&config);
        let mut state = store.load();

        if state.device.is_none() {
            state.device = Some(DeviceRecord::new(signals, clock.as_ref()));
        }

        let mut manager = Self {
            config,
            clock,
            store,
            heuristic,
            state,
        };
        manager.persist();
        manager
    }

    /// The stable device identifier for this installation.
    pub fn device_id(&self) -> &DeviceId {
        // assemble() always fills the device record
        &self.state.device.as_ref().expect("device record").device_id
    }

    /// Start the trial window, or return the existing record unchanged.
    ///
    /// Idempotent: a second call never resets the clock.
    pub fn start_trial(&mut self) -> TrialRecord {
        if let Some(record) = &self.state.trial {
            return record.clone();
        }

        let record = TrialRecord::start(
            self.device_id().clone(),
            self.config.trial_days,
            self.clock.as_ref(),
        );
        info!(device = %record.device_id, until = %record.end_date, "trial window opened");
        self.state.trial = Some(record.clone());
        self.persist();
        record
    }

    /// Current trial status. Persists the expiry flip when the window has
    /// lapsed; never extends a window.
    pub fn status(&mut self) -> TrialStatus {
        if self.state.trial.is_none() {
            self.start_trial();
        }

        let now = self.clock.now_utc();
        let record = self.state.trial.as_mut().expect("trial record");
        let status = record.status(now);
        let expired = record.expire_if_needed(now);

        if expired {
            info!(device = %self.device_id(), "trial window lapsed");
            self.persist();
        }
        status
    }

    /// Full client-side access check: trial status plus the abuse heuristic.
    ///
    /// The heuristic both inspects and appends to the device history, so
    /// each call records one sighting. A suspicious flag withholds access
    /// only under hard-block policy; by default it is surfaced for manual
    /// review and access follows the trial status alone.
    pub fn validate_access(&mut self) -> AccessCheck {
        let now = self.clock.now_utc();
        let device_id = self.device_id().clone();
        let suspicious = self
            .heuristic
            .observe(&mut self.state.history, &device_id, now);
        let status = self.status();
        self.persist();

        if suspicious && self.config.suspicious_hard_block {
            return AccessCheck {
                has_access: false,
                reason: AccessReason::SuspiciousActivity,
                suspicious,
            };
        }

        if !status.is_active {
            return AccessCheck {
                has_access: false,
                reason: AccessReason::TrialExpired,
                suspicious,
            };
        }

        AccessCheck {
            has_access: true,
            reason: AccessReason::Valid,
            suspicious,
        }
    }

    /// Mirror a payment submission into the local record.
    pub fn note_payment_submitted(&mut self, method: &str) {
        let now = self.clock.now_utc();
        self.start_trial();
        if let Some(record) = &mut self.state.trial {
            record.note_payment_submitted(method, now);
        }
        self.persist();
    }

    /// Mirror a verified payment into the local record.
    pub fn note_payment_verified(&mut self, plan: &str) {
        let now = self.clock.now_utc();
        self.start_trial();
        if let Some(record) = &mut self.state.trial {
            record.note_payment_verified(plan, now);
        }
        self.persist();
    }

    /// Mirror a rejected payment into the local record.
    pub fn note_payment_rejected(&mut self) {
        self.start_trial();
        if let Some(record) = &mut self.state.trial {
            record.note_payment_rejected();
        }
        self.persist();
    }

    /// Current payment status, for UI rendering.
    pub fn payment_status(&self) -> PaymentStatus {
        self.state
            .trial
            .as_ref()
            .map(|r| r.payment_status)
            .unwrap_or(PaymentStatus::Trial)
    }

    /// Explicit, logged trial reset. The only sanctioned way to destroy a
    /// trial record; the device identity and history survive it.
    pub fn reset_trial(&mut self) {
        warn!(device = %self.device_id(), "trial record reset by explicit request");
        self.state.trial = None;
        self.start_trial();
    }

    /// Whether local persistence is working, or the manager is running
    /// in degraded ephemeral mode.
    pub fn is_persistent(&self) -> bool {
        self.store.is_persistent()
    }

    fn persist(&mut self) {
        if let Err(e) = self.store.save(&self.state) {
            // Degraded mode: keep running on in-memory state only.
            warn!(error = %e, "client state not persisted");
        }
    }
}
