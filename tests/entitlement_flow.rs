//! Entitlement state-machine scenarios exercised through the public API,
//! without the HTTP layer.

use std::sync::Arc;

use chrono::Duration;
use tempfile::TempDir;
use trialgate::entitlement::store::SubscriptionStore;
use trialgate::payment::pipeline::OperatorDecision;
use trialgate::payment::submission::{PaymentMethod, PaymentSubmission};
use trialgate::trial::store::ClientStore;
use trialgate::{
    authorize, Access, Clock, DenyReason, DeviceSignals, EntitlementState, MockClock,
    SharedMockClock, TrialManager, TrialgateConfig, TrialgateError,
};

fn signals() -> DeviceSignals {
    DeviceSignals {
        user_agent: "Mozilla/5.0 (X11; Linux x86_64)".to_string(),
        locale: "en-US".to_string(),
        screen: "1920x1080".to_string(),
        timezone_offset: -300,
        canvas_hash: "c4nv4s".to_string(),
    }
}

fn submission(clock: &SharedMockClock, reference: &str) -> PaymentSubmission {
    PaymentSubmission::new(PaymentMethod::Easypaisa, reference, "pro", 6, clock).unwrap()
}

#[test]
fn trial_lifecycle_expire_submit_reject_resubmit_approve() {
    let store = SubscriptionStore::new(5);
    let clock = SharedMockClock::from_rfc3339("2025-03-01T00:00:00Z");

    // Day 0: first contact opens the trial.
    let (state, ..) = store.resolve("acct-1", &clock);
    assert_eq!(state, EntitlementState::TrialActive { days_remaining: 5 });

    // Day 6: expired, the gate refuses.
    clock.advance(Duration::days(6));
    let (state, suspicious, _) = store.resolve("acct-1", &clock);
    assert_eq!(state, EntitlementState::TrialExpired);
    assert_eq!(
        authorize(&state, suspicious, false),
        Access::Deny(DenyReason::TrialExpired)
    );

    // A claim goes pending; pending shadows the expired trial.
    store
        .begin_submission("acct-1", submission(&clock, "TXN-REJ001"), &clock)
        .unwrap();
    let (state, ..) = store.resolve("acct-1", &clock);
    assert_eq!(state, EntitlementState::PaymentSubmitted);

    // Operator rejects; the subject may try again.
    let outcome = store
        .resolve_submission("acct-1", &OperatorDecision::reject("reference not found"), clock.now_utc())
        .unwrap();
    assert!(!outcome.approved);
    let (state, ..) = store.resolve("acct-1", &clock);
    assert_eq!(state, EntitlementState::Rejected);

    store
        .begin_submission("acct-1", submission(&clock, "TXN-OK0002"), &clock)
        .unwrap();
    store
        .resolve_submission("acct-1", &OperatorDecision::approve(), clock.now_utc())
        .unwrap();

    // Verified grants access regardless of how far the window has lapsed.
    clock.advance(Duration::days(365));
    let (state, suspicious, tier) = store.resolve("acct-1", &clock);
    assert_eq!(
        state,
        EntitlementState::Verified {
            plan: "pro".to_string()
        }
    );
    assert_eq!(tier, "pro");
    assert_eq!(authorize(&state, suspicious, false), Access::Allow);
}

#[test]
fn pending_claim_shadows_an_active_trial() {
    let store = SubscriptionStore::new(5);
    let clock = SharedMockClock::from_rfc3339("2025-03-01T00:00:00Z");

    let (state, ..) = store.resolve("acct-1", &clock);
    assert_eq!(state, EntitlementState::TrialActive { days_remaining: 5 });

    store
        .begin_submission("acct-1", submission(&clock, "TXN-EARLY1"), &clock)
        .unwrap();
    let (state, ..) = store.resolve("acct-1", &clock);
    assert_eq!(state, EntitlementState::PaymentSubmitted);
}

#[test]
fn verified_subject_cannot_submit_again() {
    let store = SubscriptionStore::new(5);
    let clock = SharedMockClock::from_rfc3339("2025-03-01T00:00:00Z");

    store
        .begin_submission("acct-1", submission(&clock, "TXN-PAID01"), &clock)
        .unwrap();
    store
        .resolve_submission("acct-1", &OperatorDecision::approve(), clock.now_utc())
        .unwrap();

    let (state, ..) = store.resolve("acct-1", &clock);
    assert_eq!(
        state,
        EntitlementState::Verified {
            plan: "pro".to_string()
        }
    );

    // Verified is terminal for the billing period; a new claim must not
    // demote the subject back to pending.
    let second = store.begin_submission("acct-1", submission(&clock, "TXN-PAID02"), &clock);
    assert!(matches!(second, Err(TrialgateError::AlreadyVerified)));

    let (state, _, tier) = store.resolve("acct-1", &clock);
    assert_eq!(
        state,
        EntitlementState::Verified {
            plan: "pro".to_string()
        }
    );
    assert_eq!(tier, "pro");
}

#[test]
fn deciding_twice_fails_the_second_time() {
    let store = SubscriptionStore::new(5);
    let clock = SharedMockClock::from_rfc3339("2025-03-01T00:00:00Z");

    store
        .begin_submission("acct-1", submission(&clock, "TXN-ONCE01"), &clock)
        .unwrap();
    store
        .resolve_submission("acct-1", &OperatorDecision::approve(), clock.now_utc())
        .unwrap();

    let second = store.resolve_submission("acct-1", &OperatorDecision::approve(), clock.now_utc());
    assert!(matches!(second, Err(TrialgateError::NoPendingSubmission)));
}

#[test]
fn client_trial_window_is_anchored_at_first_launch() {
    let dir = TempDir::new().unwrap();
    let clock = SharedMockClock::from_rfc3339("2025-03-01T00:00:00Z");
    let store = ClientStore::with_dir(dir.path().to_path_buf(), 10).unwrap();
    let mut manager = TrialManager::with_parts(
        TrialgateConfig::default(),
        &signals(),
        store,
        Arc::new(clock.clone()),
    )
    .unwrap();

    let record = manager.start_trial();
    assert_eq!(record.end_date - record.start_date, Duration::days(5));

    // Day 3 of 5: partially used.
    clock.advance(Duration::days(3));
    let status = manager.status();
    assert!(status.is_active);
    assert_eq!(status.days_remaining, 2);
    assert_eq!(status.percentage_used, 60);

    // Restarting the host does not move the anchor.
    let store = ClientStore::with_dir(dir.path().to_path_buf(), 10).unwrap();
    let mut reopened = TrialManager::with_parts(
        TrialgateConfig::default(),
        &signals(),
        store,
        Arc::new(clock.clone()),
    )
    .unwrap();
    assert_eq!(reopened.start_trial().end_date, record.end_date);

    // Past the window: access gone, and the flip persists.
    clock.advance(Duration::days(3));
    assert!(!reopened.status().is_active);
    let check = reopened.validate_access();
    assert!(!check.has_access);
}

#[test]
fn device_churn_flags_but_does_not_block_by_default() {
    let clock = MockClock::from_rfc3339("2025-03-01T00:00:00Z");
    let mut manager = TrialManager::with_parts(
        TrialgateConfig::default(),
        &signals(),
        ClientStore::ephemeral(10),
        Arc::new(clock),
    )
    .unwrap();
    manager.start_trial();

    // Up to the threshold, prior sightings inside the window are tolerated.
    for _ in 0..4 {
        assert!(!manager.validate_access().suspicious);
    }
    // The next sighting sees four priors and crosses it; access continues
    // under the default policy.
    let check = manager.validate_access();
    assert!(check.suspicious);
    assert!(check.has_access);
}

#[test]
fn churn_outside_the_window_is_not_suspicious() {
    let clock = SharedMockClock::from_rfc3339("2025-03-01T00:00:00Z");
    let mut manager = TrialManager::with_parts(
        TrialgateConfig::default(),
        &signals(),
        ClientStore::ephemeral(10),
        Arc::new(clock.clone()),
    )
    .unwrap();
    manager.start_trial();

    // Sightings spread a day apart never accumulate inside the 24h window.
    for _ in 0..8 {
        assert!(!manager.validate_access().suspicious);
        clock.advance(Duration::hours(25));
    }
}
