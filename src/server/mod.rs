//! Boundary service: the download gate over HTTP.
//!
//! The router re-derives entitlement server-side on every request; nothing
//! a client asserts about its own trial is consulted. Subject identity
//! arrives as the `x-subject-id` header from the upstream identity layer,
//! which is an external collaborator here.

pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;

use crate::audit::AuditLog;
use crate::clock::{Clock, SystemClock};
use crate::config::TrialgateConfig;
use crate::entitlement::store::SubscriptionStore;

/// Shared state behind the router.
pub struct ServerState {
    /// Gating configuration.
    pub config: TrialgateConfig,
    /// Clock used for all entitlement resolution.
    pub clock: Arc<dyn Clock>,
    /// Server-of-record subscription store.
    pub subscriptions: SubscriptionStore,
    /// Append-only audit trail.
    pub audit: Arc<AuditLog>,
}

impl ServerState {
    /// Assemble state with the system clock and an in-memory audit log.
    pub fn new(config: TrialgateConfig) -> Self {
        let trial_days = config.trial_days;
        Self {
            config,
            clock: Arc::new(SystemClock),
            subscriptions: SubscriptionStore::new(trial_days),
            audit: Arc::new(AuditLog::in_memory()),
        }
    }

    /// Assemble state with the system clock and an explicit audit sink.
    pub fn with_audit(config: TrialgateConfig, audit: AuditLog) -> Self {
        Self::with_parts(config, Arc::new(SystemClock), audit)
    }

    /// Assemble state with explicit clock and audit sink.
    pub fn with_parts(config: TrialgateConfig, clock: Arc<dyn Clock>, audit: AuditLog) -> Self {
        let trial_days = config.trial_days;
        Self {
            config,
            clock,
            subscriptions: SubscriptionStore::new(trial_days),
            audit: Arc::new(audit),
        }
    }
}

/// Build the HTTP API router with the given state.
pub fn build_router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/downloads/info", get(routes::download_info))
        .route("/downloads/{platform}", get(routes::download))
        .route("/payments", post(routes::submit_payment))
        .route("/admin/verify/{subject}", post(routes::verify_payment))
        .route("/admin/stats", get(routes::stats))
        .with_state(state)
}
