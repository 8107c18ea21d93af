//! # Trialgate
//!
//! **Trial and entitlement gating for desktop application downloads.**
//!
//! Trialgate tracks a device-scoped trial window, detects trial-reset
//! abuse through device-identity churn, holds manually verified payment
//! claims, and gates artifact downloads on the server-resolved
//! entitlement — with every decision landing in an append-only audit
//! trail.
//!
//! ## Features
//!
//! - **Device-scoped trial clock** — a fixed window anchored at first
//!   launch, persisted locally and immune to client-asserted state
//! - **Abuse heuristic** — rapid device-identity churn inside a sliding
//!   window flags the subject for review (soft by default, hard-block
//!   by policy)
//! - **Manual payment verification** — submissions are held, never
//!   auto-approved; an operator decision moves them to verified or
//!   rejected
//! - **Server-side download gate** — entitlement is re-derived on every
//!   request; platform validation leaks nothing about entitlement
//! - **Append-only audit trail** — initiated, completed, and denied
//!   entries survive client aborts mid-transfer
//!
//! ## Quickstart
//!
//! ```no_run
//! use trialgate::{DeviceSignals, TrialgateConfig, TrialManager};
//!
//! fn main() -> Result<(), trialgate::TrialgateError> {
//!     let signals = DeviceSignals {
//!         user_agent: "myapp/1.0".to_string(),
//!         locale: "en-US".to_string(),
//!         screen: "2560x1440".to_string(),
//!         timezone_offset: -300,
//!         canvas_hash: "a1b2c3".to_string(),
//!     };
//!
//!     let mut manager = TrialManager::new(TrialgateConfig::default(), &signals)?;
//!     let check = manager.validate_access();
//!
//!     if check.has_access {
//!         println!("trial active ({:?})", check.reason);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Trust Model
//!
//! The client-side trial state is a convenience, not a security
//! boundary: a user with filesystem access can always wipe it. The
//! download gate therefore trusts only what the server re-derives at
//! request time; nothing a client asserts about its own trial is
//! consulted. The abuse heuristic narrows the reset loophole without
//! pretending to close it.
//!
//! ## Configuration
//!
//! - `trial_days` — length of the trial window (default 5)
//! - `suspicion_window_hours` / `suspicion_threshold` — churn heuristic
//! - `suspicious_hard_block` — whether a flagged subject is denied
//! - `downloads_dir` — where platform artifacts are served from
//!
//! See [`TrialgateConfig`] for full documentation.

#![deny(warnings)]
#![deny(missing_docs)]
#![doc(html_root_url = "https://docs.rs/trialgate/0.1.0")]

// Core modules
pub mod clock;
pub mod config;
pub mod errors;

// Device identity layer
pub mod device;

// Trial clock layer
pub mod trial;

// Abuse heuristic
pub mod abuse;

// Payment verification layer
pub mod payment;

// Entitlement resolution (server of record)
pub mod entitlement;

// Download gate
pub mod gate;

// Audit trail
pub mod audit;

// Client-side manager (main public API)
pub mod manager;

// HTTP boundary
pub mod server;

// Re-exports for public API
pub use audit::{AuditLog, DownloadStats};
pub use clock::{Clock, SystemClock};
pub use config::TrialgateConfig;
pub use device::fingerprint::DeviceSignals;
pub use entitlement::state::EntitlementState;
pub use errors::TrialgateError;
pub use gate::{authorize, Access, DenyReason, Platform};
pub use manager::{AccessCheck, AccessReason, TrialManager};
pub use trial::record::{PaymentStatus, TrialStatus};

#[cfg(any(test, feature = "test-seams"))]
pub use clock::{MockClock, SharedMockClock};
