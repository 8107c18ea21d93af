//! Server-of-record entitlement state.

pub mod state;
pub mod store;
