//! Trial window tracking and client-side persistence.

pub mod record;
pub mod store;
