//! Device identity and history.

pub mod fingerprint;
pub mod history;
