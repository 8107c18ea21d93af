//! Payment claims and the manual verification pipeline.

pub mod pipeline;
pub mod submission;
