//! Core data models for the bucket mirror.
//!
//! These entities describe what the storage backend reports about a bucket
//! and what a finished run reports back to the operator.

pub mod object;
pub mod report;
