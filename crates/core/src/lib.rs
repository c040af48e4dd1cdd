//! `smartstore-core` -- domain model of the Smart Storage structured-data
//! import.
//!
//! Pure and synchronous: file validation, analysis types, the decision
//! model with its variance gate, job statuses, and the [`workflow`] state
//! machine that ties them together. Network access lives in
//! `smartstore-client`.

pub mod analysis;
pub mod decisions;
pub mod error;
pub mod file_selection;
pub mod job;
pub mod types;
pub mod upload_config;
pub mod workflow;
