//! `smartstore-client` -- talks to the Smart Storage backend.
//!
//! [`api::SmartStorageApi`] is the HTTP client. [`import::ImportSession`]
//! runs a structured-data import end to end against any
//! [`backend::ImportBackend`], with [`monitor`] polling the job until it
//! finishes.

pub mod api;
pub mod auth;
pub mod backend;
pub mod config;
pub mod error;
pub mod import;
pub mod monitor;
pub mod session;
