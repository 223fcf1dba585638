//! # nexus-service
//!
//! HTTP API, CLI entry point, and process wiring for the Nexus EBICS
//! middleware: the `AppState` root every route handler and the scheduler
//! share, the Basic-auth/superuser gate, the three-layer error taxonomy,
//! and the ingestion/submission/key-management business logic that turns
//! the lower `nexus-*` crates into the surface spec.md §6 describes.

#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

pub mod auth;
pub mod clock;
pub mod config;
pub mod ebics_runtime;
pub mod error;
pub mod ingestion;
pub mod keymanagement;
pub mod notify;
pub mod routes;
pub mod scheduler_handler;
pub mod state;
pub mod submission;
