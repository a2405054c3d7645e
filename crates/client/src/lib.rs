//! HTTP client for the NAS file service.
//!
//! Thin async wrapper over `reqwest` for the upload, delete and zip-job
//! endpoints. Orchestration (queues, polling, cancellation scopes) lives in
//! `nasferry-sessions`; this crate only performs single requests.

pub mod client;

pub use client::{Client, Error};
