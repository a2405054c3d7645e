//! Wire protocol types for the NAS file service HTTP API.
//!
//! The server speaks plain HTTP with query-string parameters and small JSON
//! bodies. This crate only describes the shapes; the client crate does I/O.

pub mod endpoints;
pub mod messages;
pub mod types;

pub use messages::{BulkZipRequest, JobCreated, ZipProgress};
pub use types::{JobId, ProgressReading};
