//! JSON payloads exchanged with the server.

use serde::{Deserialize, Serialize};

use crate::types::{JobId, ProgressReading};

/// Response of `/download-zip` and `/bulk-download-zip`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobCreated {
    pub job_id: JobId,
}

/// Response of `/zip-progress`.
///
/// `progress` is a percentage; negative values mean the job failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZipProgress {
    pub progress: i32,
}

impl ZipProgress {
    /// Classifies the raw value.
    pub fn reading(&self) -> ProgressReading {
        ProgressReading::from_raw(self.progress)
    }
}

/// Body of `/bulk-download-zip`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkZipRequest {
    pub paths: Vec<String>,
}
