use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque server-issued archive job identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for JobId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for JobId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Interpretation of a raw archive progress value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressReading {
    /// Negative sentinel: the job failed (or was cancelled server-side).
    Failed,
    /// Still building; value in `0..100`.
    Running(u8),
    /// 100 or more: the archive can be fetched.
    Ready,
}

impl ProgressReading {
    pub fn from_raw(progress: i32) -> Self {
        match progress {
            p if p < 0 => Self::Failed,
            p if p >= 100 => Self::Ready,
            p => Self::Running(p as u8),
        }
    }
}
