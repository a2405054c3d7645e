//! Session error types.

/// Errors produced by upload sessions and archive jobs.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("server error: {0}")]
    Client(#[from] nasferry_client::Error),

    #[error("transfer error: {0}")]
    Transfer(#[from] nasferry_transfer::TransferError),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("an archive job is already active")]
    JobAlreadyActive,

    #[error("cancelled")]
    Cancelled,
}
