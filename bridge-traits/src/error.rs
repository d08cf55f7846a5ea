use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Bridge capability not available: {0}")]
    NotAvailable(String),

    #[error("Bridge operation failed: {0}")]
    OperationFailed(String),

    #[error("Transport error for {url}: {message}")]
    Transport { url: String, message: String },

    /// The remote answered with a non-retryable status.
    #[error("Remote rejected request (status {status}): {message}")]
    RemoteRejected { status: u16, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// True when the failure happened before any HTTP status was received.
    pub fn is_transport(&self) -> bool {
        matches!(self, BridgeError::Transport { .. })
    }

    /// True for a permanent remote fault scoped to the request that caused it.
    pub fn is_remote_rejection(&self) -> bool {
        matches!(self, BridgeError::RemoteRejected { .. })
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
