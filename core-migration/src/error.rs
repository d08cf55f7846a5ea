use bridge_traits::error::BridgeError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MigrationError {
    #[error("Destination error: {0}")]
    Destination(#[source] BridgeError),

    #[error("Source error: {0}")]
    Source(#[source] BridgeError),

    #[error("Staging error: {0}")]
    Staging(String),

    #[error("Local I/O error at {path}: {source}")]
    LocalIo {
        path: PathBuf,
        #[source]
        source: BridgeError,
    },

    #[error("Not a composed recording file name: {0}")]
    InvalidFileName(String),

    #[error("Invalid state transition from {from} to {to}: {reason}")]
    InvalidStateTransition {
        from: String,
        to: String,
        reason: String,
    },

    #[error("Folder mapping store error: {0}")]
    MappingStore(String),

    #[error("Run aborted: {0}")]
    Fatal(String),
}

pub type Result<T> = std::result::Result<T, MigrationError>;

/// Whether a remote failure may be recorded against one file and skipped.
///
/// A definite rejection (non-retryable status) or a local I/O problem stays
/// local to the file. Anything else (no response, retry ceiling reached,
/// credentials broken) aborts the run.
pub fn is_recoverable(error: &BridgeError) -> bool {
    error.is_remote_rejection() || matches!(error, BridgeError::Io(_))
}

impl MigrationError {
    pub fn destination(error: BridgeError) -> Self {
        MigrationError::Destination(error)
    }

    /// A remote rejection or local I/O fault; see [`is_recoverable`].
    pub fn is_recoverable(&self) -> bool {
        match self {
            MigrationError::Destination(e) | MigrationError::Source(e) => is_recoverable(e),
            MigrationError::LocalIo { .. } => true,
            _ => false,
        }
    }
}
