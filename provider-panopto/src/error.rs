//! Error types for the Panopto provider

use core_auth::AuthError;
use thiserror::Error;

/// Panopto provider errors
#[derive(Error, Debug)]
pub enum PanoptoError {
    /// Non-retryable status for this request
    #[error("Panopto API error (status {status_code}): {message}")]
    ApiError { status_code: u16, message: String },

    /// The attempt ceiling was hit while the remote kept failing transiently
    #[error("Giving up after {attempts} attempts, last status {last_status}")]
    RetriesExhausted { attempts: u32, last_status: u16 },

    /// The remote kept answering 401 right after fresh tokens were issued
    #[error("Still unauthorized after {refreshes} token refreshes")]
    AuthRefreshLimit { refreshes: u32 },

    /// Failed to parse API response
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Bridge(#[from] bridge_traits::error::BridgeError),
}

/// Result type for Panopto operations
pub type Result<T> = std::result::Result<T, PanoptoError>;

impl From<PanoptoError> for bridge_traits::error::BridgeError {
    fn from(error: PanoptoError) -> Self {
        use bridge_traits::error::BridgeError;

        match error {
            PanoptoError::ApiError {
                status_code,
                message,
            } => BridgeError::RemoteRejected {
                status: status_code,
                message,
            },
            PanoptoError::Bridge(inner) => inner,
            other => BridgeError::OperationFailed(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::error::BridgeError;

    #[test]
    fn test_api_error_becomes_remote_rejection() {
        let bridge: BridgeError = PanoptoError::ApiError {
            status_code: 403,
            message: "Forbidden".to_string(),
        }
        .into();
        assert!(bridge.is_remote_rejection());
    }

    #[test]
    fn test_exhausted_is_not_a_rejection() {
        let bridge: BridgeError = PanoptoError::RetriesExhausted {
            attempts: 20,
            last_status: 500,
        }
        .into();
        assert!(!bridge.is_remote_rejection());
        assert!(bridge.to_string().contains("20 attempts"));
    }

    #[test]
    fn test_transport_error_passes_through() {
        let bridge: BridgeError = PanoptoError::Bridge(BridgeError::Transport {
            url: "https://video.example.edu".to_string(),
            message: "Connection refused".to_string(),
        })
        .into();
        assert!(bridge.is_transport());
    }
}
