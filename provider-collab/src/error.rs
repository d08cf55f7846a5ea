use thiserror::Error;

#[derive(Error, Debug)]
pub enum CollabError {
    #[error("Authentication error: {0}")]
    Auth(#[from] core_auth::AuthError),

    #[error(transparent)]
    Bridge(#[from] bridge_traits::error::BridgeError),
}

pub type Result<T> = std::result::Result<T, CollabError>;

impl From<CollabError> for bridge_traits::error::BridgeError {
    fn from(error: CollabError) -> Self {
        use bridge_traits::error::BridgeError;

        match error {
            CollabError::Bridge(inner) => inner,
            CollabError::Auth(auth) => BridgeError::OperationFailed(auth.to_string()),
        }
    }
}
