//! Authentication error types.

use thiserror::Error;

const DEFAULT_AUTHORIZATION_MESSAGE: &str = "Could not authenticate with the given credentials. \
     Please verify the provided credentials are up to date and correct \
     and that you have the correct user permissions";

/// Errors that can occur while acquiring or refreshing tokens.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The credentials were rejected by the authentication endpoint.
    #[error("Failed to authenticate: {0}.")]
    Authentication(String),

    /// The token was rejected and there is no refresh path left.
    #[error("Authorization failed: {0}.")]
    Authorization(String),

    /// The token endpoint returned a body that could not be understood.
    #[error("invalid token response: {0}")]
    InvalidTokenResponse(String),

    /// Token vault I/O failure.
    #[error("token storage error: {0}")]
    Storage(#[from] std::io::Error),
}

impl AuthError {
    /// Authorization failure with the standard credentials guidance.
    #[must_use]
    pub fn authorization_default() -> Self {
        Self::Authorization(DEFAULT_AUTHORIZATION_MESSAGE.to_owned())
    }
}

/// Result type for authentication operations.
pub type Result<T> = std::result::Result<T, AuthError>;
