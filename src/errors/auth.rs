//! Authentication error types
//!
//! Tokens are issued and verified by the external auth platform; these errors
//! describe what went wrong while asking it who the caller is.

use thiserror::Error;

/// Bearer token verification errors
#[derive(Error, Debug)]
pub enum AuthError {
    /// No `Authorization: Bearer` header on the request
    #[error("Missing bearer token")]
    MissingCredentials,

    /// The auth platform rejected the token
    #[error("Invalid or expired token")]
    InvalidToken,

    /// The auth platform could not be reached or answered unexpectedly
    #[error("Authentication provider unavailable: {0}")]
    ProviderUnavailable(String),
}

impl AuthError {
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::MissingCredentials | AuthError::InvalidToken => "UNAUTHORIZED",
            AuthError::ProviderUnavailable(_) => "AUTH_UNAVAILABLE",
        }
    }

    /// Whether the failure is the caller's fault rather than the provider's
    pub fn is_client_error(&self) -> bool {
        !matches!(self, AuthError::ProviderUnavailable(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(AuthError::MissingCredentials.error_code(), "UNAUTHORIZED");
        assert_eq!(AuthError::InvalidToken.error_code(), "UNAUTHORIZED");
        assert_eq!(
            AuthError::ProviderUnavailable("timeout".to_string()).error_code(),
            "AUTH_UNAVAILABLE"
        );
    }

    #[test]
    fn test_client_errors() {
        assert!(AuthError::InvalidToken.is_client_error());
        assert!(!AuthError::ProviderUnavailable("down".to_string()).is_client_error());
    }
}
