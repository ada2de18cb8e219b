//! Caller identity.
//!
//! Tokens are issued by the external auth platform; the gallery only asks it
//! who a token belongs to.

pub mod supabase;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::{AuthError, AuthResult};

pub use supabase::SupabaseTokenVerifier;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticatedUser {
    pub id: String,
    pub email: Option<String>,
}

#[async_trait]
pub trait TokenVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> AuthResult<AuthenticatedUser>;
}

/// Token from an `Authorization: Bearer <token>` header value
pub fn bearer_token(header: Option<&str>) -> AuthResult<&str> {
    let value = header.ok_or(AuthError::MissingCredentials)?;
    let (scheme, token) = value
        .trim()
        .split_once(' ')
        .ok_or(AuthError::MissingCredentials)?;

    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AuthError::MissingCredentials);
    }

    let token = token.trim();
    if token.is_empty() {
        return Err(AuthError::MissingCredentials);
    }
    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(bearer_token(Some("Bearer abc.def")).unwrap(), "abc.def");
        assert_eq!(bearer_token(Some("bearer  xyz ")).unwrap(), "xyz");

        for header in [None, Some(""), Some("Bearer"), Some("Bearer   "), Some("Basic dXNlcg==")] {
            assert!(matches!(
                bearer_token(header),
                Err(AuthError::MissingCredentials)
            ));
        }
    }
}
