use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, warn};

use super::{AuthenticatedUser, TokenVerifier};
use crate::errors::{AuthError, AuthResult};

const VERIFY_TIMEOUT: Duration = Duration::from_secs(10);

/// Verifies tokens against `GET {url}/auth/v1/user`
#[derive(Clone, Debug)]
pub struct SupabaseTokenVerifier {
    http: reqwest::Client,
    user_endpoint: String,
    anon_key: String,
}

#[derive(Deserialize)]
struct UserPayload {
    id: String,
    email: Option<String>,
}

impl SupabaseTokenVerifier {
    pub fn new(project_url: &str, anon_key: impl Into<String>) -> AuthResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(VERIFY_TIMEOUT)
            .build()
            .map_err(|e| AuthError::ProviderUnavailable(e.to_string()))?;

        Ok(Self {
            http,
            user_endpoint: format!("{}/auth/v1/user", project_url.trim_end_matches('/')),
            anon_key: anon_key.into(),
        })
    }
}

#[async_trait]
impl TokenVerifier for SupabaseTokenVerifier {
    async fn verify(&self, token: &str) -> AuthResult<AuthenticatedUser> {
        let response = self
            .http
            .get(&self.user_endpoint)
            .header("apikey", &self.anon_key)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| {
                warn!("Auth provider request failed: {}", e);
                AuthError::ProviderUnavailable(e.to_string())
            })?;

        match response.status() {
            StatusCode::OK => {
                let user: UserPayload = response
                    .json()
                    .await
                    .map_err(|e| AuthError::ProviderUnavailable(e.to_string()))?;
                debug!("Authenticated user {}", user.id);
                Ok(AuthenticatedUser {
                    id: user.id,
                    email: user.email,
                })
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(AuthError::InvalidToken),
            status => {
                warn!("Auth provider answered {}", status);
                Err(AuthError::ProviderUnavailable(format!(
                    "unexpected status {}",
                    status
                )))
            }
        }
    }
}
