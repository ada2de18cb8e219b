use axum::extract::{FromRequest, FromRequestParts, Path, Query, Request};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::Json;
use serde::de::DeserializeOwned;

use super::app::AppState;
use crate::auth::{bearer_token, AuthenticatedUser};
use crate::errors::GalleryError;

/// The authenticated caller of an `/api` request.
///
/// Verifies the bearer token with the auth platform, then upserts the local
/// owner row so that anything the request creates can reference it.
#[derive(Clone, Debug)]
pub struct CurrentUser(pub AuthenticatedUser);

impl CurrentUser {
    pub fn id(&self) -> &str {
        &self.0.id
    }
}

#[axum::async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = GalleryError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok());
        let token = bearer_token(header)?;

        let user = state.auth.verify(token).await?;
        state.users.ensure_user(&user).await?;

        Ok(CurrentUser(user))
    }
}

/// `Json` body whose rejection is a `VALIDATION_FAILED` error
#[derive(Debug)]
pub struct ApiJson<T>(pub T);

#[axum::async_trait]
impl<T, S> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = GalleryError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| GalleryError::validation(rejection.body_text()))?;
        Ok(ApiJson(value))
    }
}

/// `Path` parameters whose rejection is a `VALIDATION_FAILED` error
#[derive(Debug)]
pub struct ApiPath<T>(pub T);

#[axum::async_trait]
impl<T, S> FromRequestParts<S> for ApiPath<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = GalleryError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(value) = Path::<T>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| GalleryError::validation(rejection.body_text()))?;
        Ok(ApiPath(value))
    }
}

/// Query string whose rejection is a `VALIDATION_FAILED` error
#[derive(Debug)]
pub struct ApiQuery<T>(pub T);

#[axum::async_trait]
impl<T, S> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = GalleryError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| GalleryError::validation(rejection.body_text()))?;
        Ok(ApiQuery(value))
    }
}
