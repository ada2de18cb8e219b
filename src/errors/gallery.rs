//! Top-level gallery error and its HTTP mapping

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use sea_orm::DbErr;
use serde_json::json;
use thiserror::Error;
use tracing::{debug, error};

use super::{AuthError, StorageError};

/// Errors surfaced by gallery services and HTTP handlers
#[derive(Error, Debug)]
pub enum GalleryError {
    /// Malformed input, rejected before any collaborator is called
    #[error("{0}")]
    Validation(String),

    /// Caller could not be authenticated
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Missing, or owned by someone else; the two are never distinguished
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    /// Database operation failed
    #[error("Database error: {0}")]
    Database(#[from] DbErr),

    /// Original or thumbnail could not be stored or read
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Anything else
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl GalleryError {
    pub fn validation(message: impl Into<String>) -> Self {
        GalleryError::Validation(message.into())
    }

    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        GalleryError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            GalleryError::Validation(_) => "VALIDATION_FAILED",
            GalleryError::Auth(err) => err.error_code(),
            GalleryError::NotFound { .. } => "NOT_FOUND",
            GalleryError::Database(err) if is_connection_error(err) => "DATABASE_UNAVAILABLE",
            GalleryError::Database(_) => "DATABASE_ERROR",
            GalleryError::Storage(_) => "STORAGE_ERROR",
            GalleryError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            GalleryError::Validation(_) => StatusCode::BAD_REQUEST,
            GalleryError::Auth(err) if err.is_client_error() => StatusCode::UNAUTHORIZED,
            GalleryError::Auth(_) => StatusCode::SERVICE_UNAVAILABLE,
            GalleryError::NotFound { .. } => StatusCode::NOT_FOUND,
            GalleryError::Database(err) if is_connection_error(err) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            GalleryError::Database(_)
            | GalleryError::Storage(_)
            | GalleryError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

fn is_connection_error(err: &DbErr) -> bool {
    matches!(err, DbErr::Conn { .. } | DbErr::ConnectionAcquire { .. })
}

impl IntoResponse for GalleryError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status.is_server_error() {
            error!("Request failed with {}: {}", status, self);
        } else {
            debug!("Request rejected with {}: {}", status, self);
        }

        let body = Json(json!({
            "error": self.error_code(),
            "message": self.to_string(),
        }));

        (status, body).into_response()
    }
}
