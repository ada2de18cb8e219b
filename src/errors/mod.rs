//! Domain-specific error types for the gallery backend
//!
//! # Error Categories
//!
//! - **GalleryError**: top-level error returned by services and HTTP handlers
//! - **AuthError**: bearer token verification against the auth platform
//! - **AnalysisError**: vision API calls (never surfaced to upload callers)
//! - **StorageError**: original/thumbnail file handling
//!
//! `GalleryError` implements axum's `IntoResponse`, so handlers can return
//! `GalleryResult<T>` directly and get a JSON error body:
//!
//! ```json
//! { "error": "NOT_FOUND", "message": "image 42 not found" }
//! ```

pub mod analysis;
pub mod auth;
pub mod gallery;
pub mod storage;

pub use analysis::AnalysisError;
pub use auth::AuthError;
pub use gallery::GalleryError;
pub use storage::StorageError;

/// Result type alias for gallery services and handlers
pub type GalleryResult<T> = Result<T, GalleryError>;

/// Result type alias for token verification
pub type AuthResult<T> = Result<T, AuthError>;

/// Result type alias for vision analysis
pub type AnalysisResult<T> = Result<T, AnalysisError>;

/// Result type alias for file storage
pub type StorageResult<T> = Result<T, StorageError>;
