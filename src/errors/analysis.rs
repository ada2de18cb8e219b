//! Vision analysis error types

use std::time::Duration;

use thiserror::Error;

/// Errors raised while asking the vision API to describe an image
#[derive(Error, Debug)]
pub enum AnalysisError {
    /// No API key configured, analysis is switched off
    #[error("Vision analysis is not configured")]
    NotConfigured,

    /// The provider answered 429
    #[error("Vision provider rate limit exceeded")]
    RateLimited,

    /// The provider answered with a non-success status
    #[error("Vision provider error {status}: {body}")]
    Provider { status: u16, body: String },

    /// The request never completed
    #[error("Vision provider request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The call exceeded the configured deadline
    #[error("Vision analysis timed out after {0:?}")]
    Timeout(Duration),

    /// The provider answered but the body could not be understood
    #[error("Invalid vision response: {0}")]
    InvalidResponse(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_display() {
        let err = AnalysisError::Timeout(Duration::from_secs(30));
        assert_eq!(err.to_string(), "Vision analysis timed out after 30s");
    }

    #[test]
    fn test_display_includes_status() {
        let err = AnalysisError::Provider {
            status: 401,
            body: "invalid key".to_string(),
        };
        assert_eq!(err.to_string(), "Vision provider error 401: invalid key");
    }
}
