//! Vision analysis: asking an external model to describe an image.

pub mod openai;
pub mod parse;

use async_trait::async_trait;

use crate::errors::{AnalysisError, AnalysisResult};

pub use openai::OpenAiVisionClient;

/// What the model said about an image
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VisionAnalysis {
    pub description: String,
    pub tags: Vec<String>,
}

#[async_trait]
pub trait VisionAnalyzer: Send + Sync {
    async fn analyze(&self, image: &[u8], mime_type: &str) -> AnalysisResult<VisionAnalysis>;
}

/// Used when no API key is configured; every call fails with `NotConfigured`
#[derive(Clone, Copy, Debug, Default)]
pub struct DisabledAnalyzer;

#[async_trait]
impl VisionAnalyzer for DisabledAnalyzer {
    async fn analyze(&self, _image: &[u8], _mime_type: &str) -> AnalysisResult<VisionAnalysis> {
        Err(AnalysisError::NotConfigured)
    }
}

/// Best guess at an image's MIME type from its leading bytes
pub fn sniff_mime_type(bytes: &[u8]) -> &'static str {
    match image::guess_format(bytes) {
        Ok(format) => format.to_mime_type(),
        Err(_) => "image/jpeg",
    }
}
