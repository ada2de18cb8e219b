//! Response bodies shared by the services and the HTTP layer

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::database::entities::{image_metadata, images, AiProcessingStatus};

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ImageMetadataResponse {
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub colors: Vec<String>,
    pub ai_processing_status: AiProcessingStatus,
    pub ai_error: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl From<image_metadata::Model> for ImageMetadataResponse {
    fn from(metadata: image_metadata::Model) -> Self {
        Self {
            description: metadata.description,
            tags: metadata.tags.into_inner(),
            colors: metadata.colors.into_inner(),
            ai_processing_status: metadata.ai_processing_status,
            ai_error: metadata.ai_error,
            updated_at: metadata.updated_at,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ImageResponse {
    pub id: i32,
    pub filename: String,
    pub original_path: String,
    pub thumbnail_path: String,
    pub uploaded_at: DateTime<Utc>,
    pub user_id: String,
    pub metadata: Option<ImageMetadataResponse>,
}

impl ImageResponse {
    pub fn new(image: images::Model, metadata: Option<image_metadata::Model>) -> Self {
        Self {
            id: image.id,
            filename: image.filename,
            original_path: image.original_path,
            thumbnail_path: image.thumbnail_path,
            uploaded_at: image.uploaded_at,
            user_id: image.user_id,
            metadata: metadata.map(Into::into),
        }
    }
}

/// One row of a text search, ordered by `rank`
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct SearchHit {
    pub id: i32,
    pub filename: String,
    pub original_path: String,
    pub thumbnail_path: String,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub colors: Vec<String>,
    pub uploaded_at: DateTime<Utc>,
    pub rank: f32,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct SearchResponse {
    pub images: Vec<SearchHit>,
    pub total: u64,
    pub page: u64,
    pub limit: u64,
    pub has_more: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct SimilarImage {
    #[serde(flatten)]
    pub image: ImageResponse,
    /// Twice the shared tags plus the shared colors
    pub similarity_score: u32,
}
