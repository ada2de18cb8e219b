use axum::{extract::State, response::Json};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::errors::GalleryResult;
use crate::server::app::AppState;
use crate::server::extract::{ApiJson, CurrentUser};
use crate::services::{validation, ImageResponse, Pagination, SearchResponse, SimilarImage};

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SearchRequest {
    pub query: String,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SimilarImageRequest {
    pub image_id: i32,
    /// Default 10, at most 50
    pub limit: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ColorFilterRequest {
    /// `#rrggbb` or `rrggbb`
    pub color: Option<String>,
    #[serde(default)]
    pub colors: Vec<String>,
    /// Default 20, at most 100
    pub limit: Option<u64>,
}

#[utoipa::path(
    post,
    path = "/api/search",
    request_body = SearchRequest,
    responses(
        (
            status = 200,
            description = "Matches ordered by rank, then upload time",
            body = SearchResponse
        ),
        (status = 400, description = "Empty or oversized query")
    ),
    security(("bearer" = []))
)]
pub async fn search_images(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiJson(request): ApiJson<SearchRequest>,
) -> GalleryResult<Json<SearchResponse>> {
    let page = Pagination::new(request.page, request.limit)?;
    let response = state.search.search(user.id(), &request.query, page).await?;
    Ok(Json(response))
}

#[utoipa::path(
    post,
    path = "/api/similar",
    request_body = SimilarImageRequest,
    responses(
        (status = 200, description = "Images sharing tags or colors", body = [SimilarImage]),
        (status = 404, description = "Reference image not found")
    ),
    security(("bearer" = []))
)]
pub async fn find_similar_images(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiJson(request): ApiJson<SimilarImageRequest>,
) -> GalleryResult<Json<Vec<SimilarImage>>> {
    let similar = state
        .search
        .similar(user.id(), request.image_id, request.limit)
        .await?;
    Ok(Json(similar))
}

#[utoipa::path(
    post,
    path = "/api/filter-by-color",
    request_body = ColorFilterRequest,
    responses(
        (
            status = 200,
            description = "Images whose palette has any requested color",
            body = [ImageResponse]
        ),
        (status = 400, description = "Missing or malformed color")
    ),
    security(("bearer" = []))
)]
pub async fn filter_by_color(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiJson(request): ApiJson<ColorFilterRequest>,
) -> GalleryResult<Json<Vec<ImageResponse>>> {
    let colors = validation::color_filter(request.color.as_deref(), &request.colors)?;
    let images = state
        .search
        .filter_by_color(user.id(), &colors, request.limit)
        .await?;
    Ok(Json(images))
}
