use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    response::Json,
};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::errors::{GalleryError, GalleryResult};
use crate::server::app::AppState;
use crate::server::extract::{ApiPath, ApiQuery, CurrentUser};
use crate::services::{ImageResponse, NewUpload, Pagination};

#[derive(Debug, Deserialize, IntoParams)]
pub struct ListImagesQuery {
    /// 1-based, default 1
    pub page: Option<u64>,
    /// Default 20, at most 100
    pub limit: Option<u64>,
}

#[utoipa::path(
    post,
    path = "/api/upload",
    request_body(content = String, content_type = "multipart/form-data", description = "One or more `files` parts"),
    responses(
        (status = 201, description = "Images stored, analysis scheduled", body = [ImageResponse]),
        (status = 400, description = "A part is not a valid image"),
        (status = 401, description = "Missing or invalid token")
    ),
    security(("bearer" = []))
)]
pub async fn upload_images(
    State(state): State<AppState>,
    user: CurrentUser,
    mut multipart: Multipart,
) -> GalleryResult<(StatusCode, Json<Vec<ImageResponse>>)> {
    let mut uploads = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| GalleryError::validation(format!("Malformed multipart body: {}", e)))?
    {
        if !matches!(field.name(), Some("files") | Some("file")) {
            continue;
        }

        let filename = field.file_name().unwrap_or("upload").to_string();
        let content_type = field.content_type().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| GalleryError::validation(format!("Could not read {}: {}", filename, e)))?;

        uploads.push(NewUpload {
            filename,
            content_type,
            bytes: bytes.to_vec(),
        });
    }

    let images = state.images.upload(user.id(), uploads).await?;
    Ok((StatusCode::CREATED, Json(images)))
}

#[utoipa::path(
    get,
    path = "/api/images",
    params(ListImagesQuery),
    responses(
        (status = 200, description = "The caller's images, newest first", body = [ImageResponse]),
        (status = 401, description = "Missing or invalid token")
    ),
    security(("bearer" = []))
)]
pub async fn list_images(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiQuery(query): ApiQuery<ListImagesQuery>,
) -> GalleryResult<Json<Vec<ImageResponse>>> {
    let page = Pagination::new(query.page, query.limit)?;
    let images = state.images.list(user.id(), page).await?;
    Ok(Json(images))
}

#[utoipa::path(
    get,
    path = "/api/images/{id}",
    params(("id" = i32, Path, description = "Image ID")),
    responses(
        (status = 200, description = "Image found", body = ImageResponse),
        (status = 404, description = "No such image for this user")
    ),
    security(("bearer" = []))
)]
pub async fn get_image(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<i32>,
) -> GalleryResult<Json<ImageResponse>> {
    Ok(Json(state.images.get(user.id(), id).await?))
}

#[utoipa::path(
    delete,
    path = "/api/images/{id}",
    params(("id" = i32, Path, description = "Image ID")),
    responses(
        (status = 204, description = "Image and files deleted"),
        (status = 404, description = "No such image for this user")
    ),
    security(("bearer" = []))
)]
pub async fn delete_image(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<i32>,
) -> GalleryResult<StatusCode> {
    state.images.delete(user.id(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/api/images/{id}/reanalyze",
    params(("id" = i32, Path, description = "Image ID")),
    responses(
        (status = 202, description = "Analysis scheduled again", body = ImageResponse),
        (status = 404, description = "No such image for this user")
    ),
    security(("bearer" = []))
)]
pub async fn reanalyze_image(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<i32>,
) -> GalleryResult<(StatusCode, Json<ImageResponse>)> {
    let image = state.images.reanalyze(user.id(), id).await?;
    Ok((StatusCode::ACCEPTED, Json(image)))
}
