use axum::Router;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use super::app::AppState;
use super::handlers::{account, health, images, search};
use crate::database::entities::AiProcessingStatus;
use crate::services::{
    ImageMetadataResponse, ImageResponse, SearchHit, SearchResponse, SimilarImage,
};

pub const OPENAPI_PATH: &str = "/api-docs/openapi.json";

#[derive(OpenApi)]
#[openapi(
    info(title = "AI Image Gallery API"),
    paths(
        health::root,
        health::health_check,
        images::upload_images,
        images::list_images,
        images::get_image,
        images::delete_image,
        images::reanalyze_image,
        search::search_images,
        search::find_similar_images,
        search::filter_by_color,
        account::delete_account,
    ),
    components(schemas(
        AiProcessingStatus,
        ImageMetadataResponse,
        ImageResponse,
        SearchHit,
        SearchResponse,
        SimilarImage,
        search::SearchRequest,
        search::SimilarImageRequest,
        search::ColorFilterRequest,
    )),
    modifiers(&BearerAuth)
)]
pub struct ApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).build()),
            );
        }
    }
}

/// The OpenAPI document, plus Swagger UI at `/docs` when built with `swagger`
#[cfg(feature = "swagger")]
pub fn routes() -> Router<AppState> {
    utoipa_swagger_ui::SwaggerUi::new("/docs")
        .url(OPENAPI_PATH, ApiDoc::openapi())
        .into()
}

#[cfg(not(feature = "swagger"))]
pub fn routes() -> Router<AppState> {
    Router::new().route(OPENAPI_PATH, axum::routing::get(openapi_json))
}

#[cfg(not(feature = "swagger"))]
async fn openapi_json() -> axum::Json<utoipa::openapi::OpenApi> {
    axum::Json(ApiDoc::openapi())
}
