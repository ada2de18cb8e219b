use std::sync::Arc;

use anyhow::{anyhow, Result};
use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method},
    routing::{delete, get, post},
    Router,
};
use sea_orm::DatabaseConnection;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use super::handlers::{account, health, images, search};
use super::openapi;
use crate::auth::TokenVerifier;
use crate::config::GallerySettings;
use crate::services::{AnalysisService, ImageService, SearchService, UserService};
use crate::storage::{ImageStore, PUBLIC_PREFIX};
use crate::vision::VisionAnalyzer;

/// Room for multipart framing on top of the per-file limit
const BODY_LIMIT_SLACK: usize = 1024 * 1024;

/// Upper bound on files per upload request
const MAX_FILES_PER_REQUEST: usize = 20;

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub auth: Arc<dyn TokenVerifier>,
    pub users: UserService,
    pub images: ImageService,
    pub search: SearchService,
    pub store: ImageStore,
    pub max_upload_bytes: usize,
}

impl AppState {
    pub fn new(
        db: DatabaseConnection,
        auth: Arc<dyn TokenVerifier>,
        analyzer: Arc<dyn VisionAnalyzer>,
        settings: &GallerySettings,
    ) -> Self {
        let store = ImageStore::new(settings.upload_dir.clone());
        let analysis = AnalysisService::new(
            db.clone(),
            store.clone(),
            analyzer,
            settings.vision_timeout,
            settings.analysis_mode,
        );

        Self {
            users: UserService::new(db.clone(), store.clone()),
            images: ImageService::new(
                db.clone(),
                store.clone(),
                analysis,
                settings.max_upload_bytes,
            ),
            search: SearchService::new(db.clone()),
            db,
            auth,
            store,
            max_upload_bytes: settings.max_upload_bytes,
        }
    }
}

pub async fn create_app(state: AppState, allowed_origins: &[String]) -> Result<Router> {
    let cors = cors_layer(allowed_origins)?;
    let body_limit = state
        .max_upload_bytes
        .saturating_mul(MAX_FILES_PER_REQUEST)
        .saturating_add(BODY_LIMIT_SLACK);
    let uploads = ServeDir::new(state.store.root());

    let app = Router::new()
        .route("/", get(health::root))
        .route("/health", get(health::health_check))
        .nest("/api", api_routes())
        .nest_service(PUBLIC_PREFIX, uploads)
        .merge(openapi::routes())
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state);

    Ok(app)
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/upload", post(images::upload_images))
        .route("/images", get(images::list_images))
        .route(
            "/images/:id",
            get(images::get_image).delete(images::delete_image),
        )
        .route("/images/:id/reanalyze", post(images::reanalyze_image))
        .route("/search", post(search::search_images))
        .route("/similar", post(search::find_similar_images))
        .route("/filter-by-color", post(search::filter_by_color))
        .route("/account", delete(account::delete_account))
}

fn cors_layer(allowed_origins: &[String]) -> Result<CorsLayer> {
    let methods = [
        Method::GET,
        Method::POST,
        Method::DELETE,
        Method::OPTIONS,
    ];

    if allowed_origins.iter().any(|origin| origin.trim() == "*") {
        return Ok(CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(methods)
            .allow_headers(Any));
    }

    let origins = allowed_origins
        .iter()
        .map(|origin| origin.trim())
        .filter(|origin| !origin.is_empty())
        .map(|origin| {
            origin
                .parse::<HeaderValue>()
                .map_err(|e| anyhow!("Invalid CORS origin {}: {}", origin, e))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(methods)
        .allow_headers(Any))
}
