use axum::{extract::State, http::StatusCode, response::Json};
use chrono::Utc;
use serde_json::{json, Value};
use tracing::warn;

use crate::server::app::AppState;

#[utoipa::path(
    get,
    path = "/",
    responses((status = 200, description = "Service banner"))
)]
pub async fn root() -> Json<Value> {
    Json(json!({
        "message": "AI Image Gallery API",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service and database are up"),
        (status = 503, description = "Database unreachable")
    )
)]
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let (status, database) = match state.db.ping().await {
        Ok(()) => (StatusCode::OK, "connected"),
        Err(err) => {
            warn!("Health check could not reach the database: {}", err);
            (StatusCode::SERVICE_UNAVAILABLE, "unreachable")
        }
    };

    let body = json!({
        "status": if status.is_success() { "healthy" } else { "degraded" },
        "service": "aigallery-server",
        "version": env!("CARGO_PKG_VERSION"),
        "database": database,
        "timestamp": Utc::now().to_rfc3339(),
    });

    (status, Json(body))
}
