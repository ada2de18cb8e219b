use axum::{extract::State, http::StatusCode};

use crate::errors::GalleryResult;
use crate::server::app::AppState;
use crate::server::extract::CurrentUser;

#[utoipa::path(
    delete,
    path = "/api/account",
    responses(
        (status = 204, description = "Owner row, images, metadata and files removed"),
        (status = 401, description = "Missing or invalid token")
    ),
    security(("bearer" = []))
)]
pub async fn delete_account(
    State(state): State<AppState>,
    user: CurrentUser,
) -> GalleryResult<StatusCode> {
    state.users.delete_user(user.id()).await?;
    Ok(StatusCode::NO_CONTENT)
}
