use axum::{middleware as axum_middleware, routing::get, Json, Router};

use crate::error::{AppError, Result};
use crate::middleware::{require_identity, Identity};
use crate::schemas::UserResponse;
use crate::state::AppState;

/// Create users routes
pub fn users_routes(state: AppState) -> Router {
    Router::new()
        .route("/me", get(get_current_user))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            require_identity,
        ))
        .with_state(state)
}

/// Application user of the signed-in identity
#[utoipa::path(
    get,
    path = "/api/users/me",
    tag = "Users",
    responses(
        (status = 200, body = UserResponse),
        (status = 401, body = crate::error::ErrorResponse),
        (status = 404, description = "Identity has no application user yet", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_current_user(identity: Identity) -> Result<Json<UserResponse>> {
    let user = identity
        .user()
        .cloned()
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    Ok(Json(user.into()))
}
