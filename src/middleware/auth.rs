//! Authentication middleware for API routes
//!
//! Verifies the identity provider session token carried as a Bearer token or
//! in the `__session` cookie, and attaches the identity (plus its app User,
//! if one exists yet) to the request.

use axum::{
    extract::{Request, State},
    http::{
        header::{AUTHORIZATION, COOKIE},
        HeaderMap, StatusCode,
    },
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};

use crate::models::prelude::*;
use crate::models::user;
use crate::state::AppState;

/// Session cookie set by the identity provider's frontend SDK
pub const SESSION_COOKIE: &str = "__session";

/// Verified identity stored in request extensions
#[derive(Clone, Debug)]
pub struct AuthenticatedIdentity {
    /// Identity provider subject
    pub subject: String,
    pub email: Option<String>,
    /// Application user, absent until an invitation is accepted or the webhook provisions one
    pub user: Option<user::Model>,
}

/// Auth middleware that validates session tokens
///
/// Returns 401 Unauthorized if the token is missing or invalid.
pub async fn require_identity(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Response {
    let token = match extract_session_token(req.headers()) {
        Some(t) => t,
        None => {
            return unauthorized_response("Authentication required");
        }
    };

    let identity = match resolve_identity(&state, &token).await {
        Ok(identity) => identity,
        Err(msg) => {
            return unauthorized_response(&msg);
        }
    };

    req.extensions_mut().insert(identity);

    next.run(req).await
}

/// Extract the session token from the Authorization header or session cookie
pub fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    if let Some(token) = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
    {
        return Some(token.to_string());
    }

    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == SESSION_COOKIE && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

/// Verify the token and look up the app user by subject
async fn resolve_identity(state: &AppState, token: &str) -> Result<AuthenticatedIdentity, String> {
    let claims = state
        .session
        .verify(token)
        .map_err(|_| "Invalid or expired session".to_string())?;

    let found_user = User::find()
        .filter(user::Column::UserId.eq(claims.sub.as_str()))
        .one(&state.db)
        .await
        .map_err(|e| format!("Database error: {}", e))?;

    Ok(AuthenticatedIdentity {
        subject: claims.sub,
        email: claims.email,
        user: found_user,
    })
}

/// Create a 401 Unauthorized JSON response
fn unauthorized_response(message: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({
            "detail": message
        })),
    )
        .into_response()
}
