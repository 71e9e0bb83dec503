use axum::{
    extract::State,
    middleware as axum_middleware,
    routing::get,
    Json, Router,
};

use crate::endpoints::ApiQuery;
use crate::error::Result;
use crate::middleware::{require_identity, Authorized, SiteAdminOnly};
use crate::services::audit::{get_audit_logs, AuditLogQuery, AuditLogResponse};
use crate::state::AppState;

/// Create audit routes
pub fn audit_routes(state: AppState) -> Router {
    Router::new()
        .route("/", get(list_audit_logs))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            require_identity,
        ))
        .with_state(state)
}

/// List audit logs with filtering and pagination
#[utoipa::path(
    get,
    path = "/api/audit",
    tag = "Audit",
    params(AuditLogQuery),
    responses(
        (status = 200, body = AuditLogResponse),
        (status = 401, body = crate::error::ErrorResponse),
        (status = 403, body = crate::error::ErrorResponse)
    )
)]
pub async fn list_audit_logs(
    State(state): State<AppState>,
    _auth: Authorized<SiteAdminOnly>,
    ApiQuery(query): ApiQuery<AuditLogQuery>,
) -> Result<Json<AuditLogResponse>> {
    let logs = get_audit_logs(&state.db, query).await?;
    Ok(Json(logs))
}
