pub mod audit;
pub mod invitations;
pub mod users;
pub mod webhooks;

use axum::{
    extract::{FromRequest, FromRequestParts},
    routing::get,
    Json, Router,
};
use utoipa::OpenApi;
use validator::Validate;

use crate::config::CONFIG;
use crate::error::{AppError, Result};
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    info(title = "Trainhub API"),
    paths(
        invitations::create_invitation,
        invitations::list_invitations,
        invitations::cancel_invitation,
        invitations::resend_invitation,
        invitations::validate_invitation,
        invitations::accept_invitation,
        users::get_current_user,
        audit::list_audit_logs,
        webhooks::identity_webhook,
    ),
    components(schemas(
        crate::error::ErrorResponse,
        crate::schemas::CreateInvitationRequest,
        crate::schemas::AcceptInvitationRequest,
        crate::schemas::InvitationResponse,
        crate::schemas::ValidateInvitationResponse,
        crate::schemas::AcceptInvitationResponse,
        crate::schemas::UserResponse,
        crate::schemas::WebhookAck,
        crate::services::audit::AuditLogResponse,
        crate::models::invitation::InvitationStatus,
        crate::models::invitation::InvitationUserData,
        crate::models::user::UserRole,
    )),
    tags(
        (name = "Invitations", description = "Invitation lifecycle"),
        (name = "Users", description = "Application users"),
        (name = "Webhooks", description = "Identity provider events"),
        (name = "Audit", description = "Audit trail")
    )
)]
pub struct ApiDoc;

/// Create the main API router
pub fn create_router(state: AppState) -> Router {
    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/api/health", get(health_check))
        .route("/api/system/version", get(get_version))
        .route("/api/openapi.json", get(openapi_spec));

    // Each nested router decides which of its routes need an identity
    let api_routes = Router::new()
        .nest(
            "/api/invitations",
            invitations::invitations_routes(state.clone()),
        )
        .nest("/api/users", users::users_routes(state.clone()))
        .nest("/api/audit", audit::audit_routes(state.clone()))
        .nest("/api/webhooks", webhooks::webhooks_routes(state));

    public_routes.merge(api_routes)
}

/// `Json` body extractor that rejects with a `{"detail": ...}` body
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

/// `Query` extractor that rejects with a `{"detail": ...}` body
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct ApiQuery<T>(pub T);

/// Run `validator` rules and report the first failure message
pub(crate) fn validate_request<T: Validate>(payload: &T) -> Result<()> {
    payload.validate().map_err(|errors| {
        let message = errors
            .field_errors()
            .values()
            .flat_map(|errs| errs.iter())
            .find_map(|e| e.message.as_ref().map(|m| m.to_string()))
            .unwrap_or_else(|| errors.to_string());
        AppError::BadRequest(message)
    })
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}

/// Version info endpoint
async fn get_version() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "version": CONFIG.version,
        "commit_hash": CONFIG.commit_hash,
        "build_time": CONFIG.build_time,
        "backend": "rust"
    }))
}

/// Generated OpenAPI document
async fn openapi_spec() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
