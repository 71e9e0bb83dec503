use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    routing::post,
    Json, Router,
};
use chrono::Utc;

use crate::error::{AppError, Result};
use crate::models::audit_log::{AuditAction, ResourceType};
use crate::schemas::{UserCreatedData, WebhookAck, WebhookEvent};
use crate::services::audit::AuditEvent;
use crate::services::reconciliation::{reconcile_user_created, ReconcileOutcome};
use crate::services::webhook::HEADER_ID;
use crate::state::AppState;

const USER_CREATED: &str = "user.created";

/// Create webhook routes
pub fn webhooks_routes(state: AppState) -> Router {
    Router::new()
        .route("/identity", post(identity_webhook))
        .with_state(state)
}

/// Identity provider event receiver (Svix-signed)
#[utoipa::path(
    post,
    path = "/api/webhooks/identity",
    tag = "Webhooks",
    request_body(content = String, description = "Raw identity provider event", content_type = "application/json"),
    responses(
        (status = 200, body = WebhookAck),
        (status = 400, description = "Signature verification failed or malformed event", body = crate::error::ErrorResponse),
        (status = 500, description = "Webhook secret not configured", body = crate::error::ErrorResponse)
    )
)]
pub async fn identity_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>> {
    let verifier = state.webhook.as_ref().ok_or_else(|| {
        AppError::Internal("Webhook secret is not configured".to_string())
    })?;

    // Must verify against the body bytes exactly as received
    if let Err(e) = verifier.verify(&headers, &body, Utc::now()) {
        let msg_id = headers
            .get(HEADER_ID)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("unknown")
            .to_string();
        tracing::warn!(msg_id = %msg_id, error = %e, "Rejected identity webhook");
        state
            .audit
            .log_failure(
                AuditEvent::new(AuditAction::WebhookRejected, ResourceType::Webhook)
                    .resource(msg_id),
                &e.to_string(),
            )
            .await;
        return Err(AppError::BadRequest(e.to_string()));
    }

    let event: WebhookEvent = serde_json::from_slice(&body)
        .map_err(|e| AppError::BadRequest(format!("Invalid webhook payload: {}", e)))?;

    if event.event_type != USER_CREATED {
        tracing::debug!(event_type = %event.event_type, "Ignoring identity webhook event");
        return Ok(Json(WebhookAck { success: true }));
    }

    let data: UserCreatedData = serde_json::from_value(event.data)
        .map_err(|e| AppError::BadRequest(format!("Invalid user.created payload: {}", e)))?;

    match reconcile_user_created(&state.invitations, &data).await? {
        ReconcileOutcome::AlreadyProvisioned(user) => {
            tracing::debug!(user_id = user.id, "Duplicate user.created delivery");
        }
        ReconcileOutcome::InvitationAccepted { invitation_id, .. } => {
            tracing::debug!(invitation_id, "user.created reconciled with invitation");
        }
        ReconcileOutcome::SelfSignup(user) => {
            tracing::debug!(user_id = user.id, "user.created provisioned as self-signup");
        }
        ReconcileOutcome::EmailInUse => {}
    }

    Ok(Json(WebhookAck { success: true }))
}
