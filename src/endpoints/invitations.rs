use axum::{
    extract::{Path, State},
    middleware as axum_middleware,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;

use crate::endpoints::{validate_request, ApiJson, ApiQuery};
use crate::error::{AppError, Result};
use crate::middleware::{require_identity, Authorized, CompanyAdminOrAbove, Identity};
use crate::models::invitation::InvitationStatus;
use crate::schemas::{
    AcceptInvitationRequest, AcceptInvitationResponse, CreateInvitationRequest,
    InvitationListQuery, InvitationResponse, ValidateInvitationQuery, ValidateInvitationResponse,
};
use crate::services::invitation::{InvitationError, InvitationFilter, NewInvitation};
use crate::state::AppState;

/// Create invitation routes
pub fn invitations_routes(state: AppState) -> Router {
    let protected = Router::new()
        .route("/", get(list_invitations).post(create_invitation))
        .route("/accept", post(accept_invitation))
        .route("/{invitation_id}/cancel", post(cancel_invitation))
        .route("/{invitation_id}/resend", post(resend_invitation))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            require_identity,
        ));

    // The acceptance page validates the token before the prospect signs in
    let public = Router::new().route("/validate", get(validate_invitation));

    protected.merge(public).with_state(state)
}

// ============================================================================
// Administrator Endpoints
// ============================================================================

/// Invite a prospective user
#[utoipa::path(
    post,
    path = "/api/invitations",
    tag = "Invitations",
    request_body = CreateInvitationRequest,
    responses(
        (status = 200, body = InvitationResponse),
        (status = 400, body = crate::error::ErrorResponse),
        (status = 403, body = crate::error::ErrorResponse),
        (status = 404, description = "Company not found", body = crate::error::ErrorResponse),
        (status = 500, description = "Invitation email could not be sent", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_invitation(
    State(state): State<AppState>,
    auth: Authorized<CompanyAdminOrAbove>,
    ApiJson(payload): ApiJson<CreateInvitationRequest>,
) -> Result<Json<InvitationResponse>> {
    validate_request(&payload)?;

    let new = NewInvitation {
        email: payload.email.clone(),
        role: payload.role,
        company_id: payload.company_id,
        user_data: payload.user_data(),
    };

    let created = state.invitations.create(auth.user(), new).await?;

    Ok(Json(InvitationResponse::from_model(
        created.invitation,
        created.company_name,
        Utc::now(),
    )))
}

/// List invitations visible to the caller
#[utoipa::path(
    get,
    path = "/api/invitations",
    tag = "Invitations",
    params(InvitationListQuery),
    responses(
        (status = 200, body = Vec<InvitationResponse>),
        (status = 403, body = crate::error::ErrorResponse)
    )
)]
pub async fn list_invitations(
    State(state): State<AppState>,
    auth: Authorized<CompanyAdminOrAbove>,
    ApiQuery(query): ApiQuery<InvitationListQuery>,
) -> Result<Json<Vec<InvitationResponse>>> {
    let status = match query.status.as_deref() {
        Some(s) => Some(
            InvitationStatus::parse(s)
                .ok_or_else(|| AppError::BadRequest(format!("Unknown status: {}", s)))?,
        ),
        None => None,
    };

    let now = Utc::now();
    let invitations = state
        .invitations
        .list(
            auth.user(),
            InvitationFilter {
                status,
                company_id: query.company_id,
            },
        )
        .await?
        .into_iter()
        .map(|d| InvitationResponse::from_model(d.invitation, d.company_name, now))
        .collect();

    Ok(Json(invitations))
}

/// Cancel a pending invitation
#[utoipa::path(
    post,
    path = "/api/invitations/{invitation_id}/cancel",
    tag = "Invitations",
    params(("invitation_id" = i64, Path, description = "Invitation id")),
    responses(
        (status = 200, body = InvitationResponse),
        (status = 400, description = "Invitation is not pending", body = crate::error::ErrorResponse),
        (status = 404, body = crate::error::ErrorResponse)
    )
)]
pub async fn cancel_invitation(
    State(state): State<AppState>,
    auth: Authorized<CompanyAdminOrAbove>,
    Path(invitation_id): Path<i64>,
) -> Result<Json<InvitationResponse>> {
    let cancelled = state.invitations.cancel(auth.user(), invitation_id).await?;
    Ok(Json(InvitationResponse::from_model(
        cancelled.invitation,
        cancelled.company_name,
        Utc::now(),
    )))
}

/// Re-send the invitation email with the existing token
#[utoipa::path(
    post,
    path = "/api/invitations/{invitation_id}/resend",
    tag = "Invitations",
    params(("invitation_id" = i64, Path, description = "Invitation id")),
    responses(
        (status = 200, body = InvitationResponse),
        (status = 400, body = crate::error::ErrorResponse),
        (status = 404, body = crate::error::ErrorResponse),
        (status = 500, body = crate::error::ErrorResponse)
    )
)]
pub async fn resend_invitation(
    State(state): State<AppState>,
    auth: Authorized<CompanyAdminOrAbove>,
    Path(invitation_id): Path<i64>,
) -> Result<Json<InvitationResponse>> {
    let resent = state.invitations.resend(auth.user(), invitation_id).await?;
    Ok(Json(InvitationResponse::from_model(
        resent.invitation,
        resent.company_name,
        Utc::now(),
    )))
}

// ============================================================================
// Prospect Endpoints
// ============================================================================

/// Look up an invitation by token
#[utoipa::path(
    get,
    path = "/api/invitations/validate",
    tag = "Invitations",
    params(ValidateInvitationQuery),
    responses(
        (status = 200, body = ValidateInvitationResponse),
        (status = 400, description = "Invitation has expired", body = crate::error::ErrorResponse),
        (status = 404, description = "Invalid or expired invitation", body = crate::error::ErrorResponse)
    )
)]
pub async fn validate_invitation(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ValidateInvitationQuery>,
) -> Result<Json<ValidateInvitationResponse>> {
    let details = state
        .invitations
        .validate(&query.token)
        .await
        .map_err(|e| match e {
            InvitationError::InvalidInvitation => AppError::NotFound(e.to_string()),
            e => e.into(),
        })?;

    let user_data = details
        .invitation
        .parsed_user_data()
        .map_err(|e| AppError::Internal(format!("Stored invitation data is invalid: {}", e)))?;

    Ok(Json(ValidateInvitationResponse {
        email: details.invitation.email,
        role: details.invitation.role,
        company_name: details.company_name,
        user_data,
        expires_at: details.invitation.expires_at,
    }))
}

/// Accept an invitation as the signed-in identity
#[utoipa::path(
    post,
    path = "/api/invitations/accept",
    tag = "Invitations",
    request_body = AcceptInvitationRequest,
    responses(
        (status = 200, body = AcceptInvitationResponse),
        (status = 400, body = crate::error::ErrorResponse),
        (status = 401, body = crate::error::ErrorResponse)
    )
)]
pub async fn accept_invitation(
    State(state): State<AppState>,
    identity: Identity,
    ApiJson(payload): ApiJson<AcceptInvitationRequest>,
) -> Result<Json<AcceptInvitationResponse>> {
    validate_request(&payload)?;

    if identity.user().is_some() {
        return Err(InvitationError::AlreadyRegistered.into());
    }

    let email = identity
        .email()
        .ok_or_else(|| AppError::BadRequest("Session carries no email address".to_string()))?;

    let user = state
        .invitations
        .accept(identity.subject(), email, &payload.token)
        .await?;

    Ok(Json(AcceptInvitationResponse {
        message: "Invitation accepted".to_string(),
        user: user.into(),
    }))
}
