//! Reconciliation of identity provider `user.created` events.
//!
//! A new identity is matched to a pending invitation by email. A match is
//! claimed and materialized exactly like a direct acceptance; no match
//! provisions a self-signup trainee without a company. Redelivered events are
//! recognised by subject and leave everything untouched.

use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};

use crate::models::audit_log::{AuditAction, ResourceType};
use crate::models::invitation::{self, InvitationStatus};
use crate::models::prelude::*;
use crate::models::user::{self, UserRole};
use crate::schemas::UserCreatedData;
use crate::services::audit::AuditEvent;
use crate::services::invitation::{
    claim_and_materialize, is_unique_violation, normalize_email, InvitationError,
    InvitationResult, InvitationService,
};

#[derive(Debug, Clone, PartialEq)]
pub enum ReconcileOutcome {
    /// A User with this subject already exists (redelivery)
    AlreadyProvisioned(user::Model),
    /// The identity matched a pending invitation which is now accepted
    InvitationAccepted {
        user: user::Model,
        invitation_id: i64,
    },
    /// No invitation matched; a default trainee was provisioned
    SelfSignup(user::Model),
    /// Another User already owns this email under a different subject
    EmailInUse,
}

pub async fn reconcile_user_created(
    service: &InvitationService,
    data: &UserCreatedData,
) -> InvitationResult<ReconcileOutcome> {
    let db = service.db();
    let now = Utc::now();
    let subject = data.id.as_str();

    let email = data
        .primary_email()
        .map(normalize_email)
        .ok_or_else(|| InvitationError::Validation("No email address in event".to_string()))?;

    if let Some(existing) = User::find()
        .filter(user::Column::UserId.eq(subject))
        .one(db)
        .await?
    {
        tracing::info!(
            subject,
            user_id = existing.id,
            "Identity already provisioned, ignoring event"
        );
        return Ok(ReconcileOutcome::AlreadyProvisioned(existing));
    }

    let pending = Invitation::find()
        .filter(invitation::Column::Email.eq(email.as_str()))
        .filter(invitation::Column::Status.eq(InvitationStatus::Pending))
        .filter(invitation::Column::ExpiresAt.gte(now))
        .one(db)
        .await?;

    let outcome = match pending {
        Some(invitation) => match claim_and_materialize(db, &invitation, subject, &email, now).await
        {
            Ok(user) => {
                tracing::info!(
                    invitation_id = invitation.id,
                    user_id = user.id,
                    role = %user.role,
                    "Reconciled identity with invitation"
                );
                service
                    .audit()
                    .log_success(
                        AuditEvent::new(AuditAction::InvitationAccepted, ResourceType::Invitation)
                            .resource(invitation.id)
                            .user(user.id)
                            .actor(user.email.clone())
                            .details(serde_json::json!({ "via": "webhook" })),
                    )
                    .await;
                ReconcileOutcome::InvitationAccepted {
                    user,
                    invitation_id: invitation.id,
                }
            }
            // A concurrent delivery or direct acceptance won the claim
            Err(InvitationError::InvalidInvitation) => {
                return already_provisioned(service, subject, &email).await
            }
            Err(InvitationError::Database(e)) if is_unique_violation(&e) => {
                return already_provisioned(service, subject, &email).await
            }
            Err(e) => return Err(e),
        },
        None => match provision_default(service, data, subject, &email, now).await {
            Ok(user) => ReconcileOutcome::SelfSignup(user),
            Err(InvitationError::Database(e)) if is_unique_violation(&e) => {
                return already_provisioned(service, subject, &email).await
            }
            Err(e) => return Err(e),
        },
    };

    if let ReconcileOutcome::InvitationAccepted { user, .. } | ReconcileOutcome::SelfSignup(user) =
        &outcome
    {
        service.sync_identity_metadata(user).await;
    }

    Ok(outcome)
}

async fn provision_default(
    service: &InvitationService,
    data: &UserCreatedData,
    subject: &str,
    email: &str,
    now: chrono::DateTime<Utc>,
) -> InvitationResult<user::Model> {
    let user = user::ActiveModel {
        user_id: Set(subject.to_string()),
        email: Set(email.to_string()),
        role: Set(UserRole::Trainee),
        company_id: Set(None),
        first_name: Set(data.first_name.clone().unwrap_or_default().trim().to_string()),
        last_name: Set(data.last_name.clone().unwrap_or_default().trim().to_string()),
        invitation_id: Set(None),
        profile_completed: Set(false),
        is_active: Set(true),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(service.db())
    .await?;

    tracing::info!(user_id = user.id, subject, "Provisioned self-signup trainee");
    service
        .audit()
        .log_success(
            AuditEvent::new(AuditAction::UserProvisioned, ResourceType::User)
                .resource(user.id)
                .user(user.id)
                .actor(user.email.clone())
                .details(serde_json::json!({ "role": user.role, "source": "self_signup" })),
        )
        .await;

    Ok(user)
}

/// Resolve a lost race: whoever won must have created the User
async fn already_provisioned(
    service: &InvitationService,
    subject: &str,
    email: &str,
) -> InvitationResult<ReconcileOutcome> {
    if let Some(existing) = User::find()
        .filter(user::Column::UserId.eq(subject))
        .one(service.db())
        .await?
    {
        return Ok(ReconcileOutcome::AlreadyProvisioned(existing));
    }

    tracing::warn!(subject, email = %email, "Email already belongs to another user");
    Ok(ReconcileOutcome::EmailInUse)
}
