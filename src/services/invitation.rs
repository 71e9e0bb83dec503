//! Invitation lifecycle.
//!
//! Every status change is a conditional `UPDATE ... WHERE status = 'pending'`
//! and the affected-row count decides who won. Expiry is checked against
//! `expires_at` wherever an invitation is used, so a lapsed record behaves as
//! expired even before the sweep writes the status.

use chrono::{DateTime, Utc};
use sea_orm::{
    sea_query::{Condition, Expr},
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder,
    Set, SqlErr, TransactionTrait,
};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

use crate::config::invitations::InvitationConfig;
use crate::db::DbConn;
use crate::error::AppError;
use crate::models::audit_log::{AuditAction, ResourceType};
use crate::models::invitation::{self, InvitationStatus, InvitationUserData};
use crate::models::prelude::*;
use crate::models::user::{self, UserRole};
use crate::models::company;
use crate::services::audit::{AuditEvent, AuditService};
use crate::services::identity::{IdentityMetadata, IdentityProvider};
use crate::services::notification::{InvitationEmail, InvitationMailer};
use crate::services::token::{generate_invitation_token, is_well_formed_token};

#[derive(Debug, Error)]
pub enum InvitationError {
    #[error("{0}")]
    Validation(String),

    #[error("Company not found")]
    CompanyNotFound,

    #[error("A company is required for this role")]
    CompanyRequired,

    #[error("A user with this email already exists")]
    UserExists,

    #[error("A pending invitation already exists for this email")]
    PendingExists,

    #[error("Invitation not found")]
    NotFound,

    #[error("Invalid or expired invitation")]
    InvalidInvitation,

    #[error("Invitation has expired")]
    Expired,

    #[error("This invitation was sent to a different email address")]
    EmailMismatch,

    #[error("You already have an account")]
    AlreadyRegistered,

    #[error("Only pending invitations can be {0}")]
    NotPending(&'static str),

    #[error("{0}")]
    Forbidden(String),

    #[error("Failed to send invitation email: {0}")]
    EmailDelivery(String),

    #[error("Stored invitation data is invalid: {0}")]
    CorruptUserData(#[from] serde_json::Error),

    #[error(transparent)]
    Database(#[from] DbErr),
}

impl From<InvitationError> for AppError {
    fn from(err: InvitationError) -> Self {
        match err {
            InvitationError::CompanyNotFound | InvitationError::NotFound => {
                AppError::NotFound(err.to_string())
            }
            InvitationError::Forbidden(msg) => AppError::Forbidden(msg),
            InvitationError::EmailDelivery(_) | InvitationError::CorruptUserData(_) => {
                AppError::Internal(err.to_string())
            }
            InvitationError::Database(e) => AppError::Database(e),
            InvitationError::Validation(_)
            | InvitationError::CompanyRequired
            | InvitationError::UserExists
            | InvitationError::PendingExists
            | InvitationError::InvalidInvitation
            | InvitationError::Expired
            | InvitationError::EmailMismatch
            | InvitationError::AlreadyRegistered
            | InvitationError::NotPending(_) => AppError::BadRequest(err.to_string()),
        }
    }
}

pub type InvitationResult<T> = std::result::Result<T, InvitationError>;

/// Request to invite a prospective user
#[derive(Debug, Clone)]
pub struct NewInvitation {
    pub email: String,
    pub role: UserRole,
    pub company_id: Option<i64>,
    pub user_data: InvitationUserData,
}

/// A valid invitation together with its company's display name
#[derive(Debug, Clone)]
pub struct InvitationDetails {
    pub invitation: invitation::Model,
    pub company_name: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct InvitationFilter {
    pub status: Option<InvitationStatus>,
    pub company_id: Option<i64>,
}

/// Lower-cased, trimmed form every email is stored and compared in
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub(crate) fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

#[derive(Clone)]
pub struct InvitationService {
    db: DbConn,
    audit: AuditService,
    mailer: Arc<dyn InvitationMailer>,
    identity: Arc<dyn IdentityProvider>,
    config: InvitationConfig,
}

impl InvitationService {
    pub fn new(
        db: DbConn,
        audit: AuditService,
        mailer: Arc<dyn InvitationMailer>,
        identity: Arc<dyn IdentityProvider>,
        config: InvitationConfig,
    ) -> Self {
        Self {
            db,
            audit,
            mailer,
            identity,
            config,
        }
    }

    pub fn db(&self) -> &DbConn {
        &self.db
    }

    pub fn audit(&self) -> &AuditService {
        &self.audit
    }

    // ========================================================================
    // Administration
    // ========================================================================

    /// Issue an invitation and email the prospect.
    ///
    /// A delivery failure cancels the fresh invitation so the prospect's
    /// pending slot is freed and the unsent token can never be accepted.
    pub async fn create(
        &self,
        inviter: &user::Model,
        new: NewInvitation,
    ) -> InvitationResult<InvitationDetails> {
        let now = Utc::now();
        let email = normalize_email(&new.email);
        let mut user_data = new.user_data;
        user_data.first_name = user_data.first_name.trim().to_string();
        user_data.last_name = user_data.last_name.trim().to_string();

        if user_data.first_name.chars().count() < 2 {
            return Err(InvitationError::Validation(
                "First name must be at least 2 characters".to_string(),
            ));
        }
        if user_data.last_name.chars().count() < 2 {
            return Err(InvitationError::Validation(
                "Last name must be at least 2 characters".to_string(),
            ));
        }

        let company_id = resolve_company_for_inviter(inviter, new.role, new.company_id)?;

        let company_name = match company_id {
            Some(id) => Some(
                Company::find_by_id(id)
                    .one(&self.db)
                    .await?
                    .ok_or(InvitationError::CompanyNotFound)?
                    .name,
            ),
            None => None,
        };

        let existing_user = User::find()
            .filter(user::Column::Email.eq(email.as_str()))
            .one(&self.db)
            .await?;
        if existing_user.is_some() {
            return Err(InvitationError::UserExists);
        }

        // Lapsed pending invitations must not occupy the one pending slot
        expire_lapsed_for_email(&self.db, &email, now).await?;

        let pending = Invitation::find()
            .filter(invitation::Column::Email.eq(email.as_str()))
            .filter(invitation::Column::Status.eq(InvitationStatus::Pending))
            .one(&self.db)
            .await?;
        if pending.is_some() {
            return Err(InvitationError::PendingExists);
        }

        let record = invitation::ActiveModel {
            email: Set(email.clone()),
            role: Set(new.role),
            company_id: Set(company_id),
            invited_by: Set(inviter.id),
            token: Set(generate_invitation_token()),
            user_data: Set(serde_json::to_string(&user_data)?),
            status: Set(InvitationStatus::Pending),
            expires_at: Set(now + self.config.expiry()),
            accepted_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };

        let created = match record.insert(&self.db).await {
            Ok(created) => created,
            // Lost a race against a concurrent invite for the same email
            Err(e) if is_unique_violation(&e) => return Err(InvitationError::PendingExists),
            Err(e) => return Err(e.into()),
        };

        let message = InvitationEmail {
            to: created.email.clone(),
            recipient_name: user_data.full_name(),
            role_label: created.role.label().to_string(),
            company_name: company_name.clone(),
            inviter_name: inviter.full_name(),
            accept_url: InvitationEmail::accept_url(&self.config.base_url, &created.token),
            expires_in_days: self.config.expiry().num_days(),
        };

        let sent = self.mailer.send_invitation(&message).await;
        if !sent.success {
            let reason = sent
                .error
                .unwrap_or_else(|| "Unknown delivery error".to_string());
            tracing::error!(
                invitation_id = created.id,
                email = %created.email,
                error = %reason,
                "Invitation email failed, cancelling invitation"
            );

            transition(&self.db, created.id, InvitationStatus::Cancelled, Utc::now()).await?;
            self.audit
                .log_failure(
                    AuditEvent::new(AuditAction::InvitationEmailFailed, ResourceType::Invitation)
                        .resource(created.id)
                        .user(inviter.id)
                        .actor(inviter.email.clone())
                        .details(serde_json::json!({ "email": created.email })),
                    &reason,
                )
                .await;

            return Err(InvitationError::EmailDelivery(reason));
        }

        tracing::info!(
            invitation_id = created.id,
            email = %created.email,
            role = %created.role,
            "Invitation created"
        );
        self.audit
            .log_success(
                AuditEvent::new(AuditAction::InvitationCreated, ResourceType::Invitation)
                    .resource(created.id)
                    .user(inviter.id)
                    .actor(inviter.email.clone())
                    .details(serde_json::json!({
                        "email": created.email,
                        "role": created.role,
                        "company_id": created.company_id,
                    })),
            )
            .await;

        Ok(InvitationDetails {
            invitation: created,
            company_name,
        })
    }

    /// Re-send the email for a pending invitation with its existing token
    pub async fn resend(
        &self,
        actor: &user::Model,
        invitation_id: i64,
    ) -> InvitationResult<InvitationDetails> {
        let now = Utc::now();
        let invitation = self.find_managed(actor, invitation_id).await?;

        match invitation.effective_status(now) {
            InvitationStatus::Pending => {}
            InvitationStatus::Expired => {
                transition(&self.db, invitation.id, InvitationStatus::Expired, now).await?;
                return Err(InvitationError::Expired);
            }
            _ => return Err(InvitationError::NotPending("resent")),
        }

        let user_data = invitation.parsed_user_data()?;
        let company_name = self.company_name(invitation.company_id).await?;
        let inviter_name = User::find_by_id(invitation.invited_by)
            .one(&self.db)
            .await?
            .map(|u| u.full_name())
            .unwrap_or_else(|| actor.full_name());

        let message = InvitationEmail {
            to: invitation.email.clone(),
            recipient_name: user_data.full_name(),
            role_label: invitation.role.label().to_string(),
            company_name: company_name.clone(),
            inviter_name,
            accept_url: InvitationEmail::accept_url(&self.config.base_url, &invitation.token),
            expires_in_days: (invitation.expires_at - now).num_days().max(1),
        };

        let sent = self.mailer.send_invitation(&message).await;
        if !sent.success {
            let reason = sent
                .error
                .unwrap_or_else(|| "Unknown delivery error".to_string());
            self.audit
                .log_failure(
                    AuditEvent::new(AuditAction::InvitationEmailFailed, ResourceType::Invitation)
                        .resource(invitation.id)
                        .user(actor.id)
                        .actor(actor.email.clone()),
                    &reason,
                )
                .await;
            return Err(InvitationError::EmailDelivery(reason));
        }

        tracing::info!(
            invitation_id = invitation.id,
            email = %invitation.email,
            "Invitation resent"
        );
        self.audit
            .log_success(
                AuditEvent::new(AuditAction::InvitationResent, ResourceType::Invitation)
                    .resource(invitation.id)
                    .user(actor.id)
                    .actor(actor.email.clone()),
            )
            .await;

        Ok(InvitationDetails {
            invitation,
            company_name,
        })
    }

    /// Move a pending invitation to `cancelled`
    pub async fn cancel(
        &self,
        actor: &user::Model,
        invitation_id: i64,
    ) -> InvitationResult<InvitationDetails> {
        let now = Utc::now();
        let invitation = self.find_managed(actor, invitation_id).await?;

        if invitation.effective_status(now) != InvitationStatus::Pending
            || !transition(&self.db, invitation.id, InvitationStatus::Cancelled, now).await?
        {
            return Err(InvitationError::NotPending("cancelled"));
        }

        tracing::info!(
            invitation_id = invitation.id,
            email = %invitation.email,
            "Invitation cancelled"
        );
        self.audit
            .log_success(
                AuditEvent::new(AuditAction::InvitationCancelled, ResourceType::Invitation)
                    .resource(invitation.id)
                    .user(actor.id)
                    .actor(actor.email.clone()),
            )
            .await;

        let cancelled = Invitation::find_by_id(invitation.id)
            .one(&self.db)
            .await?
            .ok_or(InvitationError::NotFound)?;
        let company_name = self.company_name(cancelled.company_id).await?;

        Ok(InvitationDetails {
            invitation: cancelled,
            company_name,
        })
    }

    /// Invitations visible to the actor, newest first
    pub async fn list(
        &self,
        actor: &user::Model,
        filter: InvitationFilter,
    ) -> InvitationResult<Vec<InvitationDetails>> {
        let now = Utc::now();
        let mut select = Invitation::find().order_by_desc(invitation::Column::CreatedAt);

        let company_scope = match actor.role {
            UserRole::SiteAdmin => filter.company_id,
            UserRole::CompanyAdmin => {
                let own = actor.company_id.ok_or_else(|| {
                    InvitationError::Forbidden("Company administrator has no company".to_string())
                })?;
                if filter.company_id.is_some_and(|c| c != own) {
                    return Err(InvitationError::Forbidden(
                        "Cannot view invitations of another company".to_string(),
                    ));
                }
                Some(own)
            }
            UserRole::Trainee => {
                return Err(InvitationError::Forbidden(
                    "Administrator access required".to_string(),
                ))
            }
        };

        if let Some(company_id) = company_scope {
            select = select.filter(invitation::Column::CompanyId.eq(company_id));
        }

        if let Some(status) = filter.status {
            select = select.filter(effective_status_condition(status, now));
        }

        let invitations = select.all(&self.db).await?;
        let names = self.company_names().await?;

        Ok(invitations
            .into_iter()
            .map(|invitation| InvitationDetails {
                company_name: invitation
                    .company_id
                    .and_then(|id| names.get(&id).cloned()),
                invitation,
            })
            .collect())
    }

    // ========================================================================
    // Prospect-facing operations
    // ========================================================================

    /// Resolve a token to a pending, unexpired invitation
    pub async fn validate(&self, token: &str) -> InvitationResult<InvitationDetails> {
        let invitation = self.find_usable_by_token(token, Utc::now()).await?;
        let company_name = self.company_name(invitation.company_id).await?;
        Ok(InvitationDetails {
            invitation,
            company_name,
        })
    }

    /// Accept an invitation as an authenticated identity.
    ///
    /// The claim and the User insert commit together; identity metadata is
    /// pushed afterwards and a failure there is only reported.
    pub async fn accept(
        &self,
        subject: &str,
        identity_email: &str,
        token: &str,
    ) -> InvitationResult<user::Model> {
        let now = Utc::now();
        let invitation = self.find_usable_by_token(token, now).await?;

        let identity_email = normalize_email(identity_email);
        if identity_email != normalize_email(&invitation.email) {
            tracing::warn!(
                invitation_id = invitation.id,
                identity_email = %identity_email,
                "Invitation accepted by a different email address"
            );
            return Err(InvitationError::EmailMismatch);
        }

        let existing = User::find()
            .filter(
                Condition::any()
                    .add(user::Column::UserId.eq(subject))
                    .add(user::Column::Email.eq(identity_email.as_str())),
            )
            .one(&self.db)
            .await?;
        if existing.is_some() {
            return Err(InvitationError::AlreadyRegistered);
        }

        let user = match claim_and_materialize(&self.db, &invitation, subject, &identity_email, now)
            .await
        {
            Ok(user) => user,
            Err(InvitationError::Database(e)) if is_unique_violation(&e) => {
                return Err(InvitationError::AlreadyRegistered)
            }
            Err(e) => return Err(e),
        };

        tracing::info!(
            invitation_id = invitation.id,
            user_id = user.id,
            role = %user.role,
            "Invitation accepted"
        );
        self.audit
            .log_success(
                AuditEvent::new(AuditAction::InvitationAccepted, ResourceType::Invitation)
                    .resource(invitation.id)
                    .user(user.id)
                    .actor(user.email.clone())
                    .details(serde_json::json!({ "via": "direct" })),
            )
            .await;

        self.sync_identity_metadata(&user).await;
        Ok(user)
    }

    /// Mirror a User's role and company into the identity provider
    pub async fn sync_identity_metadata(&self, user: &user::Model) {
        let metadata = IdentityMetadata {
            role: user.role,
            company_id: user.company_id,
            invitation_id: user.invitation_id,
        };

        if let Err(e) = self
            .identity
            .update_public_metadata(&user.user_id, &metadata)
            .await
        {
            tracing::warn!(
                user_id = user.id,
                subject = %user.user_id,
                error = %e,
                "Failed to push identity metadata"
            );
            self.audit
                .log_failure(
                    AuditEvent::new(AuditAction::IdentityMetadataSyncFailed, ResourceType::User)
                        .resource(user.id)
                        .user(user.id)
                        .actor(user.email.clone()),
                    &e.to_string(),
                )
                .await;
        }
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    /// Token lookup shared by validation and acceptance.
    ///
    /// Unknown and non-pending tokens are indistinguishable to the caller.
    async fn find_usable_by_token(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> InvitationResult<invitation::Model> {
        let token = token.trim();
        if !is_well_formed_token(token) {
            return Err(InvitationError::InvalidInvitation);
        }

        let invitation = Invitation::find()
            .filter(invitation::Column::Token.eq(token))
            .one(&self.db)
            .await?
            .ok_or(InvitationError::InvalidInvitation)?;

        if invitation.status != InvitationStatus::Pending {
            return Err(InvitationError::InvalidInvitation);
        }

        if invitation.is_expired(now) {
            if transition(&self.db, invitation.id, InvitationStatus::Expired, now).await? {
                self.audit
                    .log_success(
                        AuditEvent::new(AuditAction::InvitationExpired, ResourceType::Invitation)
                            .resource(invitation.id),
                    )
                    .await;
            }
            return Err(InvitationError::Expired);
        }

        Ok(invitation)
    }

    /// Load an invitation the actor is allowed to administer
    async fn find_managed(
        &self,
        actor: &user::Model,
        invitation_id: i64,
    ) -> InvitationResult<invitation::Model> {
        let invitation = Invitation::find_by_id(invitation_id)
            .one(&self.db)
            .await?
            .ok_or(InvitationError::NotFound)?;

        match actor.role {
            UserRole::SiteAdmin => Ok(invitation),
            UserRole::CompanyAdmin
                if actor.company_id.is_some() && actor.company_id == invitation.company_id =>
            {
                Ok(invitation)
            }
            // Other tenants' invitations do not exist as far as the actor can tell
            UserRole::CompanyAdmin => Err(InvitationError::NotFound),
            UserRole::Trainee => Err(InvitationError::Forbidden(
                "Administrator access required".to_string(),
            )),
        }
    }

    async fn company_name(&self, company_id: Option<i64>) -> InvitationResult<Option<String>> {
        let Some(id) = company_id else {
            return Ok(None);
        };
        Ok(Company::find_by_id(id).one(&self.db).await?.map(|c| c.name))
    }

    async fn company_names(&self) -> InvitationResult<HashMap<i64, String>> {
        Ok(Company::find()
            .all(&self.db)
            .await?
            .into_iter()
            .map(|c: company::Model| (c.id, c.name))
            .collect())
    }
}

/// Tenancy rules for issuing invitations; returns the company to store
fn resolve_company_for_inviter(
    inviter: &user::Model,
    role: UserRole,
    requested: Option<i64>,
) -> InvitationResult<Option<i64>> {
    match inviter.role {
        UserRole::SiteAdmin => {
            if !role.requires_company() {
                // Site administrators are never scoped to a company
                return Ok(None);
            }
            requested.map(Some).ok_or(InvitationError::CompanyRequired)
        }
        UserRole::CompanyAdmin => {
            if role != UserRole::Trainee {
                return Err(InvitationError::Forbidden(
                    "Company administrators can only invite trainees".to_string(),
                ));
            }
            let own = inviter.company_id.ok_or_else(|| {
                InvitationError::Forbidden("Company administrator has no company".to_string())
            })?;
            match requested {
                Some(id) if id != own => Err(InvitationError::Forbidden(
                    "Cannot invite users into another company".to_string(),
                )),
                _ => Ok(Some(own)),
            }
        }
        UserRole::Trainee => Err(InvitationError::Forbidden(
            "Administrator access required".to_string(),
        )),
    }
}

/// SQL condition matching invitations whose effective status is `status`
fn effective_status_condition(status: InvitationStatus, now: DateTime<Utc>) -> Condition {
    match status {
        InvitationStatus::Pending => Condition::all()
            .add(invitation::Column::Status.eq(InvitationStatus::Pending))
            .add(invitation::Column::ExpiresAt.gte(now)),
        InvitationStatus::Expired => Condition::any()
            .add(invitation::Column::Status.eq(InvitationStatus::Expired))
            .add(
                Condition::all()
                    .add(invitation::Column::Status.eq(InvitationStatus::Pending))
                    .add(invitation::Column::ExpiresAt.lt(now)),
            ),
        other => Condition::all().add(invitation::Column::Status.eq(other)),
    }
}

/// Conditionally move a pending invitation to `next`; true when this call won
pub(crate) async fn transition<C: ConnectionTrait>(
    db: &C,
    invitation_id: i64,
    next: InvitationStatus,
    now: DateTime<Utc>,
) -> Result<bool, DbErr> {
    debug_assert!(InvitationStatus::Pending.can_transition_to(next));

    let mut update = Invitation::update_many()
        .col_expr(invitation::Column::Status, Expr::value(next))
        .col_expr(invitation::Column::UpdatedAt, Expr::value(now))
        .filter(invitation::Column::Id.eq(invitation_id))
        .filter(invitation::Column::Status.eq(InvitationStatus::Pending));

    match next {
        InvitationStatus::Accepted => {
            update = update
                .col_expr(invitation::Column::AcceptedAt, Expr::value(Some(now)))
                .filter(invitation::Column::ExpiresAt.gte(now));
        }
        InvitationStatus::Expired => {
            update = update.filter(invitation::Column::ExpiresAt.lt(now));
        }
        _ => {}
    }

    Ok(update.exec(db).await?.rows_affected == 1)
}

/// Claim a pending invitation and insert its User in one transaction
pub(crate) async fn claim_and_materialize(
    db: &DbConn,
    invitation: &invitation::Model,
    subject: &str,
    email: &str,
    now: DateTime<Utc>,
) -> InvitationResult<user::Model> {
    let user_data = invitation.parsed_user_data()?;

    let txn = db.begin().await?;

    if !transition(&txn, invitation.id, InvitationStatus::Accepted, now).await? {
        txn.rollback().await?;
        return Err(InvitationError::InvalidInvitation);
    }

    let user = user::ActiveModel {
        user_id: Set(subject.to_string()),
        email: Set(normalize_email(email)),
        role: Set(invitation.role),
        company_id: Set(invitation.company_id),
        first_name: Set(user_data.first_name),
        last_name: Set(user_data.last_name),
        phone: Set(user_data.phone),
        job_title: Set(user_data.job_title),
        department: Set(user_data.department),
        location: Set(user_data.location),
        date_of_birth: Set(user_data.date_of_birth),
        invitation_id: Set(Some(invitation.id)),
        profile_completed: Set(false),
        is_active: Set(true),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    txn.commit().await?;
    Ok(user)
}

async fn expire_lapsed_for_email(
    db: &DbConn,
    email: &str,
    now: DateTime<Utc>,
) -> Result<u64, DbErr> {
    let result = Invitation::update_many()
        .col_expr(invitation::Column::Status, Expr::value(InvitationStatus::Expired))
        .col_expr(invitation::Column::UpdatedAt, Expr::value(now))
        .filter(invitation::Column::Email.eq(email))
        .filter(invitation::Column::Status.eq(InvitationStatus::Pending))
        .filter(invitation::Column::ExpiresAt.lt(now))
        .exec(db)
        .await?;
    Ok(result.rows_affected)
}

/// Write `expired` for every lapsed pending invitation
pub async fn expire_lapsed(db: &DbConn, now: DateTime<Utc>) -> Result<u64, DbErr> {
    let result = Invitation::update_many()
        .col_expr(invitation::Column::Status, Expr::value(InvitationStatus::Expired))
        .col_expr(invitation::Column::UpdatedAt, Expr::value(now))
        .filter(invitation::Column::Status.eq(InvitationStatus::Pending))
        .filter(invitation::Column::ExpiresAt.lt(now))
        .exec(db)
        .await?;
    Ok(result.rows_affected)
}
