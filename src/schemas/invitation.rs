use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::invitation::{self, InvitationStatus, InvitationUserData};
use crate::models::user::UserRole;
use crate::schemas::UserResponse;

#[derive(Debug, Clone, Deserialize, Validate, utoipa::ToSchema)]
pub struct CreateInvitationRequest {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[validate(length(min = 2, message = "First name must be at least 2 characters"))]
    pub first_name: String,
    #[validate(length(min = 2, message = "Last name must be at least 2 characters"))]
    pub last_name: String,
    pub role: UserRole,
    pub company_id: Option<i64>,
    pub phone: Option<String>,
    pub job_title: Option<String>,
    pub department: Option<String>,
    pub location: Option<String>,
    #[schema(value_type = Option<String>, format = Date)]
    pub date_of_birth: Option<NaiveDate>,
}

impl CreateInvitationRequest {
    /// Snapshot of the prospect's profile, with blank optionals dropped
    pub fn user_data(&self) -> InvitationUserData {
        fn clean(v: &Option<String>) -> Option<String> {
            v.as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        }

        InvitationUserData {
            first_name: self.first_name.trim().to_string(),
            last_name: self.last_name.trim().to_string(),
            phone: clean(&self.phone),
            job_title: clean(&self.job_title),
            department: clean(&self.department),
            location: clean(&self.location),
            date_of_birth: self.date_of_birth,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, utoipa::IntoParams)]
pub struct InvitationListQuery {
    /// Filter on effective status (`pending`, `accepted`, `cancelled`, `expired`)
    pub status: Option<String>,
    pub company_id: Option<i64>,
}

#[derive(Debug, Clone, Deserialize, utoipa::IntoParams)]
pub struct ValidateInvitationQuery {
    pub token: String,
}

#[derive(Debug, Clone, Deserialize, Validate, utoipa::ToSchema)]
pub struct AcceptInvitationRequest {
    #[validate(length(min = 1, message = "Token is required"))]
    pub token: String,
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct InvitationResponse {
    pub id: i64,
    pub email: String,
    pub role: UserRole,
    pub company_id: Option<i64>,
    pub company_name: Option<String>,
    pub invited_by: i64,
    /// Effective status: a lapsed pending invitation reports `expired`
    pub status: InvitationStatus,
    pub user_data: InvitationUserData,
    pub expires_at: DateTime<Utc>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl InvitationResponse {
    pub fn from_model(
        invitation: invitation::Model,
        company_name: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        let status = invitation.effective_status(now);
        // A malformed snapshot should not hide the invitation from administrators
        let user_data = invitation.parsed_user_data().unwrap_or_default();

        Self {
            id: invitation.id,
            email: invitation.email,
            role: invitation.role,
            company_id: invitation.company_id,
            company_name,
            invited_by: invitation.invited_by,
            status,
            user_data,
            expires_at: invitation.expires_at,
            accepted_at: invitation.accepted_at,
            created_at: invitation.created_at,
        }
    }
}

/// Public view of a valid invitation, shown on the acceptance page
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct ValidateInvitationResponse {
    pub email: String,
    pub role: UserRole,
    pub company_name: Option<String>,
    pub user_data: InvitationUserData,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct AcceptInvitationResponse {
    pub message: String,
    pub user: UserResponse,
}
