use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::user::UserRole;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "invitations")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub email: String,
    pub role: UserRole,
    pub company_id: Option<i64>,
    pub invited_by: i64,
    #[sea_orm(unique)]
    #[serde(skip_serializing)] // Bearer credential, never echoed back
    pub token: String,
    pub user_data: String, // JSON snapshot of InvitationUserData
    pub status: InvitationStatus,
    pub expires_at: DateTimeUtc,
    pub accepted_at: Option<DateTimeUtc>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

impl Model {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }

    /// Stored status, except that a lapsed `pending` record reads as `expired`
    pub fn effective_status(&self, now: DateTime<Utc>) -> InvitationStatus {
        if self.status == InvitationStatus::Pending && self.is_expired(now) {
            InvitationStatus::Expired
        } else {
            self.status
        }
    }

    pub fn parsed_user_data(&self) -> Result<InvitationUserData, serde_json::Error> {
        serde_json::from_str(&self.user_data)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::company::Entity",
        from = "Column::CompanyId",
        to = "super::company::Column::Id"
    )]
    Company,
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::InvitedBy",
        to = "super::user::Column::Id"
    )]
    Inviter,
}

impl Related<super::company::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Company.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Invitation lifecycle states. `Pending` is the only initial state.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    utoipa::ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "snake_case")]
pub enum InvitationStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "accepted")]
    Accepted,
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
    #[sea_orm(string_value = "expired")]
    Expired,
}

impl InvitationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvitationStatus::Pending => "pending",
            InvitationStatus::Accepted => "accepted",
            InvitationStatus::Cancelled => "cancelled",
            InvitationStatus::Expired => "expired",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(InvitationStatus::Pending),
            "accepted" => Some(InvitationStatus::Accepted),
            "cancelled" => Some(InvitationStatus::Cancelled),
            "expired" => Some(InvitationStatus::Expired),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, InvitationStatus::Pending)
    }

    /// Transitions are one-directional: only `pending` may move, and only to a terminal state
    pub fn can_transition_to(&self, next: InvitationStatus) -> bool {
        *self == InvitationStatus::Pending && next.is_terminal()
    }
}

impl std::fmt::Display for InvitationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Prospective-user attributes captured at invite time
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, utoipa::ToSchema)]
pub struct InvitationUserData {
    pub first_name: String,
    pub last_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>, format = Date)]
    pub date_of_birth: Option<NaiveDate>,
}

impl InvitationUserData {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn invitation(status: InvitationStatus, expires_in: Duration) -> Model {
        let now = Utc::now();
        Model {
            id: 1,
            email: "alice@co.com".to_string(),
            role: UserRole::Trainee,
            company_id: Some(1),
            invited_by: 1,
            token: "t".repeat(64),
            user_data: "{}".to_string(),
            status,
            expires_at: now + expires_in,
            accepted_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_only_pending_can_transition() {
        use InvitationStatus::*;
        for next in [Accepted, Cancelled, Expired] {
            assert!(Pending.can_transition_to(next));
        }
        assert!(!Pending.can_transition_to(Pending));
        for terminal in [Accepted, Cancelled, Expired] {
            for next in [Pending, Accepted, Cancelled, Expired] {
                assert!(
                    !terminal.can_transition_to(next),
                    "{} must not move to {}",
                    terminal,
                    next
                );
            }
        }
    }

    #[test]
    fn test_effective_status_of_lapsed_pending_is_expired() {
        let inv = invitation(InvitationStatus::Pending, Duration::seconds(-1));
        assert_eq!(inv.effective_status(Utc::now()), InvitationStatus::Expired);
    }

    #[test]
    fn test_effective_status_keeps_terminal_states() {
        let inv = invitation(InvitationStatus::Accepted, Duration::days(-3));
        assert_eq!(inv.effective_status(Utc::now()), InvitationStatus::Accepted);

        let inv = invitation(InvitationStatus::Pending, Duration::days(3));
        assert_eq!(inv.effective_status(Utc::now()), InvitationStatus::Pending);
    }

    #[test]
    fn test_status_parse() {
        assert_eq!(InvitationStatus::parse("PENDING"), Some(InvitationStatus::Pending));
        assert_eq!(InvitationStatus::parse("revoked"), None);
    }

    #[test]
    fn test_user_data_omits_empty_optionals() {
        let data = InvitationUserData {
            first_name: "Alice".to_string(),
            last_name: "Liddell".to_string(),
            ..Default::default()
        };
        let json = serde_json::to_value(&data).unwrap();
        assert_eq!(json, serde_json::json!({"first_name": "Alice", "last_name": "Liddell"}));
    }
}
