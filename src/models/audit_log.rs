use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize, utoipa::ToSchema)]
#[sea_orm(table_name = "audit_logs")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    #[schema(value_type = String)]
    pub timestamp: DateTimeUtc,
    pub user_id: Option<i64>,
    pub actor: Option<String>,
    pub action: String,
    pub category: String,
    pub resource_type: String,
    pub resource_id: Option<String>,
    pub details: Option<String>, // JSON string for flexible data
    pub success: bool,
    pub error_message: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

// Audit action types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditAction {
    // Invitation lifecycle
    InvitationCreated,
    InvitationResent,
    InvitationCancelled,
    InvitationAccepted,
    InvitationExpired,
    InvitationEmailFailed,

    // Users
    UserProvisioned,
    IdentityMetadataSyncFailed,

    // Security
    WebhookRejected,
}

impl AuditAction {
    pub const ALL: [AuditAction; 9] = [
        AuditAction::InvitationCreated,
        AuditAction::InvitationResent,
        AuditAction::InvitationCancelled,
        AuditAction::InvitationAccepted,
        AuditAction::InvitationExpired,
        AuditAction::InvitationEmailFailed,
        AuditAction::UserProvisioned,
        AuditAction::IdentityMetadataSyncFailed,
        AuditAction::WebhookRejected,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::InvitationCreated => "invitation_created",
            AuditAction::InvitationResent => "invitation_resent",
            AuditAction::InvitationCancelled => "invitation_cancelled",
            AuditAction::InvitationAccepted => "invitation_accepted",
            AuditAction::InvitationExpired => "invitation_expired",
            AuditAction::InvitationEmailFailed => "invitation_email_failed",
            AuditAction::UserProvisioned => "user_provisioned",
            AuditAction::IdentityMetadataSyncFailed => "identity_metadata_sync_failed",
            AuditAction::WebhookRejected => "webhook_rejected",
        }
    }

    /// Category of every action, fixed at definition time
    pub fn category(&self) -> AuditCategory {
        match self {
            AuditAction::InvitationCreated
            | AuditAction::InvitationResent
            | AuditAction::InvitationCancelled
            | AuditAction::InvitationAccepted
            | AuditAction::InvitationExpired
            | AuditAction::InvitationEmailFailed => AuditCategory::Invitation,
            AuditAction::UserProvisioned | AuditAction::IdentityMetadataSyncFailed => {
                AuditCategory::User
            }
            AuditAction::WebhookRejected => AuditCategory::Security,
        }
    }
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditCategory {
    Invitation,
    User,
    Security,
}

impl std::fmt::Display for AuditCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuditCategory::Invitation => write!(f, "invitation"),
            AuditCategory::User => write!(f, "user"),
            AuditCategory::Security => write!(f, "security"),
        }
    }
}

// Resource types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResourceType {
    Invitation,
    User,
    Webhook,
}

impl std::fmt::Display for ResourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceType::Invitation => write!(f, "invitation"),
            ResourceType::User => write!(f, "user"),
            ResourceType::Webhook => write!(f, "webhook"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invitation_actions_are_categorised_as_invitation() {
        for action in AuditAction::ALL {
            if action.as_str().starts_with("invitation_") {
                assert_eq!(action.category(), AuditCategory::Invitation, "{}", action);
            }
        }
    }

    #[test]
    fn test_action_names_are_unique() {
        let mut names: Vec<&str> = AuditAction::ALL.iter().map(|a| a.as_str()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), AuditAction::ALL.len());
    }

    #[test]
    fn test_webhook_rejection_is_security_event() {
        assert_eq!(
            AuditAction::WebhookRejected.category(),
            AuditCategory::Security
        );
        assert_eq!(AuditCategory::Security.to_string(), "security");
    }
}
