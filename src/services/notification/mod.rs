//! Invitation email delivery.
//!
//! `InvitationMailer` is the seam the invitation service talks to; the SMTP
//! `EmailProvider` implements it in production and tests substitute a
//! recording mailer.

mod email;
mod templates;

pub use email::EmailProvider;
pub use templates::InvitationEmailContent;

use async_trait::async_trait;

/// Everything needed to render one invitation email
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvitationEmail {
    pub to: String,
    pub recipient_name: String,
    pub role_label: String,
    pub company_name: Option<String>,
    pub inviter_name: String,
    pub accept_url: String,
    pub expires_in_days: i64,
}

impl InvitationEmail {
    /// Acceptance link carried in every invitation email
    pub fn accept_url(base_url: &str, token: &str) -> String {
        format!(
            "{}/accept-invitation?token={}",
            base_url.trim_end_matches('/'),
            urlencoding::encode(token)
        )
    }

    pub fn content(&self) -> InvitationEmailContent {
        InvitationEmailContent::new(self)
    }
}

/// Result of sending an email
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendResult {
    pub success: bool,
    pub error: Option<String>,
}

impl SendResult {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
        }
    }
}

#[async_trait]
pub trait InvitationMailer: Send + Sync {
    async fn send_invitation(&self, email: &InvitationEmail) -> SendResult;
}

/// Mailer used when no SMTP host is configured; every send fails
pub struct DisabledMailer;

#[async_trait]
impl InvitationMailer for DisabledMailer {
    async fn send_invitation(&self, email: &InvitationEmail) -> SendResult {
        tracing::warn!(to = %email.to, "Email delivery is not configured");
        SendResult::failed("Email delivery is not configured")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accept_url_encodes_token() {
        let url = InvitationEmail::accept_url("https://app.example.com/", "ab cd");
        assert_eq!(url, "https://app.example.com/accept-invitation?token=ab%20cd");
    }

    #[tokio::test]
    async fn test_disabled_mailer_reports_failure() {
        let email = InvitationEmail {
            to: "alice@co.com".to_string(),
            recipient_name: "Alice Liddell".to_string(),
            role_label: "Trainee".to_string(),
            company_name: None,
            inviter_name: "Root".to_string(),
            accept_url: "http://localhost:3000/accept-invitation?token=x".to_string(),
            expires_in_days: 7,
        };
        let result = DisabledMailer.send_invitation(&email).await;
        assert!(!result.success);
        assert!(result.error.is_some());
    }
}
