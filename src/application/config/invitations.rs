use std::env;

use chrono::Duration;

const DEFAULT_EXPIRY_DAYS: i64 = 7;
const MAX_EXPIRY_DAYS: i64 = 365;

#[derive(Debug, Clone)]
pub struct InvitationConfig {
    /// Public URL of the web app; acceptance links point at `{base_url}/accept-invitation`
    pub base_url: String,
    pub expiry_days: i64,
}

impl InvitationConfig {
    pub fn from_env() -> Self {
        Self {
            base_url: env::var("TRAINHUB_APP_BASE_URL")
                .map(|u| u.trim_end_matches('/').to_string())
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            expiry_days: env::var("TRAINHUB_INVITATION_EXPIRY_DAYS")
                .ok()
                .and_then(|d| d.parse().ok())
                .map(clamp_expiry_days)
                .unwrap_or(DEFAULT_EXPIRY_DAYS),
        }
    }

    /// Validity window of a new invitation
    pub fn expiry(&self) -> Duration {
        Duration::try_days(clamp_expiry_days(self.expiry_days))
            .unwrap_or_else(|| Duration::days(DEFAULT_EXPIRY_DAYS))
    }
}

/// Non-positive values fall back to the default; large ones are capped at a year
fn clamp_expiry_days(days: i64) -> i64 {
    if days <= 0 {
        DEFAULT_EXPIRY_DAYS
    } else {
        days.min(MAX_EXPIRY_DAYS)
    }
}

impl Default for InvitationConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            expiry_days: DEFAULT_EXPIRY_DAYS,
        }
    }
}
