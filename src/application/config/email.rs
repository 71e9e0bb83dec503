use std::env;

use super::env_flag;

/// SMTP settings for the invitation mailer
#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub smtp_host: Option<String>,
    pub smtp_port: u16,
    pub username: String,
    pub password: String,
    pub from_address: String,
    pub from_name: String,
    pub use_tls: bool,
}

impl EmailConfig {
    pub fn from_env() -> Self {
        Self {
            smtp_host: env::var("TRAINHUB_SMTP_HOST").ok().filter(|h| !h.is_empty()),
            smtp_port: env::var("TRAINHUB_SMTP_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(587),
            username: env::var("TRAINHUB_SMTP_USERNAME").unwrap_or_default(),
            password: env::var("TRAINHUB_SMTP_PASSWORD").unwrap_or_default(),
            from_address: env::var("TRAINHUB_SMTP_FROM_ADDRESS")
                .unwrap_or_else(|_| "no-reply@trainhub.local".to_string()),
            from_name: env::var("TRAINHUB_SMTP_FROM_NAME")
                .unwrap_or_else(|_| "Trainhub".to_string()),
            use_tls: env_flag("TRAINHUB_SMTP_USE_TLS", true),
        }
    }
}
