use std::env;
use std::path::PathBuf;

/// Identity provider settings: session verification, webhook secret and admin API
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// PEM public key used to verify RS256 session tokens
    pub jwt_public_key_path: Option<PathBuf>,
    /// Shared secret used to verify HS256 session tokens (takes precedence when set)
    pub jwt_secret: Option<String>,
    /// Svix signing secret (`whsec_...`) for identity provider webhooks
    pub webhook_secret: Option<String>,
    /// Base URL of the identity provider's backend API
    pub idp_api_url: String,
    /// Secret key for the identity provider's backend API
    pub idp_secret_key: Option<String>,
}

impl AuthConfig {
    pub fn from_env() -> Self {
        Self {
            jwt_public_key_path: env::var("TRAINHUB_IDP_JWT_PUBLIC_KEY_PATH")
                .ok()
                .map(PathBuf::from),
            jwt_secret: non_empty("TRAINHUB_IDP_JWT_SECRET"),
            webhook_secret: non_empty("TRAINHUB_WEBHOOK_SECRET"),
            idp_api_url: env::var("TRAINHUB_IDP_API_URL")
                .unwrap_or_else(|_| "https://api.clerk.com/v1".to_string()),
            idp_secret_key: non_empty("TRAINHUB_IDP_SECRET_KEY"),
        }
    }
}

fn non_empty(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}
