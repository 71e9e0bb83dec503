//! Identity provider backend API client.
//!
//! After a User is materialized its role and company are mirrored into the
//! identity provider's public metadata so session tokens carry them. The
//! application database stays authoritative; a failed push is reported but
//! never rolls anything back.

use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

use crate::models::user::UserRole;

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("Identity provider API is not configured")]
    NotConfigured,

    #[error("Identity provider request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Identity provider returned {status}: {body}")]
    Status { status: u16, body: String },
}

/// Public metadata mirrored onto the identity provider user
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IdentityMetadata {
    pub role: UserRole,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invitation_id: Option<i64>,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn update_public_metadata(
        &self,
        subject: &str,
        metadata: &IdentityMetadata,
    ) -> Result<(), IdentityError>;
}

#[derive(Serialize)]
struct MetadataUpdate<'a> {
    public_metadata: &'a IdentityMetadata,
}

/// HTTP client for the identity provider's backend API
pub struct HttpIdentityProvider {
    client: reqwest::Client,
    api_url: String,
    secret_key: Option<String>,
}

impl HttpIdentityProvider {
    pub fn new(api_url: &str, secret_key: Option<String>) -> Result<Self, IdentityError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            secret_key,
        })
    }
}

#[async_trait]
impl IdentityProvider for HttpIdentityProvider {
    async fn update_public_metadata(
        &self,
        subject: &str,
        metadata: &IdentityMetadata,
    ) -> Result<(), IdentityError> {
        let secret = self
            .secret_key
            .as_deref()
            .ok_or(IdentityError::NotConfigured)?;

        let url = format!(
            "{}/users/{}/metadata",
            self.api_url,
            urlencoding::encode(subject)
        );

        let response = self
            .client
            .patch(&url)
            .bearer_auth(secret)
            .json(&MetadataUpdate {
                public_metadata: metadata,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(IdentityError::Status {
                status: status.as_u16(),
                body,
            });
        }

        tracing::debug!(subject, role = %metadata.role, "Pushed identity metadata");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_payload_shape() {
        let metadata = IdentityMetadata {
            role: UserRole::CompanyAdmin,
            company_id: Some(4),
            invitation_id: Some(9),
        };
        let json = serde_json::to_value(MetadataUpdate {
            public_metadata: &metadata,
        })
        .unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "public_metadata": {"role": "company_admin", "company_id": 4, "invitation_id": 9}
            })
        );
    }

    #[test]
    fn test_default_trainee_metadata_omits_company() {
        let metadata = IdentityMetadata {
            role: UserRole::Trainee,
            company_id: None,
            invitation_id: None,
        };
        assert_eq!(
            serde_json::to_value(&metadata).unwrap(),
            serde_json::json!({"role": "trainee"})
        );
    }

    #[tokio::test]
    async fn test_missing_secret_key_is_not_configured() {
        let provider = HttpIdentityProvider::new("https://api.clerk.com/v1/", None).unwrap();
        let metadata = IdentityMetadata {
            role: UserRole::Trainee,
            company_id: None,
            invitation_id: None,
        };
        let err = provider
            .update_public_metadata("user_1", &metadata)
            .await
            .unwrap_err();
        assert!(matches!(err, IdentityError::NotConfigured));
        assert_eq!(provider.api_url, "https://api.clerk.com/v1");
    }
}
