//! Identity provider session token verification

use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::auth::AuthConfig;
use crate::error::{AppError, Result};

/// Claims read from an identity provider session token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: String, // Identity provider subject
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub exp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
}

/// Verifies session tokens against the configured key
#[derive(Clone)]
pub struct SessionVerifier {
    key: Option<Arc<DecodingKey>>,
    algorithm: Algorithm,
}

impl SessionVerifier {
    pub fn hs256(secret: &str) -> Self {
        Self {
            key: Some(Arc::new(DecodingKey::from_secret(secret.as_bytes()))),
            algorithm: Algorithm::HS256,
        }
    }

    pub fn rs256_pem(pem: &[u8]) -> Result<Self> {
        let key = DecodingKey::from_rsa_pem(pem)
            .map_err(|e| AppError::Internal(format!("Invalid public key: {}", e)))?;
        Ok(Self {
            key: Some(Arc::new(key)),
            algorithm: Algorithm::RS256,
        })
    }

    /// Verifier that rejects everything; used when no key is configured
    pub fn disabled() -> Self {
        Self {
            key: None,
            algorithm: Algorithm::RS256,
        }
    }

    /// Shared secret wins over the public key when both are configured
    pub fn from_config(config: &AuthConfig) -> Result<Self> {
        if let Some(secret) = &config.jwt_secret {
            return Ok(Self::hs256(secret));
        }

        match &config.jwt_public_key_path {
            Some(path) => {
                let pem = std::fs::read(path)?;
                Self::rs256_pem(&pem)
            }
            None => {
                tracing::warn!(
                    "No session verification key configured, \
                     authenticated routes will reject all requests"
                );
                Ok(Self::disabled())
            }
        }
    }

    pub fn verify(&self, token: &str) -> Result<SessionClaims> {
        let key = self
            .key
            .as_deref()
            .ok_or_else(|| {
                AppError::Unauthorized("Session verification is not configured".to_string())
            })?;

        let mut validation = Validation::new(self.algorithm);
        validation.validate_exp = true;
        // Audience is deployment-specific
        validation.validate_aud = false;
        validation.leeway = 0;

        let token_data = decode::<SessionClaims>(token, key, &validation)?;
        Ok(token_data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn mint(secret: &str, exp_offset: i64) -> String {
        let claims = SessionClaims {
            sub: "user_2abc".to_string(),
            email: Some("alice@co.com".to_string()),
            exp: chrono::Utc::now().timestamp() + exp_offset,
            iat: None,
        };
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn test_valid_token_verifies() {
        let verifier = SessionVerifier::hs256("session-secret");
        let claims = verifier.verify(&mint("session-secret", 300)).unwrap();
        assert_eq!(claims.sub, "user_2abc");
        assert_eq!(claims.email.as_deref(), Some("alice@co.com"));
    }

    #[test]
    fn test_expired_token_rejected() {
        let verifier = SessionVerifier::hs256("session-secret");
        let err = verifier.verify(&mint("session-secret", -60)).unwrap_err();
        assert!(matches!(err, AppError::Jwt(_)));
    }

    #[test]
    fn test_wrong_key_rejected() {
        let verifier = SessionVerifier::hs256("session-secret");
        assert!(verifier.verify(&mint("other-secret", 300)).is_err());
    }

    #[test]
    fn test_disabled_verifier_rejects() {
        let err = SessionVerifier::disabled()
            .verify(&mint("session-secret", 300))
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }
}
