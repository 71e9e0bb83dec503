//! Test helpers and utilities for integration testing.
//!
//! This module provides an in-memory database with the real migrations, seed
//! data (companies and administrators), recording doubles for the mailer and
//! the identity provider, session token minting and signed webhook requests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use chrono::{Duration, Utc};
use http_body_util::BodyExt;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use parking_lot::Mutex;
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, Set};
use tower::util::ServiceExt;

use trainhub::config::invitations::InvitationConfig;
use trainhub::endpoints::create_router;
use trainhub::models::user::UserRole;
use trainhub::models::{company, invitation, user};
use trainhub::services::identity::{IdentityError, IdentityMetadata, IdentityProvider};
use trainhub::services::notification::{InvitationEmail, InvitationMailer, SendResult};
use trainhub::services::session::{SessionClaims, SessionVerifier};
use trainhub::services::webhook::{
    WebhookVerifier, HEADER_ID, HEADER_SIGNATURE, HEADER_TIMESTAMP,
};
use trainhub::state::AppState;

pub const SESSION_SECRET: &str = "trainhub-test-session-secret";
// base64("trainhub-test-webhook-secret")
pub const WEBHOOK_SECRET: &str = "whsec_dHJhaW5odWItdGVzdC13ZWJob29rLXNlY3JldA==";
pub const BASE_URL: &str = "https://app.trainhub.test";

/// Create an in-memory SQLite database for testing
pub async fn create_test_db() -> DatabaseConnection {
    trainhub::db::connect_with_url("sqlite::memory:")
        .await
        .expect("Failed to create test database")
}

pub async fn create_company(db: &DatabaseConnection, name: &str) -> company::Model {
    company::ActiveModel {
        name: Set(name.to_string()),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap()
}

/// Create an application user directly, bypassing invitations
pub async fn create_user(
    db: &DatabaseConnection,
    subject: &str,
    email: &str,
    role: UserRole,
    company_id: Option<i64>,
) -> user::Model {
    let now = Utc::now();
    user::ActiveModel {
        user_id: Set(subject.to_string()),
        email: Set(email.to_string()),
        role: Set(role),
        company_id: Set(company_id),
        first_name: Set("Test".to_string()),
        last_name: Set(format!("{:?}", role)),
        profile_completed: Set(true),
        is_active: Set(true),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap()
}

/// Push an invitation's deadline into the past
pub async fn lapse_invitation(db: &DatabaseConnection, invitation_id: i64) -> invitation::Model {
    let found = invitation::Entity::find_by_id(invitation_id)
        .one(db)
        .await
        .unwrap()
        .expect("invitation exists");
    let mut active: invitation::ActiveModel = found.into();
    active.expires_at = Set(Utc::now() - Duration::minutes(5));
    active.update(db).await.unwrap()
}

pub async fn reload_invitation(db: &DatabaseConnection, invitation_id: i64) -> invitation::Model {
    invitation::Entity::find_by_id(invitation_id)
        .one(db)
        .await
        .unwrap()
        .expect("invitation exists")
}

// ============================================================================
// Recording doubles
// ============================================================================

/// Mailer that records every message and can be switched to fail
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<InvitationEmail>>,
    failing: AtomicBool,
}

impl RecordingMailer {
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<InvitationEmail> {
        self.sent.lock().clone()
    }

    /// Token embedded in the most recent acceptance link
    pub fn last_token(&self) -> Option<String> {
        self.sent
            .lock()
            .last()
            .and_then(|m| m.accept_url.split("token=").nth(1).map(str::to_string))
    }
}

#[async_trait]
impl InvitationMailer for RecordingMailer {
    async fn send_invitation(&self, email: &InvitationEmail) -> SendResult {
        if self.failing.load(Ordering::SeqCst) {
            return SendResult::failed("SMTP connection refused");
        }
        self.sent.lock().push(email.clone());
        SendResult::ok()
    }
}

/// Identity provider that records metadata pushes and can be switched to fail
#[derive(Default)]
pub struct RecordingIdentityProvider {
    pushes: Mutex<Vec<(String, IdentityMetadata)>>,
    failing: AtomicBool,
}

impl RecordingIdentityProvider {
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn pushes(&self) -> Vec<(String, IdentityMetadata)> {
        self.pushes.lock().clone()
    }
}

#[async_trait]
impl IdentityProvider for RecordingIdentityProvider {
    async fn update_public_metadata(
        &self,
        subject: &str,
        metadata: &IdentityMetadata,
    ) -> Result<(), IdentityError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(IdentityError::Status {
                status: 503,
                body: "unavailable".to_string(),
            });
        }
        self.pushes
            .lock()
            .push((subject.to_string(), metadata.clone()));
        Ok(())
    }
}

// ============================================================================
// Test context
// ============================================================================

/// Seeded database, app state and doubles shared by one test
pub struct TestContext {
    pub db: DatabaseConnection,
    pub state: AppState,
    pub mailer: Arc<RecordingMailer>,
    pub identity: Arc<RecordingIdentityProvider>,
    pub acme: company::Model,
    pub globex: company::Model,
    pub site_admin: user::Model,
    pub acme_admin: user::Model,
    pub acme_trainee: user::Model,
}

impl TestContext {
    pub async fn new() -> Self {
        Self::build(Some(WEBHOOK_SECRET)).await
    }

    pub async fn without_webhook_secret() -> Self {
        Self::build(None).await
    }

    async fn build(webhook_secret: Option<&str>) -> Self {
        let db = create_test_db().await;

        let acme = create_company(&db, "Acme").await;
        let globex = create_company(&db, "Globex").await;

        let site_admin =
            create_user(&db, "user_site_admin", "root@trainhub.test", UserRole::SiteAdmin, None)
                .await;
        let acme_admin = create_user(
            &db,
            "user_acme_admin",
            "boss@acme.test",
            UserRole::CompanyAdmin,
            Some(acme.id),
        )
        .await;
        let acme_trainee = create_user(
            &db,
            "user_acme_trainee",
            "learner@acme.test",
            UserRole::Trainee,
            Some(acme.id),
        )
        .await;

        let mailer = Arc::new(RecordingMailer::default());
        let identity = Arc::new(RecordingIdentityProvider::default());

        let state = AppState::new(
            db.clone(),
            mailer.clone(),
            identity.clone(),
            SessionVerifier::hs256(SESSION_SECRET),
            webhook_secret.map(|s| WebhookVerifier::new(s).unwrap()),
            InvitationConfig {
                base_url: BASE_URL.to_string(),
                expiry_days: 7,
            },
        );

        Self {
            db,
            state,
            mailer,
            identity,
            acme,
            globex,
            site_admin,
            acme_admin,
            acme_trainee,
        }
    }

    pub fn app(&self) -> Router {
        create_router(self.state.clone())
    }

    /// Session token for an existing app user
    pub fn token_for(&self, user: &user::Model) -> String {
        session_token(&user.user_id, Some(&user.email))
    }
}

/// Mint an HS256 session token as the identity provider would
pub fn session_token(subject: &str, email: Option<&str>) -> String {
    let claims = SessionClaims {
        sub: subject.to_string(),
        email: email.map(str::to_string),
        exp: Utc::now().timestamp() + 600,
        iat: Some(Utc::now().timestamp()),
    };
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(SESSION_SECRET.as_bytes()),
    )
    .unwrap()
}

// ============================================================================
// HTTP helpers
// ============================================================================

pub fn json_request(
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<serde_json::Value>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
    match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

/// Build a webhook delivery signed with the test secret
pub fn signed_webhook_request(msg_id: &str, body: &str) -> Request<Body> {
    let verifier = WebhookVerifier::new(WEBHOOK_SECRET).unwrap();
    let ts = Utc::now().timestamp();
    let signature = verifier.sign(msg_id, ts, body.as_bytes()).unwrap();

    Request::builder()
        .method("POST")
        .uri("/api/webhooks/identity")
        .header("content-type", "application/json")
        .header(HEADER_ID, msg_id)
        .header(HEADER_TIMESTAMP, ts.to_string())
        .header(HEADER_SIGNATURE, signature)
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// `user.created` event body as the identity provider sends it
pub fn user_created_event(subject: &str, email: &str, first: &str, last: &str) -> String {
    serde_json::json!({
        "type": "user.created",
        "object": "event",
        "data": {
            "id": subject,
            "first_name": first,
            "last_name": last,
            "primary_email_address_id": "idn_primary",
            "email_addresses": [
                {"id": "idn_primary", "email_address": email}
            ]
        }
    })
    .to_string()
}

/// Send a request and return status plus JSON body (Null when empty or not JSON)
pub async fn send(app: Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
    (status, json)
}
