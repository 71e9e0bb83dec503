//! Identity webhook tests
//!
//! Covers:
//! - signature verification (valid, tampered body, wrong secret, stale timestamp, missing headers)
//! - missing webhook secret configuration
//! - `user.created` reconciliation with a pending invitation
//! - redelivery idempotence
//! - self-signup provisioning
//! - ignored event types and malformed payloads
//! - metadata push failures

mod common;
use common::{
    json_request, lapse_invitation, reload_invitation, send, session_token, signed_webhook_request,
    user_created_event, TestContext, WEBHOOK_SECRET,
};

use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::Utc;
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};
use serde_json::json;

use trainhub::models::audit_log;
use trainhub::models::invitation::{self, InvitationStatus, InvitationUserData};
use trainhub::models::user::{self, UserRole};
use trainhub::services::invitation::NewInvitation;
use trainhub::services::webhook::{
    WebhookVerifier, HEADER_ID, HEADER_SIGNATURE, HEADER_TIMESTAMP,
};

async fn invite(ctx: &TestContext, email: &str, role: UserRole) -> invitation::Model {
    ctx.state
        .invitations
        .create(
            &ctx.site_admin,
            NewInvitation {
                email: email.to_string(),
                role,
                company_id: Some(ctx.acme.id),
                user_data: InvitationUserData {
                    first_name: "Carol".to_string(),
                    last_name: "Danvers".to_string(),
                    department: Some("Flight".to_string()),
                    ..Default::default()
                },
            },
        )
        .await
        .unwrap()
        .invitation
}

async fn find_user(ctx: &TestContext, subject: &str) -> Option<user::Model> {
    user::Entity::find()
        .filter(user::Column::UserId.eq(subject))
        .one(&ctx.db)
        .await
        .unwrap()
}

async fn count_audit(ctx: &TestContext, action: &str) -> u64 {
    audit_log::Entity::find()
        .filter(audit_log::Column::Action.eq(action))
        .count(&ctx.db)
        .await
        .unwrap()
}

fn raw_webhook_request(msg_id: &str, ts: i64, signature: &str, body: &str) -> Request<Body> {
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

// ============================================================================
// Reconciliation
// ============================================================================

#[tokio::test]
async fn test_user_created_reconciles_pending_invitation() {
    let ctx = TestContext::new().await;
    let inv = invite(&ctx, "carol@co.com", UserRole::CompanyAdmin).await;

    let body = user_created_event("user_carol", "Carol@Co.com", "Caz", "D");
    let (status, ack) = send(ctx.app(), signed_webhook_request("msg_1", &body)).await;

    assert_eq!(status, StatusCode::OK, "{}", ack);
    assert_eq!(ack, json!({ "success": true }));

    let user = find_user(&ctx, "user_carol").await.unwrap();
    assert_eq!(user.email, "carol@co.com");
    assert_eq!(user.role, UserRole::CompanyAdmin);
    assert_eq!(user.company_id, Some(ctx.acme.id));
    // Invitation snapshot wins over names typed at sign-up
    assert_eq!(user.first_name, "Carol");
    assert_eq!(user.department.as_deref(), Some("Flight"));
    assert_eq!(user.invitation_id, Some(inv.id));

    assert_eq!(
        reload_invitation(&ctx.db, inv.id).await.status,
        InvitationStatus::Accepted
    );
    assert_eq!(count_audit(&ctx, "invitation_accepted").await, 1);

    let pushes = ctx.identity.pushes();
    assert_eq!(pushes.len(), 1);
    assert_eq!(pushes[0].0, "user_carol");
    assert_eq!(pushes[0].1.role, UserRole::CompanyAdmin);
}

#[tokio::test]
async fn test_redelivery_is_idempotent() {
    let ctx = TestContext::new().await;
    invite(&ctx, "carol@co.com", UserRole::Trainee).await;
    let body = user_created_event("user_carol", "carol@co.com", "Carol", "Danvers");

    for _ in 0..3 {
        let (status, _) = send(ctx.app(), signed_webhook_request("msg_1", &body)).await;
        assert_eq!(status, StatusCode::OK);
    }

    let count = user::Entity::find()
        .filter(user::Column::UserId.eq("user_carol"))
        .count(&ctx.db)
        .await
        .unwrap();
    assert_eq!(count, 1);
    assert_eq!(count_audit(&ctx, "invitation_accepted").await, 1);
    assert_eq!(ctx.identity.pushes().len(), 1);
}

#[tokio::test]
async fn test_user_created_without_invitation_provisions_trainee() {
    let ctx = TestContext::new().await;

    let body = user_created_event("user_solo", "solo@gmail.test", " Han ", "Solo");
    let (status, _) = send(ctx.app(), signed_webhook_request("msg_2", &body)).await;
    assert_eq!(status, StatusCode::OK);

    let user = find_user(&ctx, "user_solo").await.unwrap();
    assert_eq!(user.role, UserRole::Trainee);
    assert_eq!(user.company_id, None);
    assert_eq!(user.invitation_id, None);
    assert_eq!(user.first_name, "Han");
    assert!(!user.profile_completed);
    assert_eq!(count_audit(&ctx, "user_provisioned").await, 1);

    let pushes = ctx.identity.pushes();
    assert_eq!(pushes.len(), 1);
    assert_eq!(pushes[0].1.company_id, None);
    assert_eq!(pushes[0].1.invitation_id, None);
}

#[tokio::test]
async fn test_lapsed_invitation_is_not_reconciled() {
    let ctx = TestContext::new().await;
    let inv = invite(&ctx, "late@co.com", UserRole::CompanyAdmin).await;
    lapse_invitation(&ctx.db, inv.id).await;

    let body = user_created_event("user_late", "late@co.com", "La", "Te");
    let (status, _) = send(ctx.app(), signed_webhook_request("msg_3", &body)).await;
    assert_eq!(status, StatusCode::OK);

    let user = find_user(&ctx, "user_late").await.unwrap();
    assert_eq!(user.role, UserRole::Trainee);
    assert_eq!(user.company_id, None);
    assert_ne!(
        reload_invitation(&ctx.db, inv.id).await.status,
        InvitationStatus::Accepted
    );
}

#[tokio::test]
async fn test_email_owned_by_another_subject_is_acknowledged() {
    let ctx = TestContext::new().await;

    let body = user_created_event("user_imposter", &ctx.acme_trainee.email, "Im", "Poster");
    let (status, _) = send(ctx.app(), signed_webhook_request("msg_4", &body)).await;

    assert_eq!(status, StatusCode::OK);
    assert!(find_user(&ctx, "user_imposter").await.is_none());
}

#[tokio::test]
async fn test_direct_accept_after_webhook_fails() {
    let ctx = TestContext::new().await;
    let inv = invite(&ctx, "carol@co.com", UserRole::Trainee).await;

    let body = user_created_event("user_carol", "carol@co.com", "Carol", "Danvers");
    send(ctx.app(), signed_webhook_request("msg_5", &body)).await;

    let session = session_token("user_carol", Some("carol@co.com"));
    let (status, _) = send(
        ctx.app(),
        json_request(
            "POST",
            "/api/invitations/accept",
            Some(&session),
            Some(json!({ "token": inv.token })),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        user::Entity::find()
            .filter(user::Column::Email.eq("carol@co.com"))
            .count(&ctx.db)
            .await
            .unwrap(),
        1
    );
}

#[tokio::test]
async fn test_metadata_push_failure_still_acknowledged() {
    let ctx = TestContext::new().await;
    invite(&ctx, "carol@co.com", UserRole::Trainee).await;
    ctx.identity.set_failing(true);

    let body = user_created_event("user_carol", "carol@co.com", "Carol", "Danvers");
    let (status, _) = send(ctx.app(), signed_webhook_request("msg_6", &body)).await;

    assert_eq!(status, StatusCode::OK);
    assert!(find_user(&ctx, "user_carol").await.is_some());
    assert_eq!(count_audit(&ctx, "identity_metadata_sync_failed").await, 1);
}

// ============================================================================
// Event filtering & payloads
// ============================================================================

#[tokio::test]
async fn test_other_event_types_are_ignored() {
    let ctx = TestContext::new().await;

    let body = json!({
        "type": "user.updated",
        "data": { "id": "user_x", "email_addresses": [] }
    })
    .to_string();
    let (status, ack) = send(ctx.app(), signed_webhook_request("msg_7", &body)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(ack["success"], true);
    assert!(find_user(&ctx, "user_x").await.is_none());
}

#[tokio::test]
async fn test_user_created_without_email_is_400() {
    let ctx = TestContext::new().await;

    let body = json!({
        "type": "user.created",
        "data": { "id": "user_noemail", "email_addresses": [] }
    })
    .to_string();
    let (status, _) = send(ctx.app(), signed_webhook_request("msg_8", &body)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(find_user(&ctx, "user_noemail").await.is_none());
}

#[tokio::test]
async fn test_malformed_json_is_400() {
    let ctx = TestContext::new().await;

    let (status, _) = send(ctx.app(), signed_webhook_request("msg_9", "{not json")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// ============================================================================
// Signature verification
// ============================================================================

#[tokio::test]
async fn test_tampered_body_rejected_and_audited() {
    let ctx = TestContext::new().await;
    let verifier = WebhookVerifier::new(WEBHOOK_SECRET).unwrap();
    let ts = Utc::now().timestamp();

    let signed = user_created_event("user_a", "a@co.com", "Aa", "Bb");
    let tampered = user_created_event("user_a", "admin@co.com", "Aa", "Bb");
    let signature = verifier.sign("msg_10", ts, signed.as_bytes()).unwrap();

    let (status, _) = send(
        ctx.app(),
        raw_webhook_request("msg_10", ts, &signature, &tampered),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(find_user(&ctx, "user_a").await.is_none());

    let rejected = audit_log::Entity::find()
        .filter(audit_log::Column::Action.eq("webhook_rejected"))
        .one(&ctx.db)
        .await
        .unwrap()
        .unwrap();
    assert!(!rejected.success);
    assert_eq!(rejected.category, "security");
    assert_eq!(rejected.resource_id.as_deref(), Some("msg_10"));
}

#[tokio::test]
async fn test_wrong_secret_rejected() {
    let ctx = TestContext::new().await;
    // base64("some-other-secret")
    let other = WebhookVerifier::new("whsec_c29tZS1vdGhlci1zZWNyZXQ=").unwrap();
    let ts = Utc::now().timestamp();
    let body = user_created_event("user_a", "a@co.com", "Aa", "Bb");
    let signature = other.sign("msg_11", ts, body.as_bytes()).unwrap();

    let (status, _) = send(ctx.app(), raw_webhook_request("msg_11", ts, &signature, &body)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_stale_timestamp_rejected() {
    let ctx = TestContext::new().await;
    let verifier = WebhookVerifier::new(WEBHOOK_SECRET).unwrap();
    let ts = Utc::now().timestamp() - 10 * 60;
    let body = user_created_event("user_a", "a@co.com", "Aa", "Bb");
    let signature = verifier.sign("msg_12", ts, body.as_bytes()).unwrap();

    let (status, _) = send(ctx.app(), raw_webhook_request("msg_12", ts, &signature, &body)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(find_user(&ctx, "user_a").await.is_none());
}

#[tokio::test]
async fn test_missing_signature_headers_rejected() {
    let ctx = TestContext::new().await;
    let body = user_created_event("user_a", "a@co.com", "Aa", "Bb");

    let (status, _) = send(
        ctx.app(),
        json_request(
            "POST",
            "/api/webhooks/identity",
            None,
            Some(serde_json::from_str(&body).unwrap()),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_missing_secret_is_500() {
    let ctx = TestContext::without_webhook_secret().await;
    let body = user_created_event("user_a", "a@co.com", "Aa", "Bb");

    let (status, body) = send(ctx.app(), signed_webhook_request("msg_13", &body)).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["detail"], "Webhook secret is not configured");
    assert!(find_user(&ctx, "user_a").await.is_none());
}
