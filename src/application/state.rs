use std::sync::Arc;

use crate::config::invitations::InvitationConfig;
use crate::db::DbConn;
use crate::services::audit::AuditService;
use crate::services::identity::IdentityProvider;
use crate::services::invitation::InvitationService;
use crate::services::notification::InvitationMailer;
use crate::services::session::SessionVerifier;
use crate::services::webhook::WebhookVerifier;

/// Application state containing all shared resources
#[derive(Clone)]
pub struct AppState {
    pub db: DbConn,
    pub audit: AuditService,
    pub invitations: InvitationService,
    pub session: SessionVerifier,
    /// `None` when no webhook secret is configured; deliveries then fail with 500
    pub webhook: Option<WebhookVerifier>,
}

impl AppState {
    pub fn new(
        db: DbConn,
        mailer: Arc<dyn InvitationMailer>,
        identity: Arc<dyn IdentityProvider>,
        session: SessionVerifier,
        webhook: Option<WebhookVerifier>,
        invitation_config: InvitationConfig,
    ) -> Self {
        let audit = AuditService::new(db.clone());
        let invitations =
            InvitationService::new(db.clone(), audit.clone(), mailer, identity, invitation_config);

        Self {
            db,
            audit,
            invitations,
            session,
            webhook,
        }
    }
}
