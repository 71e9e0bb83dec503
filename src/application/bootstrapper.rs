//! Application bootstrapper
//!
//! Handles all initialization and setup for the Trainhub backend.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::HeaderValue;
use axum::Router;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::CONFIG;
use crate::db;
use crate::endpoints;
use crate::services::identity::{HttpIdentityProvider, IdentityProvider};
use crate::services::notification::{DisabledMailer, EmailProvider, InvitationMailer};
use crate::services::{scheduler, SessionVerifier, WebhookVerifier};
use crate::state::AppState;

/// Bootstrap and run the application
pub async fn run() -> anyhow::Result<()> {
    init_tracing();

    tracing::info!("Starting Trainhub backend v{}", env!("CARGO_PKG_VERSION"));

    let state = init_services().await?;

    // Start periodic task scheduler
    scheduler::start_scheduler(state.db.clone());

    let app = create_app(state);

    serve(app).await
}

/// Initialize tracing/logging
fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("trainhub={}", CONFIG.log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_ansi(false))
        .init();
}

/// Initialize all application services
async fn init_services() -> anyhow::Result<AppState> {
    let conn = db::connect().await?;
    tracing::info!("Database connection established");

    let mailer = init_mailer()?;
    let identity: Arc<dyn IdentityProvider> = Arc::new(HttpIdentityProvider::new(
        &CONFIG.auth.idp_api_url,
        CONFIG.auth.idp_secret_key.clone(),
    )?);
    if CONFIG.auth.idp_secret_key.is_none() {
        tracing::warn!("No identity provider secret key configured, metadata sync will fail");
    }

    let session = SessionVerifier::from_config(&CONFIG.auth)?;

    let webhook = match CONFIG.auth.webhook_secret.as_deref() {
        Some(secret) => Some(WebhookVerifier::new(secret)?),
        None => {
            tracing::warn!("No webhook secret configured, identity webhooks will be rejected");
            None
        }
    };

    Ok(AppState::new(
        conn,
        mailer,
        identity,
        session,
        webhook,
        CONFIG.invitations.clone(),
    ))
}

/// Initialize the invitation mailer from SMTP settings
fn init_mailer() -> anyhow::Result<Arc<dyn InvitationMailer>> {
    match EmailProvider::from_config(&CONFIG.email).map_err(anyhow::Error::msg)? {
        Some(provider) => {
            tracing::info!("SMTP invitation mailer initialized");
            Ok(Arc::new(provider))
        }
        None => {
            tracing::warn!("No SMTP host configured, invitation emails cannot be sent");
            Ok(Arc::new(DisabledMailer))
        }
    }
}

/// Create the main application router
pub fn create_app(state: AppState) -> Router {
    let origins: Vec<HeaderValue> = CONFIG
        .server
        .allowed_origins
        .iter()
        .filter_map(|o| o.parse().ok())
        .collect();

    let allow_origin = if origins.is_empty() {
        AllowOrigin::from(Any)
    } else {
        AllowOrigin::list(origins)
    };

    let cors = CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(Any)
        .allow_headers(Any);

    endpoints::create_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

/// Start the HTTP server
async fn serve(app: Router) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", CONFIG.server.host, CONFIG.server.port).parse()?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
