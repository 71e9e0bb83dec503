pub mod audit;
pub mod identity;
pub mod invitation;
pub mod notification;
pub mod reconciliation;
pub mod scheduler;
pub mod session;
pub mod token;
pub mod webhook;

pub use audit::{AuditEvent, AuditService};
pub use identity::{HttpIdentityProvider, IdentityProvider};
pub use invitation::{InvitationError, InvitationService};
pub use notification::{EmailProvider, InvitationMailer};
pub use session::SessionVerifier;
pub use webhook::WebhookVerifier;
