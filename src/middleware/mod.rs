pub mod auth;
pub mod permissions;

pub use auth::require_identity;
pub use auth::AuthenticatedIdentity;
pub use permissions::*;
