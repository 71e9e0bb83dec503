use std::marker::PhantomData;

use axum::{extract::FromRequestParts, http::request::Parts};

use crate::error::AppError;
use crate::middleware::AuthenticatedIdentity;
use crate::models::user::{self, UserRole};

/// Trait for role requirement marker types
pub trait RoleRequirement: Send + Sync + 'static {
    /// Shown in the 403 message
    const DESCRIPTION: &'static str;

    fn allows(role: UserRole) -> bool;
}

/// Macro to define role requirement types
///
/// Creates zero-sized marker types that implement `RoleRequirement`
macro_rules! define_role_requirements {
    ($($(#[$meta:meta])* $name:ident => $desc:expr, [$($role:ident),+]),* $(,)?) => {
        $(
            $(#[$meta])*
            #[derive(Debug, Clone, Copy)]
            pub struct $name;

            impl RoleRequirement for $name {
                const DESCRIPTION: &'static str = $desc;

                fn allows(role: UserRole) -> bool {
                    matches!(role, $(UserRole::$role)|+)
                }
            }
        )*
    };
}

define_role_requirements! {
    /// Platform-wide administration
    SiteAdminOnly => "Site admin required", [SiteAdmin],
    /// Invitation management, scoped per company by the service
    CompanyAdminOrAbove => "Administrator access required", [SiteAdmin, CompanyAdmin],
}

/// Extractor that requires an active app user with a sufficient role
///
/// # Example
/// ```ignore
/// async fn cancel_invitation(
///     auth: Authorized<CompanyAdminOrAbove>,
///     Path(id): Path<i64>,
/// ) -> Result<()> {
///     let admin = auth.user();
///     // admin is a site or company administrator
/// }
/// ```
#[derive(Debug, Clone)]
pub struct Authorized<P: RoleRequirement>(pub user::Model, PhantomData<P>);

impl<P: RoleRequirement> Authorized<P> {
    /// Get the authorized user
    pub fn user(&self) -> &user::Model {
        &self.0
    }
}

impl<S, P> FromRequestParts<S> for Authorized<P>
where
    S: Send + Sync,
    P: RoleRequirement,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // Set by the auth middleware
        let identity = parts
            .extensions
            .get::<AuthenticatedIdentity>()
            .ok_or_else(|| AppError::Unauthorized("Authentication required".to_string()))?;

        let user = identity
            .user
            .as_ref()
            .filter(|u| u.is_active)
            .ok_or_else(|| AppError::Forbidden("No active account for this identity".to_string()))?;

        if !P::allows(user.role) {
            return Err(AppError::Forbidden(P::DESCRIPTION.to_string()));
        }

        Ok(Authorized(user.clone(), PhantomData))
    }
}

/// Extractor for any verified identity, with or without an app user
#[derive(Debug, Clone)]
pub struct Identity(pub AuthenticatedIdentity);

impl Identity {
    pub fn subject(&self) -> &str {
        &self.0.subject
    }

    pub fn email(&self) -> Option<&str> {
        self.0.email.as_deref()
    }

    pub fn user(&self) -> Option<&user::Model> {
        self.0.user.as_ref()
    }
}

impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let identity = parts
            .extensions
            .get::<AuthenticatedIdentity>()
            .ok_or_else(|| AppError::Unauthorized("Authentication required".to_string()))?;

        Ok(Identity(identity.clone()))
    }
}
