pub mod audit_log;
pub mod company;
pub mod invitation;
pub mod user;

#[allow(unused_imports)]
pub mod prelude {
    pub use super::audit_log::{self, Entity as AuditLog};
    pub use super::company::{self, Entity as Company};
    pub use super::invitation::{self, Entity as Invitation};
    pub use super::user::{self, Entity as User};
}
