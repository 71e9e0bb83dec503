pub use sea_orm_migration::prelude::*;

mod m20260301_000001_create_companies;
mod m20260301_000002_create_users;
mod m20260301_000003_create_invitations;
mod m20260301_000004_create_audit_logs;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260301_000001_create_companies::Migration),
            Box::new(m20260301_000002_create_users::Migration),
            Box::new(m20260301_000003_create_invitations::Migration),
            Box::new(m20260301_000004_create_audit_logs::Migration),
        ]
    }
}
