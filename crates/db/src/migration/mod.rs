//! Database migrations.
//!
//! Migrations are managed using sea-orm-migration.

pub use sea_orm_migration::prelude::*;

mod m20261016_000001_storage_objects;
mod m20261016_000002_storage_activity_logs;

/// Migrator for running database migrations.
pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20261016_000001_storage_objects::Migration),
            Box::new(m20261016_000002_storage_activity_logs::Migration),
        ]
    }
}
