pub use sea_orm_migration::prelude::*;

mod m20260301_000001_init;
mod m20260301_000002_receipt_documents;

/// Schema of the relational system-of-record.
pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![Box::new(m20260301_000001_init::Migration)]
    }
}

/// Schema of the document mirror database.
pub struct MirrorMigrator;

#[async_trait::async_trait]
impl MigratorTrait for MirrorMigrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![Box::new(m20260301_000002_receipt_documents::Migration)]
    }
}
