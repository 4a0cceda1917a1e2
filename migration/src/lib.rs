pub use sea_orm_migration::prelude::*;

mod m20261001_000001_create_users_table;
mod m20261001_000002_create_documents_table;
mod m20261001_000003_create_reading_progress_table;
mod m20261001_000004_create_server_settings_table;
mod m20261001_000005_add_document_file_modified;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20261001_000001_create_users_table::Migration),
            Box::new(m20261001_000002_create_documents_table::Migration),
            Box::new(m20261001_000003_create_reading_progress_table::Migration),
            Box::new(m20261001_000004_create_server_settings_table::Migration),
            Box::new(m20261001_000005_add_document_file_modified::Migration),
        ]
    }
}
