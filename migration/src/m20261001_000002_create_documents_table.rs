use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Documents::Table)
                    .if_not_exists()
                    .col(pk_auto(Documents::Id))
                    .col(string_uniq(Documents::Path))
                    .col(string_null(Documents::KoreaderHash))
                    .col(string(Documents::TitleHash))
                    .col(integer(Documents::Pages).default(0))
                    .col(big_integer(Documents::FileSize).default(0))
                    .col(timestamp_with_time_zone(Documents::UpdatedAt))
                    .to_owned(),
            )
            .await?;

        // Sync lookups go through the hash, never the path
        manager
            .create_index(
                Index::create()
                    .name("idx_documents_koreader_hash")
                    .table(Documents::Table)
                    .col(Documents::KoreaderHash)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_documents_title_hash")
                    .table(Documents::Table)
                    .col(Documents::TitleHash)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Documents::Table).to_owned())
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
pub enum Documents {
    Table,
    Id,
    Path,
    KoreaderHash,
    TitleHash,
    Pages,
    FileSize,
    UpdatedAt,
    FileModified,
}
