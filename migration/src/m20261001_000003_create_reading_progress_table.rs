use crate::m20261001_000001_create_users_table::Users;
use crate::m20261001_000002_create_documents_table::Documents;
use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ReadingProgress::Table)
                    .if_not_exists()
                    .col(pk_auto(ReadingProgress::Id))
                    .col(integer(ReadingProgress::DocumentId))
                    .col(integer(ReadingProgress::UserId))
                    .col(integer(ReadingProgress::PageNum).default(0))
                    .col(string_null(ReadingProgress::BookScrollId))
                    .col(timestamp_with_time_zone(ReadingProgress::LastModified))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_reading_progress_document_id")
                            .from(ReadingProgress::Table, ReadingProgress::DocumentId)
                            .to(Documents::Table, Documents::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_reading_progress_user_id")
                            .from(ReadingProgress::Table, ReadingProgress::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // One record per (document, user)
        manager
            .create_index(
                Index::create()
                    .name("idx_reading_progress_document_user")
                    .table(ReadingProgress::Table)
                    .col(ReadingProgress::DocumentId)
                    .col(ReadingProgress::UserId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ReadingProgress::Table).to_owned())
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum ReadingProgress {
    Table,
    Id,
    DocumentId,
    UserId,
    PageNum,
    BookScrollId,
    LastModified,
}
