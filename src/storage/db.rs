// sea-orm store over SQLite

use std::collections::HashSet;

use anyhow::Context;
use chrono::Utc;
use entities::{document, reading_progress, server_setting, user};
use migration::MigratorTrait;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectOptions, Database, DatabaseConnection,
    EntityTrait, IntoActiveModel, QueryFilter, QueryOrder, QuerySelect, Set,
    sea_query::OnConflict,
};

use super::{DocumentRepo, ProgressRepo, SettingsRepo, UserRepo};
use crate::domain::models::{DocumentIdentity, DocumentRef, Progress, ScannedDocument, UserRef};

// Keeps `IN (...)` lists well under SQLite's bound parameter limit
const DELETE_BATCH: usize = 500;

#[derive(Debug, Clone)]
pub struct DbStore {
    db: DatabaseConnection,
}

impl DbStore {
    /// Connect and bring the schema up to date.
    pub async fn connect(url: &str) -> anyhow::Result<Self> {
        let mut opt = ConnectOptions::new(url.to_owned());
        opt.sqlx_logging(false);
        Self::connect_with(opt).await
    }

    pub async fn connect_with(opt: ConnectOptions) -> anyhow::Result<Self> {
        let db = Database::connect(opt)
            .await
            .with_context(|| "Failed to connect to database")?;
        migration::Migrator::up(&db, None)
            .await
            .with_context(|| "Failed to run database migrations")?;
        Ok(Self { db })
    }

    /// Create the user if the name is new, otherwise rotate its api key.
    #[tracing::instrument(level = "debug", skip(self, api_key))]
    pub async fn ensure_user(&self, username: &str, api_key: &str) -> anyhow::Result<UserRef> {
        let existing = user::Entity::find()
            .filter(user::Column::Username.eq(username))
            .one(&self.db)
            .await?;

        let model = match existing {
            Some(model) if model.api_key == api_key => model,
            Some(model) => {
                let mut active = model.into_active_model();
                active.api_key = Set(api_key.to_owned());
                active.update(&self.db).await?
            }
            None => {
                user::ActiveModel {
                    username: Set(username.to_owned()),
                    api_key: Set(api_key.to_owned()),
                    created_at: Set(Utc::now()),
                    ..Default::default()
                }
                .insert(&self.db)
                .await?
            }
        };

        Ok(UserRef {
            id: model.id,
            username: model.username,
        })
    }

    pub async fn document_by_path(&self, path: &str) -> anyhow::Result<Option<document::Model>> {
        Ok(document::Entity::find()
            .filter(document::Column::Path.eq(path))
            .one(&self.db)
            .await?)
    }

    /// Record a scanned file. A `None` page count keeps the stored one.
    #[tracing::instrument(level = "debug", skip(self, scanned), fields(path = %scanned.path))]
    pub async fn upsert_document(&self, scanned: &ScannedDocument) -> anyhow::Result<i32> {
        let model = match self.document_by_path(&scanned.path).await? {
            Some(model) => {
                let mut active = model.into_active_model();
                active.koreader_hash = Set(Some(scanned.hash.as_str().to_owned()));
                active.title_hash = Set(scanned.title_hash.clone());
                active.file_size = Set(scanned.file_size);
                active.file_modified = Set(scanned.file_modified);
                if let Some(pages) = scanned.pages {
                    active.pages = Set(pages);
                }
                active.updated_at = Set(Utc::now());
                active.update(&self.db).await?
            }
            None => {
                document::ActiveModel {
                    path: Set(scanned.path.clone()),
                    koreader_hash: Set(Some(scanned.hash.as_str().to_owned())),
                    title_hash: Set(scanned.title_hash.clone()),
                    pages: Set(scanned.pages.unwrap_or(0)),
                    file_size: Set(scanned.file_size),
                    file_modified: Set(scanned.file_modified),
                    updated_at: Set(Utc::now()),
                    ..Default::default()
                }
                .insert(&self.db)
                .await?
            }
        };
        Ok(model.id)
    }

    /// Point the row of a book whose old path vanished at `new_path`, so its
    /// progress follows the move. Returns the row id when one was relinked.
    #[tracing::instrument(level = "debug", skip(self, live_paths))]
    pub async fn relink_moved(
        &self,
        hash: &DocumentIdentity,
        new_path: &str,
        live_paths: &HashSet<String>,
    ) -> anyhow::Result<Option<i32>> {
        let candidates = document::Entity::find()
            .filter(document::Column::KoreaderHash.eq(hash.as_str()))
            .order_by_desc(document::Column::UpdatedAt)
            .order_by_desc(document::Column::Id)
            .all(&self.db)
            .await?;
        let Some(model) = candidates.into_iter().find(|d| !live_paths.contains(&d.path)) else {
            return Ok(None);
        };

        tracing::debug!(from = %model.path, "relinking moved document");
        let id = model.id;
        let mut active = model.into_active_model();
        active.path = Set(new_path.to_owned());
        active.updated_at = Set(Utc::now());
        active.update(&self.db).await?;
        Ok(Some(id))
    }

    /// Delete documents whose path is not in `live_paths`; their progress goes with them.
    #[tracing::instrument(level = "debug", skip_all)]
    pub async fn prune_documents(&self, live_paths: &HashSet<String>) -> anyhow::Result<u64> {
        let stale: Vec<i32> = document::Entity::find()
            .select_only()
            .column(document::Column::Id)
            .column(document::Column::Path)
            .into_tuple::<(i32, String)>()
            .all(&self.db)
            .await?
            .into_iter()
            .filter(|(_, path)| !live_paths.contains(path))
            .map(|(id, _)| id)
            .collect();

        let mut removed = 0;
        for ids in stale.chunks(DELETE_BATCH) {
            removed += document::Entity::delete_many()
                .filter(document::Column::Id.is_in(ids.iter().copied()))
                .exec(&self.db)
                .await?
                .rows_affected;
        }
        Ok(removed)
    }
}

#[async_trait::async_trait]
impl UserRepo for DbStore {
    async fn find_by_api_key(&self, api_key: &str) -> anyhow::Result<Option<UserRef>> {
        if api_key.is_empty() {
            return Ok(None);
        }
        let found = user::Entity::find()
            .filter(user::Column::ApiKey.eq(api_key))
            .one(&self.db)
            .await?;
        Ok(found.map(|u| UserRef {
            id: u.id,
            username: u.username,
        }))
    }
}

#[async_trait::async_trait]
impl DocumentRepo for DbStore {
    async fn find_by_hash(&self, hash: &DocumentIdentity) -> anyhow::Result<Option<DocumentRef>> {
        // Hashes are stored upper-case, DocumentIdentity is upper-case too.
        // Content matches win over file name matches, then the most recently scanned row.
        let found = document::Entity::find()
            .filter(
                Condition::any()
                    .add(document::Column::KoreaderHash.eq(hash.as_str()))
                    .add(document::Column::TitleHash.eq(hash.as_str())),
            )
            .order_by_desc(document::Column::KoreaderHash.eq(hash.as_str()))
            .order_by_desc(document::Column::UpdatedAt)
            .order_by_desc(document::Column::Id)
            .one(&self.db)
            .await?;
        Ok(found.map(|d| DocumentRef {
            id: d.id,
            path: d.path,
            pages: d.pages,
        }))
    }
}

#[async_trait::async_trait]
impl ProgressRepo for DbStore {
    async fn get(&self, document_id: i32, user_id: i32) -> anyhow::Result<Option<Progress>> {
        let found = reading_progress::Entity::find()
            .filter(reading_progress::Column::DocumentId.eq(document_id))
            .filter(reading_progress::Column::UserId.eq(user_id))
            .one(&self.db)
            .await?;
        Ok(found.map(|p| Progress {
            document_id: p.document_id,
            user_id: p.user_id,
            page_number: p.page_num,
            scroll_anchor: p.book_scroll_id,
        }))
    }

    async fn set(&self, progress: &Progress) -> anyhow::Result<()> {
        let active = reading_progress::ActiveModel {
            document_id: Set(progress.document_id),
            user_id: Set(progress.user_id),
            page_num: Set(progress.page_number),
            book_scroll_id: Set(progress.scroll_anchor.clone()),
            last_modified: Set(Utc::now()),
            ..Default::default()
        };
        reading_progress::Entity::insert(active)
            .on_conflict(
                OnConflict::columns([
                    reading_progress::Column::DocumentId,
                    reading_progress::Column::UserId,
                ])
                .update_columns([
                    reading_progress::Column::PageNum,
                    reading_progress::Column::BookScrollId,
                    reading_progress::Column::LastModified,
                ])
                .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl SettingsRepo for DbStore {
    async fn install_id(&self) -> anyhow::Result<String> {
        let key = server_setting::INSTALL_ID_KEY;
        if let Some(setting) = server_setting::Entity::find_by_id(key).one(&self.db).await? {
            return Ok(setting.value);
        }

        let generated = uuid::Uuid::new_v4().to_string();
        server_setting::Entity::insert(server_setting::ActiveModel {
            key: Set(key.to_owned()),
            value: Set(generated),
        })
        .on_conflict(
            OnConflict::column(server_setting::Column::Key)
                .do_nothing()
                .to_owned(),
        )
        .exec_without_returning(&self.db)
        .await?;

        // Re-read so a concurrent first start settles on one value
        let setting = server_setting::Entity::find_by_id(key)
            .one(&self.db)
            .await?
            .context("install id missing after insert")?;
        Ok(setting.value)
    }
}

#[cfg(test)]
pub(crate) async fn memory_store() -> DbStore {
    let mut opt = ConnectOptions::new("sqlite::memory:");
    opt.max_connections(1).sqlx_logging(false);
    DbStore::connect_with(opt).await.unwrap()
}

#[cfg(test)]
pub(crate) fn scanned(path: &str, hash: &DocumentIdentity, pages: Option<i32>) -> ScannedDocument {
    ScannedDocument {
        path: path.to_owned(),
        hash: hash.clone(),
        title_hash: "T1".into(),
        file_size: 10,
        file_modified: None,
        pages,
    }
}
