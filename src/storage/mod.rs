// Persistence seams; the sync flow only sees these traits

pub mod db;

use crate::domain::models::{DocumentIdentity, DocumentRef, Progress, UserRef};

pub use db::DbStore;

#[async_trait::async_trait]
pub trait UserRepo: Send + Sync {
    async fn find_by_api_key(&self, api_key: &str) -> anyhow::Result<Option<UserRef>>;
}

#[async_trait::async_trait]
pub trait DocumentRepo: Send + Sync {
    async fn find_by_hash(&self, hash: &DocumentIdentity) -> anyhow::Result<Option<DocumentRef>>;
}

#[async_trait::async_trait]
pub trait ProgressRepo: Send + Sync {
    async fn get(&self, document_id: i32, user_id: i32) -> anyhow::Result<Option<Progress>>;
    /// Last write wins per (document, user)
    async fn set(&self, progress: &Progress) -> anyhow::Result<()>;
}

#[async_trait::async_trait]
pub trait SettingsRepo: Send + Sync {
    async fn install_id(&self) -> anyhow::Result<String>; // created on first use
}
