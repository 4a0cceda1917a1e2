//! sea-orm models for the sync bridge tables.

pub mod document;
pub mod reading_progress;
pub mod server_setting;
pub mod user;

pub mod prelude {
    pub use super::document::Entity as Document;
    pub use super::reading_progress::Entity as ReadingProgress;
    pub use super::server_setting::Entity as ServerSetting;
    pub use super::user::Entity as User;
}
