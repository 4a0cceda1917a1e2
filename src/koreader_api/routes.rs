use std::sync::Arc;

use poem_openapi::{OpenApi, param::Path, payload::Json};

use super::models::{
    AuthResponseDto, ProgressGetResponseDto, ProgressPutResponseDto, ProgressUpdateRequestDto,
    UserAuthDto,
};
use super::services::{
    auth::AuthService,
    progress::{DeviceInfo, ProgressSyncService},
};
use crate::storage::DbStore;

/// Endpoints of the reader's progress sync plugin.
///
/// The reader cannot keep sessions, so the access token travels as the first
/// path segment of every request.
pub struct KoreaderApi {
    pub store: Arc<DbStore>,
    pub device: Arc<DeviceInfo>,
}

#[OpenApi]
impl KoreaderApi {
    /// Identify the user behind an access token
    #[oai(path = "/:api_key/users/auth", method = "get")]
    #[tracing::instrument(level = "debug", skip(self, api_key))]
    async fn authenticate(&self, api_key: Path<String>) -> AuthResponseDto {
        match AuthService::new(self.store.as_ref()).resolve(&api_key.0).await {
            Ok(user) => AuthResponseDto::Ok(Json(UserAuthDto {
                username: user.username,
            })),
            Err(e) => e.into(),
        }
    }

    /// Submit the reader's current position
    #[oai(path = "/:api_key/syncs/progress", method = "put")]
    #[tracing::instrument(level = "debug", skip(self, api_key, body))]
    async fn update_progress(
        &self,
        api_key: Path<String>,
        body: Json<ProgressUpdateRequestDto>,
    ) -> ProgressPutResponseDto {
        let user = match AuthService::new(self.store.as_ref()).resolve(&api_key.0).await {
            Ok(user) => user,
            Err(e) => return e.into(),
        };
        let store = self.store.as_ref();
        match ProgressSyncService::new(store, store, &self.device)
            .save_progress(&body.0, user.id)
            .await
        {
            Ok(ack) => ProgressPutResponseDto::Ok(Json(ack)),
            Err(e) => e.into(),
        }
    }

    /// Fetch the stored position for a document hash
    #[oai(path = "/:api_key/syncs/progress/:document", method = "get")]
    #[tracing::instrument(level = "debug", skip(self, api_key, document))]
    async fn get_progress(
        &self,
        api_key: Path<String>,
        document: Path<String>,
    ) -> ProgressGetResponseDto {
        let user = match AuthService::new(self.store.as_ref()).resolve(&api_key.0).await {
            Ok(user) => user,
            Err(e) => return e.into(),
        };
        tracing::debug!(document = %document.0, user = %user.username, "handling get_progress");
        let store = self.store.as_ref();
        match ProgressSyncService::new(store, store, &self.device)
            .get_progress(&document.0, user.id)
            .await
        {
            Ok(dto) => ProgressGetResponseDto::Ok(Json(dto)),
            Err(e) => e.into(),
        }
    }
}
