use crate::{
    domain::models::UserRef,
    error::{SyncError, SyncResult},
    storage::UserRepo,
};

pub struct AuthService<'a> {
    pub users: &'a dyn UserRepo,
}

impl<'a> AuthService<'a> {
    pub fn new(users: &'a dyn UserRepo) -> Self {
        Self { users }
    }

    /// Resolve the access token embedded in the reader's sync URL.
    #[tracing::instrument(level = "debug", skip(self, api_key))]
    pub async fn resolve(&self, api_key: &str) -> SyncResult<UserRef> {
        match self.users.find_by_api_key(api_key).await? {
            Some(user) => Ok(user),
            None => {
                tracing::info!("rejected unknown access token");
                Err(SyncError::Unauthenticated)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::db::memory_store;

    #[tokio::test]
    async fn known_token_resolves() {
        let store = memory_store().await;
        store.ensure_user("reader", "secret").await.unwrap();

        let user = AuthService::new(&store).resolve("secret").await.unwrap();
        assert_eq!(user.username, "reader");
    }

    #[tokio::test]
    async fn unknown_token_is_unauthenticated() {
        let store = memory_store().await;
        let err = AuthService::new(&store).resolve("nope").await.unwrap_err();
        assert!(matches!(err, SyncError::Unauthenticated));
    }
}
