use thiserror::Error;

/// Request-scoped failures of a sync exchange.
///
/// Unknown documents and undecodable positions are deliberately absent: the
/// reader must be able to sync books the server does not know.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("access token does not resolve to a user")]
    Unauthenticated,

    #[error("unparsable page fragment: {fragment}")]
    UnparsablePageFragment { fragment: String },

    #[error("store error: {0}")]
    Store(#[from] anyhow::Error),
}

pub type SyncResult<T> = Result<T, SyncError>;
