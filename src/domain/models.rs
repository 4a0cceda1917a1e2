// Domain models shared by the reader-facing API and the stores

use std::fmt;

use chrono::{DateTime, Utc};

/// Partial-content fingerprint the reader uses to recognise a file.
///
/// Always 32 upper-case hex characters; lookups compare case-insensitively by
/// normalising through [`DocumentIdentity::parse`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocumentIdentity(String);

impl DocumentIdentity {
    pub const LEN: usize = 32;

    pub(crate) fn from_digest(digest: &[u8]) -> Self {
        Self(hex::encode_upper(digest))
    }

    /// Normalise a hash received on the wire. Empty or non-hex input has no identity.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.len() != Self::LEN || !raw.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        Some(Self(raw.to_ascii_uppercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRef {
    pub id: i32,
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentRef {
    pub id: i32,
    pub path: String,
    /// 0 when the page count is unknown
    pub pages: i32,
}

/// What a library scan learned about one book file
#[derive(Debug, Clone)]
pub struct ScannedDocument {
    pub path: String,
    pub hash: DocumentIdentity,
    pub title_hash: String,
    pub file_size: i64,
    /// Whole seconds, so it compares equal after a database round trip
    pub file_modified: Option<DateTime<Utc>>,
    /// `None` keeps whatever count is already stored
    pub pages: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Progress {
    pub document_id: i32,
    pub user_id: i32,
    /// Zero-based page the user last viewed
    pub page_number: i32,
    /// `None` means top of page
    pub scroll_anchor: Option<String>,
}

impl Progress {
    pub fn fresh(document_id: i32, user_id: i32) -> Self {
        Self {
            document_id,
            user_id,
            page_number: 0,
            scroll_anchor: None,
        }
    }
}
