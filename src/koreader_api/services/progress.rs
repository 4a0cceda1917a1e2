use chrono::Utc;

use crate::{
    domain::{
        models::{DocumentIdentity, Progress},
        position::{DecodedPosition, decode_position, encode_position},
    },
    error::SyncResult,
    koreader_api::models::{ProgressDto, ProgressUpdateAckDto, ProgressUpdateRequestDto},
    storage::{DocumentRepo, ProgressRepo},
};

/// How this server presents itself to the reader.
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    /// Fixed label shown as the syncing device
    pub name: String,
    /// Stable per-installation identifier
    pub id: String,
}

pub struct ProgressSyncService<'a> {
    pub documents: &'a dyn DocumentRepo,
    pub progress: &'a dyn ProgressRepo,
    pub device: &'a DeviceInfo,
}

impl<'a> ProgressSyncService<'a> {
    pub fn new(
        documents: &'a dyn DocumentRepo,
        progress: &'a dyn ProgressRepo,
        device: &'a DeviceInfo,
    ) -> Self {
        Self {
            documents,
            progress,
            device,
        }
    }

    /// Merge the reader's position into the stored progress.
    ///
    /// Unknown documents are acknowledged without changes so the reader can
    /// sync books this server does not carry.
    #[tracing::instrument(level = "debug", skip(self, request), fields(document = %request.document))]
    pub async fn save_progress(
        &self,
        request: &ProgressUpdateRequestDto,
        user_id: i32,
    ) -> SyncResult<ProgressUpdateAckDto> {
        tracing::debug!(progress = %request.progress, percentage = ?request.percentage, "saving reader progress");
        let ack = ProgressUpdateAckDto {
            document: request.document.clone(),
            timestamp: Utc::now(),
        };

        let Some(hash) = DocumentIdentity::parse(&request.document) else {
            tracing::debug!("document hash is not a partial md5, ignoring");
            return Ok(ack);
        };
        let Some(document) = self.documents.find_by_hash(&hash).await? else {
            tracing::debug!("unknown document, nothing to update");
            return Ok(ack);
        };

        tracing::debug!(document_id = document.id, path = %document.path, "matched document");

        // Decode before touching the store: a bad fragment must not persist anything
        let decoded = decode_position(&request.progress)?;

        let mut progress = self
            .progress
            .get(document.id, user_id)
            .await?
            .unwrap_or_else(|| Progress::fresh(document.id, user_id));

        match decoded {
            DecodedPosition::Decoded {
                page_number,
                scroll_anchor,
            } => {
                progress.page_number = page_number;
                progress.scroll_anchor = scroll_anchor;
            }
            DecodedPosition::Skipped => {
                tracing::debug!("position string too short, keeping stored position");
            }
        }

        self.progress.set(&progress).await?;
        Ok(ack)
    }

    /// Stored progress for `document_hash`, translated for the reader.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn get_progress(&self, document_hash: &str, user_id: i32) -> SyncResult<ProgressDto> {
        let mut dto = ProgressDto {
            document: document_hash.to_string(),
            device: self.device.name.clone(),
            device_id: None,
            progress: None,
            percentage: None,
        };

        let Some(hash) = DocumentIdentity::parse(document_hash) else {
            return Ok(dto);
        };
        let Some(document) = self.documents.find_by_hash(&hash).await? else {
            tracing::debug!("unknown document, returning empty progress");
            return Ok(dto);
        };

        let Some(progress) = self.progress.get(document.id, user_id).await? else {
            dto.percentage = (document.pages > 0).then_some(0.0);
            return Ok(dto);
        };

        let position = encode_position(progress.page_number, progress.scroll_anchor.as_deref());
        tracing::debug!(%position, "reader progress");
        dto.progress = Some(position);
        dto.percentage = percentage(progress.page_number, document.pages);
        dto.device_id = Some(self.device.id.clone());
        Ok(dto)
    }
}

/// Fraction read counting the current page as read; `None` without a page count.
pub fn percentage(page_number: i32, total_pages: i32) -> Option<f64> {
    if total_pages <= 0 {
        return None;
    }
    let read = f64::from(page_number.max(0) + 1) / f64::from(total_pages);
    Some(read.min(1.0))
}
