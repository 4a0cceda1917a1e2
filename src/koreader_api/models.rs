use chrono::{DateTime, Utc};
use poem_openapi::{ApiResponse, Object, payload::Json};

use crate::error::SyncError;

// ===== Reader-facing DTOs; field names are fixed by the sync plugin =====

/// Progress submitted by the reader
#[derive(Debug, Clone, Object)]
pub struct ProgressUpdateRequestDto {
    /// Partial MD5 of the document
    pub document: String,
    /// Reader position string, e.g. `/body/DocFragment[12]/body/div/a`
    pub progress: String,
    /// Reader-side fraction read, informational only
    pub percentage: Option<f64>,
    pub device: Option<String>,
    pub device_id: Option<String>,
}

#[derive(Debug, Clone, Object)]
pub struct ProgressUpdateAckDto {
    pub document: String,
    pub timestamp: DateTime<Utc>,
}

/// Stored progress translated for the reader
#[derive(Debug, Clone, Object, PartialEq)]
pub struct ProgressDto {
    pub document: String,
    pub device: String,
    #[oai(skip_serializing_if_is_none)]
    pub device_id: Option<String>,
    #[oai(skip_serializing_if_is_none)]
    pub progress: Option<String>,
    #[oai(skip_serializing_if_is_none)]
    pub percentage: Option<f64>,
}

#[derive(Debug, Clone, Object)]
pub struct UserAuthDto {
    pub username: String,
}

#[derive(Debug, Clone, Object)]
pub struct ErrorDto {
    /// Human-readable error message
    pub message: String,
}

impl From<String> for ErrorDto {
    fn from(message: String) -> Self {
        ErrorDto { message }
    }
}

#[derive(ApiResponse)]
pub enum AuthResponseDto {
    /// Token resolved to a user
    #[oai(status = 200)]
    Ok(Json<UserAuthDto>),

    #[oai(status = 401)]
    Unauthorized(Json<ErrorDto>),

    #[oai(status = 500)]
    InternalServerError(Json<ErrorDto>),
}

#[derive(ApiResponse)]
pub enum ProgressPutResponseDto {
    /// Progress accepted, including for documents the server does not know
    #[oai(status = 200)]
    Ok(Json<ProgressUpdateAckDto>),

    /// Position string carries a non-numeric fragment index
    #[oai(status = 400)]
    BadRequest(Json<ErrorDto>),

    #[oai(status = 401)]
    Unauthorized(Json<ErrorDto>),

    #[oai(status = 500)]
    InternalServerError(Json<ErrorDto>),
}

#[derive(ApiResponse)]
pub enum ProgressGetResponseDto {
    /// Progress, possibly empty when the document or record is unknown
    #[oai(status = 200)]
    Ok(Json<ProgressDto>),

    #[oai(status = 401)]
    Unauthorized(Json<ErrorDto>),

    #[oai(status = 500)]
    InternalServerError(Json<ErrorDto>),
}

fn store_failure(e: &SyncError) -> Json<ErrorDto> {
    tracing::error!(error = %e, "sync request failed");
    Json("internal error".to_string().into())
}

impl From<SyncError> for AuthResponseDto {
    fn from(e: SyncError) -> Self {
        match e {
            SyncError::Unauthenticated => AuthResponseDto::Unauthorized(Json(e.to_string().into())),
            _ => AuthResponseDto::InternalServerError(store_failure(&e)),
        }
    }
}

impl From<SyncError> for ProgressPutResponseDto {
    fn from(e: SyncError) -> Self {
        match e {
            SyncError::Unauthenticated => {
                ProgressPutResponseDto::Unauthorized(Json(e.to_string().into()))
            }
            SyncError::UnparsablePageFragment { .. } => {
                ProgressPutResponseDto::BadRequest(Json(e.to_string().into()))
            }
            SyncError::Store(_) => ProgressPutResponseDto::InternalServerError(store_failure(&e)),
        }
    }
}

impl From<SyncError> for ProgressGetResponseDto {
    fn from(e: SyncError) -> Self {
        match e {
            SyncError::Unauthenticated => {
                ProgressGetResponseDto::Unauthorized(Json(e.to_string().into()))
            }
            _ => ProgressGetResponseDto::InternalServerError(store_failure(&e)),
        }
    }
}
