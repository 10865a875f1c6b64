use crate::constants::DEFAULT_UPLOAD_CONTENT_TYPE;
use crate::error::{HttpAppError, ValidatedJson};
use crate::state::AppState;
use axum::{extract::State, response::IntoResponse, Json};
use chrono::{DateTime, Utc};
use modera_core::{new_content_id, AppError};
use modera_storage::keys::upload_key;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadUrlRequest {
    pub filename: Option<String>,
    pub content_type: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadUrlResponse {
    pub content_id: String,
    pub s3_key: String,
    pub upload_url: String,
    pub expires_at: DateTime<Utc>,
}

/// Issue a presigned PUT URL under a fresh content id.
#[tracing::instrument(skip(state, request), fields(operation = "create_upload_url"))]
pub async fn create_upload_url(
    State(state): State<Arc<AppState>>,
    ValidatedJson(request): ValidatedJson<UploadUrlRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    let filename = request
        .filename
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .ok_or_else(|| AppError::BadRequest("filename is required".to_string()))?;
    let content_type = request
        .content_type
        .as_deref()
        .filter(|ct| !ct.trim().is_empty())
        .unwrap_or(DEFAULT_UPLOAD_CONTENT_TYPE);

    let content_id = new_content_id();
    let s3_key = upload_key(&content_id, filename)?;

    let expires_in = Duration::from_secs(state.config.storage.url_expiration_secs);
    let uploads = state.storage.uploads().await?;
    let upload_url = uploads
        .presigned_put_url(&s3_key, content_type, expires_in)
        .await?;

    let expires_at = Utc::now()
        + chrono::Duration::seconds(state.config.storage.url_expiration_secs as i64);

    tracing::info!(
        content_id = %content_id,
        key = %s3_key,
        bucket = %uploads.bucket(),
        "Upload URL issued"
    );

    Ok(Json(UploadUrlResponse {
        content_id,
        s3_key,
        upload_url,
        expires_at,
    }))
}
