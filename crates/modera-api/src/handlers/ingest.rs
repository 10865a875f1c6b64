//! Ingestion trigger
//!
//! Accepts either an S3 event notification or a list of direct items. Every
//! accepted item runs as its own background workflow.

use crate::error::{HttpAppError, ValidatedJson};
use crate::state::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use modera_core::{
    detect_content_type, new_content_id, validate_content_id, ContentItem, ContentType,
    ErrorMetadata, SourceLocation,
};
use percent_encoding::percent_decode_str;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Default, Deserialize)]
pub struct IngestRequest {
    #[serde(rename = "Records", default)]
    pub records: Vec<S3EventRecord>,
    #[serde(default)]
    pub items: Vec<IngestItem>,
}

#[derive(Debug, Deserialize)]
pub struct S3EventRecord {
    pub s3: S3Entity,
}

#[derive(Debug, Deserialize)]
pub struct S3Entity {
    pub bucket: S3Bucket,
    pub object: S3Object,
}

#[derive(Debug, Deserialize)]
pub struct S3Bucket {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct S3Object {
    pub key: String,
}

/// One content item named directly by the caller
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestItem {
    pub content_id: Option<String>,
    pub s3_bucket: String,
    pub s3_input_key: String,
    pub text: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptedItem {
    pub content_id: String,
    pub content_type: ContentType,
}

#[derive(Debug, Serialize)]
pub struct SkippedItem {
    pub key: String,
    pub reason: String,
}

#[derive(Debug, Default, Serialize)]
pub struct IngestResponse {
    pub accepted: Vec<AcceptedItem>,
    pub skipped: Vec<SkippedItem>,
}

#[tracing::instrument(
    skip(state, request),
    fields(records = request.records.len(), items = request.items.len())
)]
pub async fn ingest(
    State(state): State<Arc<AppState>>,
    ValidatedJson(request): ValidatedJson<IngestRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    let mut response = IngestResponse::default();

    let from_records = request.records.into_iter().map(|record| {
        let key = decode_s3_key(&record.s3.object.key);
        let content_id = content_id_from_key(&key).unwrap_or_else(new_content_id);
        (Ok(content_id), SourceLocation::new(record.s3.bucket.name, key), None)
    });
    let from_items = request.items.into_iter().map(|item| {
        let content_id = match item.content_id.filter(|id| !id.trim().is_empty()) {
            Some(id) => validate_content_id(&id).map(|()| id),
            None => Ok(new_content_id()),
        };
        (
            content_id,
            SourceLocation::new(item.s3_bucket, item.s3_input_key),
            item.text,
        )
    });

    for (content_id, source, text) in from_records.chain(from_items) {
        let content_id = match content_id {
            Ok(id) => id,
            Err(err) => {
                tracing::info!(key = %source.key, error = %err, "Rejected content id, skipping");
                response.skipped.push(SkippedItem {
                    key: source.key,
                    reason: err.client_message(),
                });
                continue;
            }
        };

        if source.bucket.trim().is_empty() || source.key.trim().is_empty() {
            response.skipped.push(SkippedItem {
                key: source.key,
                reason: "bucket and key are required".to_string(),
            });
            continue;
        }

        let content_type = detect_content_type(&source.key);
        if content_type == ContentType::Unknown {
            tracing::info!(key = %source.key, "Unknown content type, skipping");
            response.skipped.push(SkippedItem {
                key: source.key,
                reason: "unknown content type".to_string(),
            });
            continue;
        }

        let mut item = ContentItem::new(content_id.clone(), content_type, source);
        if let Some(text) = text {
            item = item.with_inline_text(text);
        }

        tracing::info!(
            content_id = %content_id,
            content_type = %content_type,
            key = %item.source.key,
            "Starting moderation workflow"
        );
        drop(state.dispatcher.spawn(item));

        response.accepted.push(AcceptedItem {
            content_id,
            content_type,
        });
    }

    Ok((StatusCode::ACCEPTED, Json(response)))
}

/// Object keys in S3 event notifications are form-encoded.
pub(crate) fn decode_s3_key(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    match percent_decode_str(&spaced).decode_utf8() {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => spaced,
    }
}

/// Keys issued by the upload endpoint start with `{content_id}/`.
pub(crate) fn content_id_from_key(key: &str) -> Option<String> {
    let (prefix, rest) = key.split_once('/')?;
    if rest.is_empty() {
        return None;
    }
    Uuid::parse_str(prefix).ok().map(|id| id.to_string())
}
