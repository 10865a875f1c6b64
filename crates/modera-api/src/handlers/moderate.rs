use crate::error::{HttpAppError, ValidatedJson};
use crate::state::AppState;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use modera_core::{
    detect_content_type, new_content_id, validate_content_id, AppError, ContentItem, ContentType,
    SourceLocation,
};
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModerateRequest {
    pub content_id: Option<String>,
    pub s3_bucket: String,
    pub s3_input_key: String,
    /// Inline text; when set the text branch does not read the object
    pub text: Option<String>,
}

impl ModerateRequest {
    fn into_item(self) -> Result<ContentItem, AppError> {
        if self.s3_bucket.trim().is_empty() || self.s3_input_key.trim().is_empty() {
            return Err(AppError::InvalidInput(
                "s3Bucket and s3InputKey are required".to_string(),
            ));
        }

        let content_type = match detect_content_type(&self.s3_input_key) {
            ContentType::Unknown if self.text.is_some() => ContentType::Text,
            detected => detected,
        };
        let content_id = match self.content_id.filter(|id| !id.trim().is_empty()) {
            Some(id) => {
                validate_content_id(&id)?;
                id
            }
            None => new_content_id(),
        };

        let item = ContentItem::new(
            content_id,
            content_type,
            SourceLocation::new(self.s3_bucket, self.s3_input_key),
        );
        Ok(match self.text {
            Some(text) => item.with_inline_text(text),
            None => item,
        })
    }
}

/// Run one workflow to completion and return its verdict record.
///
/// Unknown content types produce no verdict: 204.
#[tracing::instrument(skip(state, request), fields(operation = "moderate"))]
pub async fn moderate(
    State(state): State<Arc<AppState>>,
    ValidatedJson(request): ValidatedJson<ModerateRequest>,
) -> Result<Response, HttpAppError> {
    let item = request.into_item()?;
    let run = state.dispatcher.run_now(item).await?;

    Ok(match run.verdict {
        Some(verdict) => Json(verdict.to_record()).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    })
}
