use crate::error::HttpAppError;
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use modera_core::{validate_content_id, AppError};
use std::sync::Arc;

#[tracing::instrument(skip(state), fields(operation = "get_verdict"))]
pub async fn get_verdict(
    State(state): State<Arc<AppState>>,
    Path(content_id): Path<String>,
) -> Result<impl IntoResponse, HttpAppError> {
    validate_content_id(&content_id)?;

    let record = state
        .verdicts
        .get(&content_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Verdict for {} not found", content_id)))?;

    Ok(Json(record))
}
