//! HTTP error response conversion
//!
//! Handlers return `Result<impl IntoResponse, HttpAppError>` so every failure
//! renders with the same status mapping, body and log level.

use axum::{
    extract::rejection::JsonRejection,
    extract::{FromRequest, Request},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use modera_core::{AppError, ErrorMetadata, LogLevel};
use modera_infra::ErrorResponse;
use modera_storage::StorageError;
use modera_workflow::SinkError;
use serde::de::DeserializeOwned;

/// Wrapper so axum's `IntoResponse` can be implemented for `AppError`
#[derive(Debug)]
pub struct HttpAppError(pub AppError);

impl From<AppError> for HttpAppError {
    fn from(err: AppError) -> Self {
        HttpAppError(err)
    }
}

impl From<JsonRejection> for HttpAppError {
    fn from(rejection: JsonRejection) -> Self {
        HttpAppError(AppError::InvalidInput(format!(
            "Invalid request body: {}",
            rejection.body_text()
        )))
    }
}

impl From<StorageError> for HttpAppError {
    fn from(err: StorageError) -> Self {
        let app = match err {
            StorageError::NotFound(msg) => AppError::NotFound(msg),
            StorageError::InvalidKey(msg) => AppError::InvalidInput(msg),
            StorageError::UploadFailed(msg)
            | StorageError::DownloadFailed(msg)
            | StorageError::BackendError(msg) => AppError::Storage(msg),
            StorageError::IoError(err) => AppError::Internal(format!("IO error: {}", err)),
            StorageError::ConfigError(msg) => AppError::Internal(msg),
        };
        HttpAppError(app)
    }
}

impl From<SinkError> for HttpAppError {
    fn from(err: SinkError) -> Self {
        match err {
            SinkError::Storage(err) => HttpAppError::from(err),
            SinkError::Database(msg) => {
                HttpAppError(AppError::Internal(format!("Verdict store error: {}", msg)))
            }
            SinkError::Serialization(err) => HttpAppError(AppError::Internal(format!(
                "Stored verdict is unreadable: {}",
                err
            ))),
        }
    }
}

/// JSON extractor that rejects malformed bodies with our error shape
#[derive(Debug, Clone, Copy)]
pub struct ValidatedJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
{
    type Rejection = HttpAppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(inner) = Json::<T>::from_request(req, state)
            .await
            .map_err(HttpAppError::from)?;
        Ok(ValidatedJson(inner))
    }
}

fn log_error(error: &AppError) {
    let error_type = error.error_type();
    match error.log_level() {
        LogLevel::Debug => {
            tracing::debug!(error = %error, error_type = error_type, "Error occurred");
        }
        LogLevel::Warn => {
            tracing::warn!(error = %error, error_type = error_type, "Error occurred");
        }
        LogLevel::Error => {
            tracing::error!(error = %error.detailed_message(), error_type = error_type, "Error occurred");
        }
    }
}

fn is_production_env() -> bool {
    std::env::var("ENVIRONMENT")
        .or_else(|_| std::env::var("APP_ENV"))
        .map(|env| env.eq_ignore_ascii_case("production") || env.eq_ignore_ascii_case("prod"))
        .unwrap_or(false)
}

impl IntoResponse for HttpAppError {
    fn into_response(self) -> Response {
        let app_error = &self.0;

        let status = StatusCode::from_u16(app_error.http_status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        log_error(app_error);

        let body = ErrorResponse::from_app_error(app_error, is_production_env());
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_errors_map_to_http_taxonomy() {
        let not_found = HttpAppError::from(StorageError::NotFound("c-1.json".to_string()));
        assert_eq!(not_found.0.http_status_code(), 404);

        let bad_key = HttpAppError::from(StorageError::InvalidKey("..".to_string()));
        assert_eq!(bad_key.0.http_status_code(), 400);

        let presign = HttpAppError::from(StorageError::ConfigError(
            "Presigned URLs require the s3 backend".to_string(),
        ));
        assert_eq!(presign.0.error_code(), "INTERNAL_ERROR");
    }

    #[test]
    fn test_overloaded_renders_503() {
        let response = HttpAppError(AppError::Overloaded).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
