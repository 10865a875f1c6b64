//! HTTP error response body
//!
//! The `IntoResponse` impl for `AppError` lives in modera-api: the orphan rule
//! forbids implementing axum's trait for a modera-core type here.

use modera_core::{AppError, ErrorMetadata, VerdictRecord};
use serde::Serialize;

/// Standard error response format for HTTP APIs
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: &'static str,
    pub recoverable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_action: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
    /// Verdict computed before persistence failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verdict: Option<VerdictRecord>,
}

impl ErrorResponse {
    /// Build the body for `err`. Internal details are only attached outside
    /// production, and never for sensitive errors.
    pub fn from_app_error(err: &AppError, is_production: bool) -> Self {
        let expose = !is_production && !err.is_sensitive();
        Self {
            error: err.client_message(),
            code: err.error_code(),
            recoverable: err.is_recoverable(),
            suggested_action: err.suggested_action(),
            details: expose.then(|| err.detailed_message()),
            error_type: expose.then(|| err.error_type().to_string()),
            verdict: err.unpersisted_verdict().cloned(),
        }
    }
}
