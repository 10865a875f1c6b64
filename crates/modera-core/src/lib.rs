//! Modera Core Library
//!
//! Domain models, error types, configuration and content type detection
//! shared by every Modera component.

pub mod config;
pub mod detect;
pub mod error;
pub mod models;

// Re-export commonly used types
pub use config::{
    AggregationConfig, BranchPolicy, ClassifierConfig, Config, DatabaseConfig, ServerConfig,
    StorageBackend, StorageConfig, WorkflowConfig,
};
pub use detect::detect_content_type;
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use models::{
    new_content_id, validate_content_id, Branch, BranchState, ContentItem, ContentType,
    FailureKind, FailureReason, Finding, FindingCategory, Outcome, SourceLocation, Verdict,
    VerdictRecord, VerdictStatus, MAX_CONTENT_ID_LEN,
};
