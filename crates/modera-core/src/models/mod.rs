//! Domain models shared by every stage of the moderation workflow

pub mod content;
pub mod finding;
pub mod verdict;

pub use content::{
    new_content_id, validate_content_id, Branch, ContentItem, ContentType, SourceLocation,
    MAX_CONTENT_ID_LEN,
};
pub use finding::{BranchState, FailureKind, FailureReason, Finding, FindingCategory, Outcome};
pub use verdict::{Verdict, VerdictRecord, VerdictStatus};
