use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use uuid::Uuid;

use crate::error::AppError;

pub const MAX_CONTENT_ID_LEN: usize = 128;

/// Fresh content id for a submission that arrived without one
pub fn new_content_id() -> String {
    Uuid::new_v4().to_string()
}

/// Accept a caller-supplied content id.
///
/// The id becomes a single storage key segment (`{content_id}.json`,
/// `{content_id}/{filename}`), so separators, `..` and control characters
/// are refused.
pub fn validate_content_id(content_id: &str) -> Result<(), AppError> {
    let valid = !content_id.trim().is_empty()
        && content_id.len() <= MAX_CONTENT_ID_LEN
        && !content_id.contains(['/', '\\'])
        && !content_id.contains("..")
        && !content_id.chars().any(char::is_control);

    if valid {
        Ok(())
    } else {
        Err(AppError::InvalidInput(format!(
            "Invalid content id: {}",
            content_id
        )))
    }
}

/// Media type of an inbound artifact, as detected from its key
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Text,
    Image,
    Video,
    Unknown,
}

impl ContentType {
    /// Analysis branches required for this content type.
    ///
    /// Unknown content dispatches nothing and is dropped by the workflow.
    pub fn branches(self) -> Vec<Branch> {
        match self {
            ContentType::Text => vec![Branch::Text],
            ContentType::Image => vec![Branch::Image],
            ContentType::Video => vec![Branch::Video],
            ContentType::Unknown => Vec::new(),
        }
    }
}

impl Display for ContentType {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            ContentType::Text => write!(f, "text"),
            ContentType::Image => write!(f, "image"),
            ContentType::Video => write!(f, "video"),
            ContentType::Unknown => write!(f, "unknown"),
        }
    }
}

impl FromStr for ContentType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(ContentType::Text),
            "image" => Ok(ContentType::Image),
            "video" => Ok(ContentType::Video),
            "unknown" => Ok(ContentType::Unknown),
            _ => Err(anyhow::anyhow!("Invalid content type: {}", s)),
        }
    }
}

/// One modality-specific analysis path within a workflow run.
///
/// The derived ordering (text < image < video) is what every per-branch map
/// iterates in, which keeps verdicts independent of completion order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Branch {
    Text,
    Image,
    Video,
}

impl Branch {
    pub const ALL: [Branch; 3] = [Branch::Text, Branch::Image, Branch::Video];

    pub fn as_str(&self) -> &'static str {
        match self {
            Branch::Text => "text",
            Branch::Image => "image",
            Branch::Video => "video",
        }
    }
}

impl Display for Branch {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

impl FromStr for Branch {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(Branch::Text),
            "image" => Ok(Branch::Image),
            "video" => Ok(Branch::Video),
            _ => Err(anyhow::anyhow!("Invalid branch: {}", s)),
        }
    }
}

/// Where the raw bytes of a content item live
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SourceLocation {
    #[serde(rename = "s3Bucket")]
    pub bucket: String,
    #[serde(rename = "s3InputKey")]
    pub key: String,
}

impl SourceLocation {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }

    pub fn s3_uri(&self) -> String {
        format!("s3://{}/{}", self.bucket, self.key)
    }
}

/// A submission under moderation. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ContentItem {
    pub content_id: String,
    pub content_type: ContentType,
    #[serde(flatten)]
    pub source: SourceLocation,
    /// Text supplied directly with the request instead of stored in the bucket
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "text")]
    pub inline_text: Option<String>,
}

impl ContentItem {
    pub fn new(
        content_id: impl Into<String>,
        content_type: ContentType,
        source: SourceLocation,
    ) -> Self {
        Self {
            content_id: content_id.into(),
            content_type,
            source,
            inline_text: None,
        }
    }

    pub fn with_inline_text(mut self, text: impl Into<String>) -> Self {
        self.inline_text = Some(text.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_content_id() {
        assert!(validate_content_id("c-1").is_ok());
        assert!(validate_content_id(&new_content_id()).is_ok());
        assert!(validate_content_id("report_2026.v2").is_ok());

        for bad in ["", "  ", "a/b", "a\\b", "..", "x..y", "tab\there"] {
            assert!(
                matches!(validate_content_id(bad), Err(AppError::InvalidInput(_))),
                "{:?} should be rejected",
                bad
            );
        }
        assert!(validate_content_id(&"a".repeat(MAX_CONTENT_ID_LEN)).is_ok());
        assert!(validate_content_id(&"a".repeat(MAX_CONTENT_ID_LEN + 1)).is_err());
    }

    #[test]
    fn test_branches_for_content_type() {
        assert_eq!(ContentType::Text.branches(), vec![Branch::Text]);
        assert_eq!(ContentType::Image.branches(), vec![Branch::Image]);
        assert_eq!(ContentType::Video.branches(), vec![Branch::Video]);
        assert!(ContentType::Unknown.branches().is_empty());
    }

    #[test]
    fn test_branch_ordering_is_stable() {
        let mut branches = vec![Branch::Video, Branch::Text, Branch::Image];
        branches.sort();
        assert_eq!(branches, Branch::ALL.to_vec());
    }

    #[test]
    fn test_new_content_id_is_uuid() {
        let id = new_content_id();
        assert!(Uuid::parse_str(&id).is_ok());
        assert_ne!(id, new_content_id());
    }

    #[test]
    fn test_content_item_wire_shape() {
        let item = ContentItem::new(
            "abc",
            ContentType::Image,
            SourceLocation::new("uploads", "abc/cat.png"),
        );
        let value = serde_json::to_value(&item).unwrap();
        assert_eq!(value["contentId"], "abc");
        assert_eq!(value["contentType"], "image");
        assert_eq!(value["s3Bucket"], "uploads");
        assert_eq!(value["s3InputKey"], "abc/cat.png");
        assert!(value.get("text").is_none());
    }
}
