//! Content type detection from object keys

use crate::models::ContentType;

const TEXT_EXTENSIONS: &[&str] = &[".txt", ".md", ".csv"];
const IMAGE_EXTENSIONS: &[&str] = &[".jpg", ".jpeg", ".png", ".gif"];
const VIDEO_EXTENSIONS: &[&str] = &[".mp4", ".mov", ".avi", ".mkv"];

/// Classify an object key by its extension. Case-insensitive; anything
/// unmatched is `Unknown`.
pub fn detect_content_type(key: &str) -> ContentType {
    let key = key.to_lowercase();
    let has_suffix = |suffixes: &[&str]| suffixes.iter().any(|s| key.ends_with(s));

    if has_suffix(TEXT_EXTENSIONS) {
        ContentType::Text
    } else if has_suffix(IMAGE_EXTENSIONS) {
        ContentType::Image
    } else if has_suffix(VIDEO_EXTENSIONS) {
        ContentType::Video
    } else {
        ContentType::Unknown
    }
}
