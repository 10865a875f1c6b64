//! AWS-backed classifier backends
//!
//! Comprehend serves the text branch; Rekognition serves image and video.
//! Clients are built once from a shared `SdkConfig`.

use async_trait::async_trait;
use aws_config::{BehaviorVersion, SdkConfig};
use aws_sdk_comprehend::types::{LanguageCode, TextSegment};
use aws_sdk_comprehend::Client as ComprehendClient;
use aws_sdk_rekognition::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_rekognition::types::{
    Image, S3Object, Video, VideoJobStatus as RekognitionJobStatus,
};
use aws_sdk_rekognition::Client as RekognitionClient;
use modera_core::SourceLocation;
use std::collections::HashMap;

use crate::backend::{
    BackendError, ImageModerationBackend, ScoredLabel, TextAnalysisBackend, VideoJobStatus,
    VideoModerationBackend,
};

/// Comprehend caps a single PII request at 100 KB of UTF-8
const PII_MAX_BYTES: usize = 100_000;
/// Toxicity requests take at most 10 segments of 1 KB each
const TOXICITY_SEGMENT_BYTES: usize = 1_000;
const TOXICITY_SEGMENTS_PER_REQUEST: usize = 10;

const TRANSIENT_CODES: &[&str] = &[
    "ThrottlingException",
    "TooManyRequestsException",
    "ProvisionedThroughputExceededException",
    "LimitExceededException",
    "InternalServerError",
    "InternalServerException",
    "ServiceUnavailableException",
    "RequestTimeout",
    "RequestTimeoutException",
];

const INPUT_CODES: &[&str] = &[
    "InvalidS3ObjectException",
    "InvalidImageFormatException",
    "ImageTooLargeException",
    "VideoTooLargeException",
    "TextSizeLimitExceededException",
    "UnsupportedLanguageException",
];

/// Load the shared AWS configuration, optionally pinning the region.
pub async fn load_sdk_config(region: Option<&str>) -> SdkConfig {
    let mut loader = aws_config::defaults(BehaviorVersion::latest());
    if let Some(region) = region {
        loader = loader.region(aws_config::Region::new(region.to_string()));
    }
    loader.load().await
}

fn is_transient_code(code: &str) -> bool {
    TRANSIENT_CODES.contains(&code)
}

fn is_input_code(code: &str) -> bool {
    INPUT_CODES.contains(&code)
}

/// Sort an SDK error into transient, permanent or bad-input.
fn classify_sdk_error<E, R>(operation: &str, err: SdkError<E, R>) -> BackendError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    let code = match &err {
        SdkError::ServiceError(ctx) => ctx.err().code().map(str::to_string),
        _ => None,
    };
    let message = format!("{} failed: {}", operation, DisplayErrorContext(&err));

    match (&err, code.as_deref()) {
        (SdkError::TimeoutError(_), _)
        | (SdkError::DispatchFailure(_), _)
        | (SdkError::ResponseError(_), _) => BackendError::Transient(message),
        (SdkError::ServiceError(_), Some(code)) if is_transient_code(code) => {
            BackendError::Transient(message)
        }
        (SdkError::ServiceError(_), Some(code)) if is_input_code(code) => {
            BackendError::InvalidInput(message)
        }
        _ => BackendError::Permanent(message),
    }
}

/// Split text into pieces of at most `max_bytes`, never inside a UTF-8 character.
fn chunk_text(text: &str, max_bytes: usize) -> Vec<&str> {
    let mut chunks = Vec::new();
    let mut rest = text;
    while !rest.is_empty() {
        if rest.len() <= max_bytes {
            chunks.push(rest);
            break;
        }
        let mut end = max_bytes;
        while end > 0 && !rest.is_char_boundary(end) {
            end -= 1;
        }
        if end == 0 {
            // a single character wider than max_bytes
            end = rest.chars().next().map(char::len_utf8).unwrap_or(rest.len());
        }
        let (head, tail) = rest.split_at(end);
        chunks.push(head);
        rest = tail;
    }
    chunks
}

/// Keep the highest score per label
fn merge_max(into: &mut HashMap<String, f32>, name: String, score: f32) {
    let entry = into.entry(name).or_insert(score);
    *entry = entry.max(score);
}

fn into_labels(scores: HashMap<String, f32>) -> Vec<ScoredLabel> {
    let mut labels: Vec<_> = scores
        .into_iter()
        .map(|(name, score)| ScoredLabel::new(name, score))
        .collect();
    labels.sort_by(|a, b| a.name.cmp(&b.name));
    labels
}

/// Comprehend text analysis backend
#[derive(Clone)]
pub struct ComprehendTextBackend {
    client: ComprehendClient,
}

impl ComprehendTextBackend {
    pub fn new(config: &SdkConfig) -> Self {
        Self {
            client: ComprehendClient::new(config),
        }
    }
}

#[async_trait]
impl TextAnalysisBackend for ComprehendTextBackend {
    async fn detect_pii(
        &self,
        text: &str,
        language_code: &str,
    ) -> Result<Vec<ScoredLabel>, BackendError> {
        let mut scores = HashMap::new();

        for chunk in chunk_text(text, PII_MAX_BYTES) {
            let response = self
                .client
                .detect_pii_entities()
                .text(chunk)
                .language_code(LanguageCode::from(language_code))
                .send()
                .await
                .map_err(|e| classify_sdk_error("DetectPiiEntities", e))?;

            for entity in response.entities() {
                if let Some(kind) = entity.r#type() {
                    merge_max(
                        &mut scores,
                        kind.as_str().to_string(),
                        entity.score().unwrap_or(0.0),
                    );
                }
            }
        }

        Ok(into_labels(scores))
    }

    async fn detect_toxicity(
        &self,
        text: &str,
        language_code: &str,
    ) -> Result<Vec<ScoredLabel>, BackendError> {
        let segments = chunk_text(text, TOXICITY_SEGMENT_BYTES);
        let mut scores = HashMap::new();

        for batch in segments.chunks(TOXICITY_SEGMENTS_PER_REQUEST) {
            let text_segments = batch
                .iter()
                .map(|segment| TextSegment::builder().text(*segment).build())
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| BackendError::Permanent(format!("Invalid text segment: {}", e)))?;

            let response = self
                .client
                .detect_toxic_content()
                .set_text_segments(Some(text_segments))
                .language_code(LanguageCode::from(language_code))
                .send()
                .await
                .map_err(|e| classify_sdk_error("DetectToxicContent", e))?;

            for result in response.result_list() {
                for label in result.labels() {
                    if let Some(name) = label.name() {
                        merge_max(
                            &mut scores,
                            name.as_str().to_string(),
                            label.score().unwrap_or(0.0),
                        );
                    }
                }
            }
        }

        Ok(into_labels(scores))
    }
}

/// Rekognition image moderation backend
#[derive(Clone)]
pub struct RekognitionImageBackend {
    client: RekognitionClient,
}

impl RekognitionImageBackend {
    pub fn new(config: &SdkConfig) -> Self {
        Self {
            client: RekognitionClient::new(config),
        }
    }
}

fn s3_object(source: &SourceLocation) -> S3Object {
    S3Object::builder()
        .bucket(&source.bucket)
        .name(&source.key)
        .build()
}

#[async_trait]
impl ImageModerationBackend for RekognitionImageBackend {
    async fn detect_moderation_labels(
        &self,
        source: &SourceLocation,
        min_confidence: f32,
    ) -> Result<Vec<ScoredLabel>, BackendError> {
        let image = Image::builder().s3_object(s3_object(source)).build();

        let response = self
            .client
            .detect_moderation_labels()
            .image(image)
            .min_confidence(min_confidence)
            .send()
            .await
            .map_err(|e| classify_sdk_error("DetectModerationLabels", e))?;

        Ok(response
            .moderation_labels()
            .iter()
            .filter_map(|label| {
                let name = label.name().filter(|n| !n.is_empty())?;
                Some(ScoredLabel::new(name, label.confidence().unwrap_or(0.0)))
            })
            .collect())
    }
}

/// Rekognition video moderation backend
#[derive(Clone)]
pub struct RekognitionVideoBackend {
    client: RekognitionClient,
}

impl RekognitionVideoBackend {
    pub fn new(config: &SdkConfig) -> Self {
        Self {
            client: RekognitionClient::new(config),
        }
    }
}

#[async_trait]
impl VideoModerationBackend for RekognitionVideoBackend {
    async fn start_moderation(
        &self,
        source: &SourceLocation,
        min_confidence: f32,
    ) -> Result<String, BackendError> {
        let video = Video::builder().s3_object(s3_object(source)).build();

        let response = self
            .client
            .start_content_moderation()
            .video(video)
            .min_confidence(min_confidence)
            .send()
            .await
            .map_err(|e| classify_sdk_error("StartContentModeration", e))?;

        response
            .job_id()
            .map(str::to_string)
            .ok_or_else(|| BackendError::Permanent("No job ID returned".to_string()))
    }

    async fn job_status(&self, job_id: &str) -> Result<VideoJobStatus, BackendError> {
        let mut labels = Vec::new();
        let mut next_token: Option<String> = None;

        loop {
            let response = self
                .client
                .get_content_moderation()
                .job_id(job_id)
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(|e| classify_sdk_error("GetContentModeration", e))?;

            match response.job_status() {
                Some(RekognitionJobStatus::InProgress) => return Ok(VideoJobStatus::InProgress),
                Some(RekognitionJobStatus::Failed) => {
                    let message = response
                        .status_message()
                        .unwrap_or("Moderation job failed")
                        .to_string();
                    return Ok(VideoJobStatus::Failed(message));
                }
                Some(RekognitionJobStatus::Succeeded) => {}
                other => {
                    return Err(BackendError::Transient(format!(
                        "Unexpected job status: {:?}",
                        other
                    )))
                }
            }

            labels.extend(response.moderation_labels().iter().filter_map(|detection| {
                let label = detection.moderation_label()?;
                let name = label.name().filter(|n| !n.is_empty())?;
                Some(ScoredLabel::new(name, label.confidence().unwrap_or(0.0)))
            }));

            match response.next_token() {
                Some(token) if !token.is_empty() => next_token = Some(token.to_string()),
                _ => break,
            }
        }

        Ok(VideoJobStatus::Succeeded(labels))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_text_respects_limit_and_boundaries() {
        assert_eq!(chunk_text("abcdef", 4), vec!["abcd", "ef"]);
        assert_eq!(chunk_text("abc", 10), vec!["abc"]);
        assert!(chunk_text("", 10).is_empty());

        // 'é' is two bytes; never split it
        let chunks = chunk_text("aéé", 2);
        assert_eq!(chunks, vec!["a", "é", "é"]);
        assert_eq!(chunks.concat(), "aéé");
    }

    #[test]
    fn test_error_code_classification() {
        assert!(is_transient_code("ThrottlingException"));
        assert!(is_transient_code("ProvisionedThroughputExceededException"));
        assert!(!is_transient_code("AccessDeniedException"));
        assert!(is_input_code("InvalidS3ObjectException"));
        assert!(!is_input_code("ThrottlingException"));
    }

    #[test]
    fn test_merge_max_keeps_highest() {
        let mut scores = HashMap::new();
        merge_max(&mut scores, "INSULT".to_string(), 0.4);
        merge_max(&mut scores, "INSULT".to_string(), 0.9);
        merge_max(&mut scores, "GRAPHIC".to_string(), 0.2);
        let labels = into_labels(scores);
        assert_eq!(
            labels,
            vec![ScoredLabel::new("GRAPHIC", 0.2), ScoredLabel::new("INSULT", 0.9)]
        );
    }
}
