//! Text branch: PII detection plus toxicity scoring

use async_trait::async_trait;
use modera_core::{Branch, ContentItem, Finding, FindingCategory, Outcome};
use std::sync::Arc;

use crate::adapter::{retain_confident, AnalysisParams, BranchTask, ClassifierAdapter};
use crate::backend::{BackendError, ObjectReader, TextAnalysisBackend};

pub struct TextAdapter {
    backend: Arc<dyn TextAnalysisBackend>,
    reader: Arc<dyn ObjectReader>,
}

impl TextAdapter {
    pub fn new(backend: Arc<dyn TextAnalysisBackend>, reader: Arc<dyn ObjectReader>) -> Self {
        Self { backend, reader }
    }

    /// Inline text wins; otherwise the object is fetched and decoded as UTF-8.
    async fn load_text(
        &self,
        item: &ContentItem,
        params: &AnalysisParams,
    ) -> Result<String, BackendError> {
        let text = match &item.inline_text {
            Some(text) => text.clone(),
            None => {
                let reader = &self.reader;
                let source = &item.source;
                let bytes = params
                    .retry
                    .run("read_text_object", move || reader.read(source))
                    .await?;
                String::from_utf8(bytes).map_err(|_| {
                    BackendError::InvalidInput(format!("{} is not valid UTF-8", item.source.key))
                })?
            }
        };

        if text.trim().is_empty() {
            return Err(BackendError::InvalidInput("No text to moderate".to_string()));
        }
        Ok(text)
    }

    async fn run(&self, item: &ContentItem, params: &AnalysisParams) -> Result<Vec<Finding>, BackendError> {
        let text = self.load_text(item, params).await?;
        let backend = &self.backend;
        let text_ref = text.as_str();
        let language = params.language_code.as_str();

        let (pii, toxicity) = tokio::join!(
            params
                .retry
                .run("detect_pii", move || backend.detect_pii(text_ref, language)),
            params
                .retry
                .run("detect_toxicity", move || backend.detect_toxicity(text_ref, language)),
        );

        let mut findings: Vec<Finding> = pii?
            .into_iter()
            .map(|entity| Finding::new(Branch::Text, FindingCategory::Pii, entity.name, entity.score))
            .collect();
        findings.extend(toxicity?.into_iter().map(|label| {
            Finding::new(Branch::Text, FindingCategory::Toxicity, label.name, label.score)
        }));

        Ok(retain_confident(findings, params.min_confidence))
    }
}

#[async_trait]
impl ClassifierAdapter for TextAdapter {
    fn branch(&self) -> Branch {
        Branch::Text
    }

    #[tracing::instrument(skip(self, item, params), fields(content_id = %item.content_id, branch = "text"))]
    async fn analyze(&self, item: &ContentItem, params: &AnalysisParams) -> BranchTask {
        let outcome = match self.run(item, params).await {
            Ok(findings) => {
                tracing::info!(findings = findings.len(), "Text analysis completed");
                Outcome::success(findings)
            }
            Err(err) => {
                tracing::warn!(error = %err, "Text analysis failed");
                err.into_outcome()
            }
        };
        BranchTask::Immediate(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::ScoredLabel;
    use crate::test_helpers::{MockReader, MockTextBackend};
    use modera_core::{ContentType, FailureKind, SourceLocation};

    fn item(key: &str) -> ContentItem {
        ContentItem::new("c-1", ContentType::Text, SourceLocation::new("uploads", key))
    }

    async fn analyze(adapter: &TextAdapter, item: &ContentItem) -> Outcome {
        match adapter.analyze(item, &AnalysisParams::new(0.5)).await {
            BranchTask::Immediate(outcome) => outcome,
            BranchTask::Pollable(_) => panic!("text analysis must be immediate"),
        }
    }

    fn failure_kind(outcome: &Outcome) -> FailureKind {
        match outcome {
            Outcome::Failed { reason } => reason.kind,
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_reads_object_and_maps_findings() {
        let backend = Arc::new(MockTextBackend::new(
            vec![Ok(vec![ScoredLabel::new("EMAIL", 0.99)])],
            vec![Ok(vec![
                ScoredLabel::new("INSULT", 0.72),
                ScoredLabel::new("PROFANITY", 0.1),
            ])],
        ));
        let reader = Arc::new(MockReader::default().with_object("uploads", "c-1/a.txt", "mail me at x@y.z"));
        let adapter = TextAdapter::new(backend.clone(), reader);

        let outcome = analyze(&adapter, &item("c-1/a.txt")).await;
        let findings = outcome.findings();

        assert_eq!(findings.len(), 2);
        assert_eq!(findings[0].label, "EMAIL");
        assert_eq!(findings[0].category, FindingCategory::Pii);
        assert_eq!(findings[1].label, "INSULT");
        assert_eq!(findings[1].category, FindingCategory::Toxicity);
        assert_eq!(backend.seen_text.lock().unwrap()[0], "mail me at x@y.z");
    }

    #[tokio::test]
    async fn test_inline_text_skips_object_read() {
        let backend = Arc::new(MockTextBackend::clean());
        let adapter = TextAdapter::new(backend.clone(), Arc::new(MockReader::default()));

        let outcome = analyze(&adapter, &item("missing.txt").with_inline_text("hello there")).await;

        assert_eq!(outcome, Outcome::success(vec![]));
        assert_eq!(backend.seen_text.lock().unwrap()[0], "hello there");
    }

    #[tokio::test]
    async fn test_empty_text_is_input_failure() {
        let adapter = TextAdapter::new(
            Arc::new(MockTextBackend::clean()),
            Arc::new(MockReader::default().with_object("uploads", "blank.txt", "  \n\t")),
        );
        let outcome = analyze(&adapter, &item("blank.txt")).await;
        assert_eq!(failure_kind(&outcome), FailureKind::Input);
    }

    #[tokio::test]
    async fn test_missing_object_and_binary_content_are_input_failures() {
        let adapter = TextAdapter::new(
            Arc::new(MockTextBackend::clean()),
            Arc::new(MockReader::default().with_object("uploads", "bin.txt", vec![0xff, 0xfe, 0x00])),
        );
        assert_eq!(failure_kind(&analyze(&adapter, &item("nope.txt")).await), FailureKind::Input);
        assert_eq!(failure_kind(&analyze(&adapter, &item("bin.txt")).await), FailureKind::Input);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backend_failure_is_not_an_empty_result() {
        let adapter = TextAdapter::new(
            Arc::new(MockTextBackend::new(
                vec![Ok(vec![])],
                vec![Err(BackendError::Transient("throttled".to_string()))],
            )),
            Arc::new(MockReader::default()),
        );
        let outcome = analyze(&adapter, &item("a.txt").with_inline_text("hi")).await;
        assert_eq!(failure_kind(&outcome), FailureKind::Backend);
    }
}
