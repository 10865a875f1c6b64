use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};

use super::content::Branch;

/// What kind of signal a finding represents
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum FindingCategory {
    /// Personally identifiable information (entity type as label)
    Pii,
    /// Toxicity/hate/threat scoring on text
    Toxicity,
    /// Image or video moderation label
    Moderation,
}

/// A single labeled, confidence-scored classifier output
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Finding {
    pub source_branch: Branch,
    pub label: String,
    /// Always within [0, 1]
    pub confidence: f32,
    pub category: FindingCategory,
}

impl Finding {
    pub fn new(
        source_branch: Branch,
        category: FindingCategory,
        label: impl Into<String>,
        confidence: f32,
    ) -> Self {
        let confidence = if confidence.is_nan() {
            0.0
        } else {
            confidence.clamp(0.0, 1.0)
        };
        Self {
            source_branch,
            label: label.into(),
            confidence,
            category,
        }
    }

    /// Build a finding from a backend score on a 0..100 scale
    pub fn from_percent(
        source_branch: Branch,
        category: FindingCategory,
        label: impl Into<String>,
        percent: f32,
    ) -> Self {
        Self::new(source_branch, category, label, percent / 100.0)
    }

    pub fn is_pii(&self) -> bool {
        self.category == FindingCategory::Pii
    }
}

/// Why a branch could not produce findings
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Missing or invalid content (e.g. empty text)
    Input,
    /// Classifier call failed or was rate-limited past the retry budget
    Backend,
    /// Adapter missing or branch task crashed
    Internal,
}

impl Display for FailureKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            FailureKind::Input => write!(f, "input"),
            FailureKind::Backend => write!(f, "backend"),
            FailureKind::Internal => write!(f, "internal"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FailureReason {
    pub kind: FailureKind,
    pub message: String,
}

impl Display for FailureReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{} error: {}", self.kind, self.message)
    }
}

/// Terminal state of one dispatched branch
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Outcome {
    Success { findings: Vec<Finding> },
    Failed { reason: FailureReason },
    TimedOut,
}

impl Outcome {
    pub fn success(findings: Vec<Finding>) -> Self {
        Outcome::Success { findings }
    }

    pub fn failed(kind: FailureKind, message: impl Into<String>) -> Self {
        Outcome::Failed {
            reason: FailureReason {
                kind,
                message: message.into(),
            },
        }
    }

    pub fn input_error(message: impl Into<String>) -> Self {
        Self::failed(FailureKind::Input, message)
    }

    pub fn backend_error(message: impl Into<String>) -> Self {
        Self::failed(FailureKind::Backend, message)
    }

    pub fn state(&self) -> BranchState {
        match self {
            Outcome::Success { .. } => BranchState::Success,
            Outcome::Failed { .. } => BranchState::Failed,
            Outcome::TimedOut => BranchState::TimedOut,
        }
    }

    pub fn findings(&self) -> &[Finding] {
        match self {
            Outcome::Success { findings } => findings,
            _ => &[],
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success { .. })
    }
}

/// Lifecycle of a branch slot inside a workflow run
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BranchState {
    Pending,
    Success,
    Failed,
    TimedOut,
}

impl BranchState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, BranchState::Pending)
    }
}

impl Display for BranchState {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            BranchState::Pending => write!(f, "pending"),
            BranchState::Success => write!(f, "success"),
            BranchState::Failed => write!(f, "failed"),
            BranchState::TimedOut => write!(f, "timed_out"),
        }
    }
}
