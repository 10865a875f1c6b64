use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use super::content::Branch;
use super::finding::{BranchState, Finding};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum VerdictStatus {
    Pass,
    Review,
    Fail,
    Error,
}

impl Display for VerdictStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            VerdictStatus::Pass => write!(f, "pass"),
            VerdictStatus::Review => write!(f, "review"),
            VerdictStatus::Fail => write!(f, "fail"),
            VerdictStatus::Error => write!(f, "error"),
        }
    }
}

impl FromStr for VerdictStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pass" => Ok(VerdictStatus::Pass),
            "review" => Ok(VerdictStatus::Review),
            "fail" => Ok(VerdictStatus::Fail),
            "error" => Ok(VerdictStatus::Error),
            _ => Err(anyhow::anyhow!("Invalid verdict status: {}", s)),
        }
    }
}

/// Final moderation decision for one content item.
///
/// `status` is derived only from the branch outcomes and the configured
/// thresholds, so the same inputs always re-derive the same verdict.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Verdict {
    pub content_id: String,
    pub per_branch_findings: BTreeMap<Branch, Vec<Finding>>,
    pub branch_states: BTreeMap<Branch, BranchState>,
    pub status: VerdictStatus,
    pub severity_flags: BTreeSet<String>,
    pub toxicity_flags: BTreeSet<String>,
    pub timestamp: DateTime<Utc>,
}

impl Verdict {
    /// Distinct labels found by a branch, sorted
    pub fn labels_for(&self, branch: Branch) -> Vec<String> {
        self.per_branch_findings
            .get(&branch)
            .map(|findings| {
                findings
                    .iter()
                    .map(|f| f.label.clone())
                    .collect::<BTreeSet<_>>()
                    .into_iter()
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn to_record(&self) -> VerdictRecord {
        VerdictRecord::from(self)
    }
}

/// Persisted verdict shape
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VerdictRecord {
    pub content_id: String,
    pub text_labels: Vec<String>,
    pub image_labels: Vec<String>,
    pub video_labels: Vec<String>,
    pub final_status: VerdictStatus,
    /// ISO-8601 / RFC 3339
    pub timestamp: String,
    #[serde(default)]
    pub severity_flags: Vec<String>,
    #[serde(default)]
    pub toxicity_flags: Vec<String>,
    #[serde(default)]
    pub branch_states: BTreeMap<Branch, BranchState>,
}

impl From<&Verdict> for VerdictRecord {
    fn from(verdict: &Verdict) -> Self {
        Self {
            content_id: verdict.content_id.clone(),
            text_labels: verdict.labels_for(Branch::Text),
            image_labels: verdict.labels_for(Branch::Image),
            video_labels: verdict.labels_for(Branch::Video),
            final_status: verdict.status,
            timestamp: verdict.timestamp.to_rfc3339(),
            severity_flags: verdict.severity_flags.iter().cloned().collect(),
            toxicity_flags: verdict.toxicity_flags.iter().cloned().collect(),
            branch_states: verdict.branch_states.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FindingCategory;
    use chrono::TimeZone;

    #[test]
    fn test_record_shape_matches_persisted_contract() {
        let mut per_branch = BTreeMap::new();
        per_branch.insert(
            Branch::Text,
            vec![
                Finding::new(Branch::Text, FindingCategory::Pii, "EMAIL", 0.99),
                Finding::new(Branch::Text, FindingCategory::Pii, "EMAIL", 0.91),
                Finding::new(Branch::Text, FindingCategory::Toxicity, "INSULT", 0.75),
            ],
        );
        let mut states = BTreeMap::new();
        states.insert(Branch::Text, BranchState::Success);

        let verdict = Verdict {
            content_id: "c-1".to_string(),
            per_branch_findings: per_branch,
            branch_states: states,
            status: VerdictStatus::Fail,
            severity_flags: BTreeSet::new(),
            toxicity_flags: ["INSULT".to_string()].into_iter().collect(),
            timestamp: Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap(),
        };

        let value = serde_json::to_value(verdict.to_record()).unwrap();
        assert_eq!(value["contentId"], "c-1");
        assert_eq!(value["textLabels"], serde_json::json!(["EMAIL", "INSULT"]));
        assert_eq!(value["imageLabels"], serde_json::json!([]));
        assert_eq!(value["videoLabels"], serde_json::json!([]));
        assert_eq!(value["finalStatus"], "fail");
        assert_eq!(value["timestamp"], "2026-01-02T03:04:05+00:00");
        assert_eq!(value["toxicityFlags"], serde_json::json!(["INSULT"]));
        assert_eq!(value["branchStates"]["text"], "success");
    }
}
