//! Decision Aggregator
//!
//! Reduces the per-branch outcomes of one workflow run to a single verdict.
//! The result depends only on the outcomes and the policy, never on the
//! order in which branches finished.

use chrono::{DateTime, Utc};
use modera_core::{
    AggregationConfig, Branch, BranchPolicy, BranchState, Finding, Outcome, Verdict, VerdictStatus,
};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Source of verdict timestamps
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AggregationPolicy {
    pub severe_threshold: f32,
    pub moderate_threshold: f32,
    /// Upper-cased for case-insensitive matching
    pub severe_labels: BTreeSet<String>,
    pub branch_policies: BTreeMap<Branch, BranchPolicy>,
}

impl Default for AggregationPolicy {
    fn default() -> Self {
        Self::from(&AggregationConfig::default())
    }
}

impl From<&AggregationConfig> for AggregationPolicy {
    fn from(config: &AggregationConfig) -> Self {
        Self {
            severe_threshold: config.severe_threshold,
            moderate_threshold: config.moderate_threshold,
            severe_labels: config
                .severe_labels
                .iter()
                .map(|label| label.to_uppercase())
                .collect(),
            branch_policies: Branch::ALL
                .iter()
                .map(|branch| (*branch, config.policy_for(*branch)))
                .collect(),
        }
    }
}

impl AggregationPolicy {
    pub fn with_branch_policy(mut self, branch: Branch, policy: BranchPolicy) -> Self {
        self.branch_policies.insert(branch, policy);
        self
    }

    pub fn policy_for(&self, branch: Branch) -> BranchPolicy {
        self.branch_policies
            .get(&branch)
            .copied()
            .unwrap_or(BranchPolicy::Tiered)
    }

    fn is_severe(&self, finding: &Finding) -> bool {
        finding.confidence >= self.severe_threshold
            && self.severe_labels.contains(&finding.label.to_uppercase())
    }
}

pub struct DecisionAggregator {
    policy: AggregationPolicy,
    clock: Arc<dyn Clock>,
}

impl DecisionAggregator {
    pub fn new(policy: AggregationPolicy) -> Self {
        Self::with_clock(policy, Arc::new(SystemClock))
    }

    pub fn with_clock(policy: AggregationPolicy, clock: Arc<dyn Clock>) -> Self {
        Self { policy, clock }
    }

    pub fn policy(&self) -> &AggregationPolicy {
        &self.policy
    }

    pub fn aggregate(&self, content_id: &str, outcomes: &BTreeMap<Branch, Outcome>) -> Verdict {
        self.aggregate_at(content_id, outcomes, self.clock.now())
    }

    pub fn aggregate_at(
        &self,
        content_id: &str,
        outcomes: &BTreeMap<Branch, Outcome>,
        timestamp: DateTime<Utc>,
    ) -> Verdict {
        let branch_states: BTreeMap<Branch, BranchState> = outcomes
            .iter()
            .map(|(branch, outcome)| (*branch, outcome.state()))
            .collect();

        let per_branch_findings: BTreeMap<Branch, Vec<Finding>> = outcomes
            .iter()
            .filter(|(_, outcome)| outcome.is_success())
            .map(|(branch, outcome)| (*branch, sorted(outcome.findings())))
            .collect();

        let all_findings = || per_branch_findings.values().flatten();
        let any_unsuccessful = outcomes.values().any(|outcome| !outcome.is_success());
        let has_findings = all_findings().next().is_some();

        let severity_flags: BTreeSet<String> = all_findings()
            .filter(|f| self.policy.is_severe(f))
            .map(|f| f.label.clone())
            .collect();

        let toxicity_flags: BTreeSet<String> = per_branch_findings
            .iter()
            .filter(|(branch, _)| self.policy.policy_for(**branch) == BranchPolicy::Tiered)
            .flat_map(|(_, findings)| findings.iter())
            .filter(|f| {
                !f.is_pii()
                    && f.confidence >= self.policy.moderate_threshold
                    && !severity_flags.contains(&f.label)
            })
            .map(|f| f.label.clone())
            .collect();

        let any_finding_hit = per_branch_findings.iter().any(|(branch, findings)| {
            self.policy.policy_for(*branch) == BranchPolicy::AnyFinding && !findings.is_empty()
        });
        let has_pii = all_findings().any(Finding::is_pii);

        let status = if outcomes.is_empty() || (any_unsuccessful && !has_findings) {
            VerdictStatus::Error
        } else if has_pii || !severity_flags.is_empty() || any_finding_hit {
            VerdictStatus::Fail
        } else if !toxicity_flags.is_empty() {
            VerdictStatus::Review
        } else if any_unsuccessful {
            VerdictStatus::Error
        } else {
            VerdictStatus::Pass
        };

        tracing::debug!(
            content_id = %content_id,
            status = %status,
            branches = outcomes.len(),
            severity_flags = severity_flags.len(),
            toxicity_flags = toxicity_flags.len(),
            "Verdict aggregated"
        );

        Verdict {
            content_id: content_id.to_string(),
            per_branch_findings,
            branch_states,
            status,
            severity_flags,
            toxicity_flags,
            timestamp,
        }
    }
}

/// Label ascending, then confidence descending, then category
fn sorted(findings: &[Finding]) -> Vec<Finding> {
    let mut findings = findings.to_vec();
    findings.sort_by(|a, b| {
        a.label
            .cmp(&b.label)
            .then_with(|| b.confidence.total_cmp(&a.confidence))
            .then_with(|| a.category.cmp(&b.category))
    });
    findings
}
