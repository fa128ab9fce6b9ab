use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// How bad a flagged issue is
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueSeverity {
    #[default]
    Minor,
    Moderate,
    Critical,
}

/// Kind of problem a directive addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueType {
    LogicalInconsistency,
    PacingIssue,
    SuspenseDrop,
    LayerLeak,
    CharacterImplausibility,
    TropeOveruse,
    RedHerringTransparent,
}

impl IssueType {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueType::LogicalInconsistency => "logical_inconsistency",
            IssueType::PacingIssue => "pacing_issue",
            IssueType::SuspenseDrop => "suspense_drop",
            IssueType::LayerLeak => "layer_leak",
            IssueType::CharacterImplausibility => "character_implausibility",
            IssueType::TropeOveruse => "trope_overuse",
            IssueType::RedHerringTransparent => "red_herring_transparent",
        }
    }
}

/// A reader's guess at the culprit at one checkpoint
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CriminalPrediction {
    #[serde(default)]
    pub prediction: String,
    #[serde(default)]
    pub confidence: String,
    #[serde(default)]
    pub reasoning: String,
}

/// Something a reader found wrong with a plot point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InconsistencyFlag {
    #[serde(default)]
    pub plot_point: usize,
    #[serde(default = "unknown_issue")]
    pub issue: String,
    #[serde(default)]
    pub severity: IssueSeverity,
}

fn unknown_issue() -> String {
    "Unknown".to_string()
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EngagementAssessment {
    #[serde(default)]
    pub most_engaging: Vec<usize>,
    #[serde(default)]
    pub least_engaging: Vec<usize>,
    #[serde(default)]
    pub comments: String,
}

/// One simulated reader's verdict on a story
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReaderEvaluation {
    pub reader_role: String,
    /// Plot point index to suspense score (1-10)
    #[serde(default)]
    pub suspense_scores: BTreeMap<usize, f64>,
    /// Checkpoint index to prediction
    #[serde(default)]
    pub criminal_predictions: BTreeMap<usize, CriminalPrediction>,
    #[serde(default)]
    pub inconsistency_flags: Vec<InconsistencyFlag>,
    #[serde(default)]
    pub engagement_assessment: EngagementAssessment,
    #[serde(default)]
    pub overall_score: f64,
}

/// What to fix, where, and how urgently
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevisionDirective {
    /// Plot point indices
    pub target_plot_points: Vec<usize>,
    pub issue_type: IssueType,
    pub severity: IssueSeverity,
    pub description: String,
    pub suggested_revision: String,
    /// Number of readers that agree
    pub consensus_count: usize,
    #[serde(default)]
    pub priority: f64,
}

impl RevisionDirective {
    pub fn new(
        target_plot_points: Vec<usize>,
        issue_type: IssueType,
        severity: IssueSeverity,
        description: impl Into<String>,
        suggested_revision: impl Into<String>,
        consensus_count: usize,
    ) -> Self {
        Self {
            target_plot_points,
            issue_type,
            severity,
            description: description.into(),
            suggested_revision: suggested_revision.into(),
            consensus_count,
            priority: 0.0,
        }
    }

    pub fn targets(&self, index: usize) -> bool {
        self.target_plot_points.contains(&index)
    }
}
