//! Reader feedback aggregation.
//!
//! Turns a set of reader evaluations into a prioritized list of revision
//! directives for the revision pass.

mod types;

pub use types::*;

use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

use crate::config::RefinementConfig;
use crate::facts::CrimeFacts;
use crate::state::PlotPoint;

/// Plot points before a leaking checkpoint that get revised with it.
const LEAK_LOOKBACK: usize = 3;
/// Middle-third spread below which suspense counts as flat.
const FLAT_MIDDLE_SPREAD: f64 = 1.5;
/// Point-to-point fall that counts as a sharp drop.
const SUSPENSE_DROP: f64 = 2.0;
/// Average reader suspense below which the whole story is flagged.
const LOW_SUSPENSE_AVERAGE: f64 = 4.0;

/// Aggregates reader feedback into revision directives.
#[derive(Debug, Clone)]
pub struct FeedbackAggregator {
    config: RefinementConfig,
}

impl FeedbackAggregator {
    pub fn new(config: RefinementConfig) -> Self {
        Self { config }
    }

    /// All directives, highest priority first.
    pub fn aggregate(
        &self,
        evaluations: &[ReaderEvaluation],
        plot_points: &[PlotPoint],
        crime: Option<&CrimeFacts>,
    ) -> Vec<RevisionDirective> {
        if evaluations.is_empty() {
            return Vec::new();
        }

        let mut directives = Vec::new();
        if let Some(crime) = crime {
            directives.extend(self.layer_leaks(evaluations, crime));
        }
        directives.extend(self.inconsistencies(evaluations));
        directives.extend(self.suspense_issues(evaluations));
        directives.extend(self.engagement_issues(evaluations, plot_points.len()));

        for directive in &mut directives {
            directive.priority = self.priority(directive);
        }
        directives.sort_by(|a, b| b.priority.total_cmp(&a.priority));

        info!(
            readers = evaluations.len(),
            directives = directives.len(),
            critical = directives.iter().filter(|d| d.severity == IssueSeverity::Critical).count(),
            "Feedback aggregated"
        );
        directives
    }

    /// Any reader naming the real criminal is a critical leak.
    fn layer_leaks(&self, evaluations: &[ReaderEvaluation], crime: &CrimeFacts) -> Vec<RevisionDirective> {
        let criminal = crime.criminal.name.trim().to_lowercase();
        let mut leaks: BTreeMap<usize, Vec<&str>> = BTreeMap::new();

        for evaluation in evaluations {
            for (checkpoint, prediction) in &evaluation.criminal_predictions {
                if prediction.prediction.trim().to_lowercase() == criminal {
                    leaks.entry(*checkpoint).or_default().push(&evaluation.reader_role);
                }
            }
        }

        leaks
            .into_iter()
            .map(|(checkpoint, readers)| {
                debug!(checkpoint, readers = ?readers, "Layer leak");
                RevisionDirective::new(
                    (checkpoint.saturating_sub(LEAK_LOOKBACK)..=checkpoint).collect(),
                    IssueType::LayerLeak,
                    IssueSeverity::Critical,
                    format!("Reader(s) correctly identified real criminal at checkpoint {}", checkpoint),
                    "Strengthen fabricated narrative, add more misdirection, or reduce clues pointing to real criminal",
                    readers.len(),
                )
            })
            .collect()
    }

    /// Flags grouped per plot point; kept on consensus or when critical.
    fn inconsistencies(&self, evaluations: &[ReaderEvaluation]) -> Vec<RevisionDirective> {
        let mut by_point: BTreeMap<usize, Vec<(&str, &InconsistencyFlag)>> = BTreeMap::new();
        for evaluation in evaluations {
            for flag in &evaluation.inconsistency_flags {
                by_point
                    .entry(flag.plot_point)
                    .or_default()
                    .push((evaluation.reader_role.as_str(), flag));
            }
        }

        let mut directives = Vec::new();
        for (point, flags) in by_point {
            let consensus = flags.iter().map(|(reader, _)| *reader).collect::<BTreeSet<_>>().len();
            let severity = flags
                .iter()
                .map(|(_, f)| f.severity)
                .max()
                .unwrap_or_default();
            if consensus < self.config.consensus_threshold && severity != IssueSeverity::Critical {
                continue;
            }

            let issues: Vec<&str> = flags.iter().map(|(_, f)| f.issue.as_str()).collect();
            let issue_type = classify_issue(&issues.join(" "));
            directives.push(RevisionDirective::new(
                vec![point],
                issue_type,
                severity,
                issues.join("; "),
                format!("Address the {} at plot point {}", issue_type.as_str(), point),
                consensus,
            ));
        }
        directives
    }

    /// Flat middle, sharp drops and a low average on the mean reader curve.
    fn suspense_issues(&self, evaluations: &[ReaderEvaluation]) -> Vec<RevisionDirective> {
        let mut all_scores: BTreeMap<usize, Vec<f64>> = BTreeMap::new();
        for evaluation in evaluations {
            for (point, score) in &evaluation.suspense_scores {
                all_scores.entry(*point).or_default().push(*score);
            }
        }
        let curve: Vec<f64> = all_scores
            .values()
            .map(|s| s.iter().sum::<f64>() / s.len() as f64)
            .collect();
        if curve.is_empty() {
            return Vec::new();
        }

        let readers = evaluations.len();
        let mut directives = Vec::new();

        if curve.len() >= 6 {
            let (start, end) = (curve.len() / 3, 2 * curve.len() / 3);
            let middle = &curve[start..end];
            let spread = max_of(middle) - min_of(middle);
            if spread < FLAT_MIDDLE_SPREAD {
                directives.push(RevisionDirective::new(
                    (start..end).collect(),
                    IssueType::PacingIssue,
                    IssueSeverity::Moderate,
                    "Suspense plateaus in middle section",
                    "Add conspirator intervention or new threat to middle section",
                    readers,
                ));
            }
        }

        for i in 1..curve.len() {
            if curve[i] < curve[i - 1] - SUSPENSE_DROP {
                directives.push(RevisionDirective::new(
                    vec![i],
                    IssueType::SuspenseDrop,
                    IssueSeverity::Moderate,
                    format!("Sharp suspense drop at plot point {}", i),
                    "Revise to maintain tension; avoid giving detective too much information at once",
                    readers,
                ));
            }
        }

        let average = curve.iter().sum::<f64>() / curve.len() as f64;
        if average < LOW_SUSPENSE_AVERAGE {
            directives.push(RevisionDirective::new(
                (0..curve.len()).collect(),
                IssueType::PacingIssue,
                IssueSeverity::Moderate,
                format!("Overall suspense too low (average: {:.1})", average),
                "Increase stakes, add more obstacles, or strengthen conspirator threats",
                readers,
            ));
        }

        directives
    }

    /// Plot points enough readers found least engaging.
    fn engagement_issues(&self, evaluations: &[ReaderEvaluation], point_count: usize) -> Vec<RevisionDirective> {
        let mut counts: BTreeMap<usize, usize> = BTreeMap::new();
        for evaluation in evaluations {
            for point in &evaluation.engagement_assessment.least_engaging {
                *counts.entry(*point).or_default() += 1;
            }
        }

        counts
            .into_iter()
            .filter(|(point, count)| *count >= self.config.consensus_threshold && (point_count == 0 || *point < point_count))
            .map(|(point, count)| {
                RevisionDirective::new(
                    vec![point],
                    IssueType::PacingIssue,
                    IssueSeverity::Minor,
                    format!("Plot point {} found unengaging by {} readers", point, count),
                    "Add more tension, conflict, or interesting detail",
                    count,
                )
            })
            .collect()
    }

    /// Severity weight scaled by consensus; layer leaks count triple.
    pub fn priority(&self, directive: &RevisionDirective) -> f64 {
        let mut base = match directive.severity {
            IssueSeverity::Critical => self.config.critical_issue_weight,
            IssueSeverity::Moderate => self.config.moderate_issue_weight,
            IssueSeverity::Minor => self.config.minor_issue_weight,
        };
        if directive.issue_type == IssueType::LayerLeak {
            base *= 3.0;
        }
        let consensus = 1.0 + (directive.consensus_count as f64 - 1.0) * 0.5;
        base * consensus
    }

    /// Every critical directive, then the highest-priority others up to `max`.
    pub fn filter_directives(&self, directives: &[RevisionDirective], max: usize) -> Vec<RevisionDirective> {
        let (critical, mut others): (Vec<_>, Vec<_>) = directives
            .iter()
            .cloned()
            .partition(|d| d.severity == IssueSeverity::Critical);
        others.sort_by(|a, b| b.priority.total_cmp(&a.priority));
        let room = max.saturating_sub(critical.len());
        critical.into_iter().chain(others.into_iter().take(room)).collect()
    }
}

fn classify_issue(text: &str) -> IssueType {
    let text = text.to_lowercase();
    let has = |needles: &[&str]| needles.iter().any(|n| text.contains(n));
    if has(&["logic", "inconsisten", "contradict"]) {
        IssueType::LogicalInconsistency
    } else if has(&["character", "behavior", "implausib"]) {
        IssueType::CharacterImplausibility
    } else if has(&["trope", "clich"]) {
        IssueType::TropeOveruse
    } else {
        IssueType::LogicalInconsistency
    }
}

fn max_of(values: &[f64]) -> f64 {
    values.iter().copied().fold(f64::NEG_INFINITY, f64::max)
}

fn min_of(values: &[f64]) -> f64 {
    values.iter().copied().fold(f64::INFINITY, f64::min)
}

/// Sorted, de-duplicated plot point indices named by any directive.
pub fn revision_targets(directives: &[RevisionDirective]) -> Vec<usize> {
    directives
        .iter()
        .flat_map(|d| d.target_plot_points.iter().copied())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Human-readable summary grouped by severity.
pub fn revision_summary(directives: &[RevisionDirective]) -> String {
    if directives.is_empty() {
        return "No revisions needed.".to_string();
    }

    let mut lines = vec!["Revision Summary:".to_string(), "=".repeat(40)];
    for (severity, label) in [
        (IssueSeverity::Critical, "CRITICAL"),
        (IssueSeverity::Moderate, "MODERATE"),
        (IssueSeverity::Minor, "MINOR"),
    ] {
        let group: Vec<&RevisionDirective> = directives.iter().filter(|d| d.severity == severity).collect();
        if group.is_empty() {
            continue;
        }
        lines.push(format!("\n{} ISSUES ({}):", label, group.len()));
        for d in group {
            lines.push(format!("  - {}", d.description));
            if severity == IssueSeverity::Critical {
                lines.push(format!("    Target: Plot points {:?}", d.target_plot_points));
            }
        }
    }
    lines.join("\n")
}
