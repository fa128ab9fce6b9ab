//! Structural story metrics and an overall quality score.

use serde::Serialize;
use std::fmt::Write as _;

use crate::facts::CrimeFacts;
use crate::feedback::{IssueSeverity, ReaderEvaluation};
use crate::state::{PlotPoint, StoryState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SuspenseTrend {
    Ascending,
    Descending,
    Flat,
    /// Too few scores to tell
    #[default]
    Unknown,
}

/// Metrics for one generated story.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StoryMetrics {
    pub num_plot_points: usize,
    pub num_interventions: usize,
    pub num_obstacles: usize,

    pub avg_suspense: f64,
    pub suspense_variance: f64,
    pub suspense_trend: SuspenseTrend,
    pub peak_suspense: f64,
    /// Position of the first peak, normalized to 0-1
    pub peak_position: f64,

    pub initial_paths: usize,
    pub final_open_paths: usize,
    pub paths_closed: usize,
    /// Paths closed per plot point
    pub path_close_rate: f64,

    pub avg_reader_score: f64,
    pub logic_score: f64,
    pub engagement_score: f64,
    pub genre_score: f64,

    pub layer_leak_detected: bool,
    /// Share of predictions naming the real criminal; lower is better
    pub criminal_prediction_accuracy: f64,

    /// Share of plot points that were collisions
    pub collision_rate: f64,

    pub has_flat_middle: bool,
    pub has_premature_peak: bool,
    pub has_sudden_drops: bool,
    pub num_critical_issues: usize,
    pub num_moderate_issues: usize,
}

impl StoryMetrics {
    /// Overall quality, 0-100.
    pub fn overall_score(&self) -> f64 {
        let mut score = (self.avg_suspense * 3.0).min(30.0);
        if self.suspense_trend == SuspenseTrend::Ascending {
            score += 5.0;
        }

        score += (self.avg_reader_score * 2.5).min(25.0);

        let mut structure: f64 = 20.0;
        if self.has_flat_middle {
            structure -= 5.0;
        }
        if self.has_premature_peak {
            structure -= 5.0;
        }
        if self.has_sudden_drops {
            structure -= 3.0;
        }
        score += structure.max(0.0);

        score += if self.layer_leak_detected {
            0.0
        } else if self.criminal_prediction_accuracy > 0.3 {
            10.0
        } else {
            15.0
        };

        score += match self.num_plot_points {
            n if n >= 15 => 10.0,
            n if n >= 10 => 7.0,
            n => n as f64,
        };

        score -= self.num_critical_issues as f64 * 5.0;
        score.clamp(0.0, 100.0)
    }

    /// Plain-text report.
    pub fn format_table(&self) -> String {
        let mut out = String::new();
        let rows: [(&str, String); 16] = [
            ("Plot points", self.num_plot_points.to_string()),
            ("Interventions", self.num_interventions.to_string()),
            ("Obstacles", self.num_obstacles.to_string()),
            ("Avg suspense", format!("{:.2}", self.avg_suspense)),
            ("Suspense variance", format!("{:.2}", self.suspense_variance)),
            ("Suspense trend", format!("{:?}", self.suspense_trend).to_lowercase()),
            ("Peak suspense", format!("{:.2} at {:.2}", self.peak_suspense, self.peak_position)),
            ("Discovery paths", format!("{} initial, {} open", self.initial_paths, self.final_open_paths)),
            ("Paths closed", format!("{} ({:.3}/point)", self.paths_closed, self.path_close_rate)),
            ("Collision rate", format!("{:.2}", self.collision_rate)),
            ("Avg reader score", format!("{:.2}", self.avg_reader_score)),
            ("Layer leak", self.layer_leak_detected.to_string()),
            ("Prediction accuracy", format!("{:.2}", self.criminal_prediction_accuracy)),
            (
                "Quality flags",
                format!(
                    "flat_middle={} premature_peak={} sudden_drops={}",
                    self.has_flat_middle, self.has_premature_peak, self.has_sudden_drops
                ),
            ),
            (
                "Issues",
                format!("{} critical, {} moderate", self.num_critical_issues, self.num_moderate_issues),
            ),
            ("Overall score", format!("{:.1}/100", self.overall_score())),
        ];

        let _ = writeln!(out, "{:<22}{}", "Metric", "Value");
        let _ = writeln!(out, "{}", "-".repeat(50));
        for (label, value) in rows {
            let _ = writeln!(out, "{:<22}{}", label, value);
        }
        out
    }
}

/// Computes [`StoryMetrics`] from a finished run.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsCalculator;

impl MetricsCalculator {
    pub fn new() -> Self {
        Self
    }

    pub fn calculate(
        &self,
        plot_points: &[PlotPoint],
        state: &StoryState,
        evaluations: &[ReaderEvaluation],
        crime: Option<&CrimeFacts>,
        initial_paths: usize,
    ) -> StoryMetrics {
        let n = plot_points.len();
        let mut metrics = StoryMetrics {
            num_plot_points: n,
            num_interventions: plot_points.iter().filter(|p| p.conspirator_intervention.is_some()).count(),
            num_obstacles: plot_points.iter().filter(|p| p.obstacle.is_some()).count(),
            initial_paths,
            final_open_paths: state.open_path_count(),
            paths_closed: plot_points.iter().map(|p| p.paths_closed.len()).sum(),
            ..Default::default()
        };

        if n > 0 {
            metrics.path_close_rate = metrics.paths_closed as f64 / n as f64;
            metrics.collision_rate = plot_points.iter().filter(|p| p.is_collision).count() as f64 / n as f64;
        }

        suspense_metrics(&mut metrics, plot_points, evaluations);
        reader_metrics(&mut metrics, evaluations, crime);
        metrics
    }
}

fn suspense_metrics(metrics: &mut StoryMetrics, plot_points: &[PlotPoint], evaluations: &[ReaderEvaluation]) {
    let levels: Vec<f64> = plot_points.iter().map(|p| f64::from(p.suspense_level)).collect();
    if levels.is_empty() {
        return;
    }

    // Reader scores win over the generator's own levels when present
    let reader_scores: Vec<f64> = evaluations
        .iter()
        .flat_map(|e| e.suspense_scores.values().copied())
        .collect();
    let scores = if reader_scores.is_empty() { &levels } else { &reader_scores };

    let len = scores.len() as f64;
    let mean = scores.iter().sum::<f64>() / len;
    metrics.avg_suspense = mean;
    metrics.suspense_variance = scores.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / len;

    let (peak_index, peak) = scores
        .iter()
        .copied()
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |best, (i, s)| if s > best.1 { (i, s) } else { best });
    metrics.peak_suspense = peak;
    metrics.peak_position = peak_index as f64 / len;

    if scores.len() >= 4 {
        let half = scores.len() / 2;
        let first = scores[..half].iter().sum::<f64>() / half as f64;
        let second = scores[half..].iter().sum::<f64>() / (scores.len() - half) as f64;
        metrics.suspense_trend = if second > first + 0.5 {
            SuspenseTrend::Ascending
        } else if second < first - 0.5 {
            SuspenseTrend::Descending
        } else {
            SuspenseTrend::Flat
        };
    }

    if levels.len() >= 6 {
        let middle = &levels[levels.len() / 3..2 * levels.len() / 3];
        let max = middle.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let min = middle.iter().copied().fold(f64::INFINITY, f64::min);
        metrics.has_flat_middle = max - min < 1.5;
    }
    metrics.has_premature_peak = metrics.peak_position < 0.6;
    metrics.has_sudden_drops = levels.windows(2).any(|w| w[1] < w[0] - 2.0);
}

fn reader_metrics(metrics: &mut StoryMetrics, evaluations: &[ReaderEvaluation], crime: Option<&CrimeFacts>) {
    if evaluations.is_empty() {
        return;
    }

    metrics.avg_reader_score =
        evaluations.iter().map(|e| e.overall_score).sum::<f64>() / evaluations.len() as f64;

    for evaluation in evaluations {
        match evaluation.reader_role.as_str() {
            "logic_analyst" => metrics.logic_score = evaluation.overall_score,
            "intuitive_reader" => metrics.engagement_score = evaluation.overall_score,
            "genre_expert" => metrics.genre_score = evaluation.overall_score,
            _ => {}
        }
    }

    if let Some(crime) = crime {
        let criminal = crime.criminal.name.trim().to_lowercase();
        let predictions: Vec<&str> = evaluations
            .iter()
            .flat_map(|e| e.criminal_predictions.values().map(|p| p.prediction.as_str()))
            .collect();
        let correct = predictions
            .iter()
            .filter(|p| p.trim().to_lowercase() == criminal)
            .count();
        metrics.layer_leak_detected = correct > 0;
        if !predictions.is_empty() {
            metrics.criminal_prediction_accuracy = correct as f64 / predictions.len() as f64;
        }
    }

    for flag in evaluations.iter().flat_map(|e| &e.inconsistency_flags) {
        match flag.severity {
            IssueSeverity::Critical => metrics.num_critical_issues += 1,
            IssueSeverity::Moderate => metrics.num_moderate_issues += 1,
            IssueSeverity::Minor => {}
        }
    }
}
