//! Story state: everything the controller mutates during one run.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

use crate::facts::{CrimeFacts, DiscoveryPath};

/// Lowest the detective's odds can fall.
pub const MIN_SUCCESS_PROBABILITY: f64 = 0.05;
/// Highest the detective's odds can climb.
pub const MAX_SUCCESS_PROBABILITY: f64 = 0.8;
/// Odds at the start of every run.
pub const INITIAL_SUCCESS_PROBABILITY: f64 = 0.7;

/// Clamp a success probability into its legal range.
pub fn clamp_probability(p: f64) -> f64 {
    p.clamp(MIN_SUCCESS_PROBABILITY, MAX_SUCCESS_PROBABILITY)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Investigation,
    /// Terminal
    Resolution,
}

/// Why the investigation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionReason {
    /// The countdown reached zero
    Deadline,
    /// Too few open paths remained after the minimum story length
    PathsExhausted,
    /// The plot point budget ran out
    PlotBudget,
}

/// Verification state of a conspirator's alibi.
///
/// There is no verified state: a fabricated alibi can be challenged but
/// never cleared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlibiStatus {
    Unverified,
    Challenged,
}

/// The detective and what they stand to lose.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectiveProfile {
    pub name: String,
    pub background: String,
    pub personal_stakes: String,
    pub dire_consequence: String,
    pub deadline_reason: String,
}

impl DetectiveProfile {
    /// Profile used when generation produces nothing usable.
    pub fn fallback() -> Self {
        Self {
            name: "Detective Morgan".to_string(),
            background: "Veteran detective with 15 years on the force".to_string(),
            personal_stakes: "This case mirrors an unsolved case that haunts them".to_string(),
            dire_consequence: "The real criminal escapes and the detective's career ends".to_string(),
            deadline_reason: "Key witness leaving the country in 72 hours".to_string(),
        }
    }
}

/// One step of the story.
///
/// Fields serialize in declaration order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlotPoint {
    /// Monotonic within a run, starting at 1
    pub id: u32,
    pub description: String,
    pub detective_action: Option<String>,
    pub conspirator_intervention: Option<String>,
    pub obstacle: Option<String>,
    /// Reader-facing truth, never part of the detective's knowledge
    pub reader_revelation: Option<String>,
    pub detective_learns: Option<String>,
    #[serde(default)]
    pub paths_closed: Vec<String>,
    pub suspense_level: u8,
    #[serde(default)]
    pub is_collision: bool,
}

impl PlotPoint {
    pub fn new(id: u32, description: impl Into<String>, suspense_level: u8) -> Self {
        Self {
            id,
            description: description.into(),
            detective_action: None,
            conspirator_intervention: None,
            obstacle: None,
            reader_revelation: None,
            detective_learns: None,
            paths_closed: Vec::new(),
            suspense_level,
            is_collision: false,
        }
    }
}

/// One entry of the accumulated action history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRecord {
    pub action: String,
    pub outcome: String,
    pub was_blocked: bool,
    pub blocked_by: Option<String>,
    pub obstacle: Option<String>,
    pub detective_learned: Option<String>,
}

impl ActionRecord {
    /// `detected` is the collision check's verdict for the action, which
    /// holds even when no conspirator could be found to intervene.
    pub fn from_point(action: &str, point: &PlotPoint, detected: bool) -> Self {
        Self {
            action: action.to_string(),
            outcome: point.description.clone(),
            was_blocked: detected,
            blocked_by: point.conspirator_intervention.clone(),
            obstacle: point.obstacle.clone(),
            detective_learned: point.detective_learns.clone(),
        }
    }
}

/// Mutable state of one generation run. Owned by a single controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoryState {
    /// Fact tags known to the reader
    pub reader_knowledge: BTreeSet<String>,
    /// What the detective has learned; only ever grows
    pub detective_knowledge: BTreeSet<String>,
    pub discovery_paths: Vec<DiscoveryPath>,
    pub suspense_level: u8,
    pub current_phase: Phase,
    pub detective_profile: DetectiveProfile,
    pub time_remaining: u32,
    pub total_time: u32,
    success_probability: f64,
    pub action_history: Vec<ActionRecord>,
    /// Evidence id to completed investigation steps
    pub evidence_progress: BTreeMap<String, u32>,
    pub undiscovered_evidence: Vec<String>,
    pub alibi_status: BTreeMap<String, AlibiStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution_reason: Option<ResolutionReason>,
}

impl StoryState {
    /// Fresh state at the start of an investigation.
    pub fn new(
        crime: &CrimeFacts,
        discovery_paths: Vec<DiscoveryPath>,
        detective_profile: DetectiveProfile,
        initial_suspense: u8,
        total_time: u32,
    ) -> Self {
        Self {
            reader_knowledge: initial_reader_knowledge(crime),
            detective_knowledge: BTreeSet::new(),
            discovery_paths,
            suspense_level: initial_suspense,
            current_phase: Phase::Investigation,
            detective_profile,
            time_remaining: total_time,
            total_time,
            success_probability: INITIAL_SUCCESS_PROBABILITY,
            action_history: Vec::new(),
            evidence_progress: crime.evidence.iter().map(|e| (e.id.clone(), 0)).collect(),
            undiscovered_evidence: crime.evidence.iter().map(|e| e.id.clone()).collect(),
            alibi_status: crime
                .conspirators
                .iter()
                .map(|c| (c.name.clone(), AlibiStatus::Unverified))
                .collect(),
            resolution_reason: None,
        }
    }

    pub fn success_probability(&self) -> f64 {
        self.success_probability
    }

    /// Shift the odds by `delta`, clamped.
    pub fn adjust_probability(&mut self, delta: f64) {
        self.success_probability = clamp_probability(self.success_probability + delta);
    }

    pub fn open_paths(&self) -> Vec<&DiscoveryPath> {
        self.discovery_paths.iter().filter(|p| p.is_open()).collect()
    }

    pub fn open_path_count(&self) -> usize {
        self.discovery_paths.iter().filter(|p| p.is_open()).count()
    }

    /// Close the path with `path_id`. Returns whether a path actually closed.
    pub fn close_path(&mut self, path_id: &str, closed_by: &str) -> bool {
        let closed = self
            .discovery_paths
            .iter_mut()
            .find(|p| p.id == path_id)
            .map(|p| p.close(closed_by))
            .unwrap_or(false);
        if closed {
            debug!(path = %path_id, closed_by, "Discovery path closed");
        }
        closed
    }

    /// Advance one countdown tick.
    pub fn tick(&mut self) {
        self.time_remaining = self.time_remaining.saturating_sub(1);
    }

    /// Fraction of the countdown still left.
    pub fn time_ratio(&self) -> f64 {
        if self.total_time == 0 {
            0.0
        } else {
            f64::from(self.time_remaining) / f64::from(self.total_time)
        }
    }

    /// Record one more completed step on an evidence item.
    ///
    /// Progress stops at `steps_required`; the item leaves the undiscovered
    /// list the first time it gets there. Returns the new step count.
    pub fn advance_evidence(&mut self, evidence_id: &str, steps_required: u32) -> u32 {
        let steps_required = steps_required.max(1);
        let progress = self.evidence_progress.entry(evidence_id.to_string()).or_insert(0);
        *progress = (*progress + 1).min(steps_required);
        let done = *progress;
        if done == steps_required {
            self.undiscovered_evidence.retain(|id| id != evidence_id);
        }
        done
    }

    pub fn unverified_alibis(&self) -> Vec<&str> {
        self.alibi_status
            .iter()
            .filter(|(_, status)| **status == AlibiStatus::Unverified)
            .map(|(name, _)| name.as_str())
            .collect()
    }

    pub fn challenge_alibi(&mut self, name: &str) {
        if let Some(status) = self.alibi_status.get_mut(name) {
            *status = AlibiStatus::Challenged;
        }
    }

    pub fn learn(&mut self, fact: impl Into<String>) {
        self.detective_knowledge.insert(fact.into());
    }

    pub fn reveal_to_reader(&mut self, revelation: &str) {
        self.reader_knowledge.insert(format!("revelation:{}", revelation));
    }

    /// Enter the terminal phase.
    pub fn resolve(&mut self, reason: ResolutionReason) {
        self.current_phase = Phase::Resolution;
        self.resolution_reason = Some(reason);
    }

    pub fn is_resolved(&self) -> bool {
        self.current_phase == Phase::Resolution
    }
}

fn initial_reader_knowledge(crime: &CrimeFacts) -> BTreeSet<String> {
    [
        format!("criminal:{}", crime.criminal.name),
        format!("motive:{}", crime.motive),
        format!("method:{}", crime.method),
        format!("conspirators:{}", crime.conspirator_names().join(",")),
    ]
    .into_iter()
    .collect()
}
