//! The fact model: what really happened, what the conspirators claim
//! happened, and the routes by which the detective could tell the two apart.
//!
//! Both fact layers are produced once by an upstream backstory stage and are
//! read-only for the rest of a run.

mod case;
mod paths;
mod validation;

pub use case::CaseFile;
pub use paths::seed_discovery_paths;
pub use validation::{ConsistencyValidator, ValidationReport};

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Roles a character can play in the story.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CharacterRole {
    Criminal,
    Conspirator,
    Victim,
    Detective,
    Witness,
    Suspect,
    Bystander,
}

/// A person in the case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Character {
    pub name: String,
    pub role: CharacterRole,
    #[serde(default)]
    pub occupation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub motive: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub means: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opportunity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alibi: Option<String>,
    /// Hidden information about the character
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
    /// What keeps a conspirator loyal
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub leverage: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relationship_to_victim: Option<String>,
}

impl Character {
    pub fn new(name: impl Into<String>, role: CharacterRole, occupation: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            role,
            occupation: occupation.into(),
            motive: None,
            means: None,
            opportunity: None,
            alibi: None,
            secret: None,
            leverage: None,
            relationship_to_victim: None,
        }
    }

    pub fn with_alibi(mut self, alibi: impl Into<String>) -> Self {
        self.alibi = Some(alibi.into());
        self
    }

    pub fn with_leverage(mut self, leverage: impl Into<String>) -> Self {
        self.leverage = Some(leverage.into());
        self
    }

    pub fn with_motive(mut self, motive: impl Into<String>) -> Self {
        self.motive = Some(motive.into());
        self
    }

    /// Whether means, motive and opportunity are all on record.
    pub fn has_means_motive_opportunity(&self) -> bool {
        self.means.is_some() && self.motive.is_some() && self.opportunity.is_some()
    }
}

/// Kinds of evidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvidenceType {
    Physical,
    Testimonial,
    Documentary,
    Digital,
    Circumstantial,
}

impl EvidenceType {
    /// Parse a free-form type label; unknown labels count as physical.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "testimonial" => EvidenceType::Testimonial,
            "documentary" => EvidenceType::Documentary,
            "digital" => EvidenceType::Digital,
            "circumstantial" => EvidenceType::Circumstantial,
            _ => EvidenceType::Physical,
        }
    }

    /// Draw how many investigation steps a clue of this kind takes.
    ///
    /// Physical and digital clues take 2-3 steps, documents 1-2, anything
    /// else a single step.
    pub fn roll_steps<R: Rng + ?Sized>(self, rng: &mut R) -> u32 {
        match self {
            EvidenceType::Physical | EvidenceType::Digital => rng.gen_range(2..=3),
            EvidenceType::Documentary => rng.gen_range(1..=2),
            EvidenceType::Testimonial | EvidenceType::Circumstantial => 1,
        }
    }
}

/// A piece of evidence with its true and its cover-story reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    /// Unique within a case
    pub id: String,
    pub description: String,
    #[serde(rename = "type")]
    pub evidence_type: EvidenceType,
    #[serde(default)]
    pub location: String,
    /// What it actually proves
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub real_meaning: Option<String>,
    /// What the conspirators want the detective to think
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fabricated_meaning: Option<String>,
    #[serde(default)]
    pub is_planted: bool,
    /// Investigation steps to fully obtain it; 0 means not yet assigned
    #[serde(default)]
    pub steps_required: u32,
}

impl Evidence {
    pub fn new(
        id: impl Into<String>,
        description: impl Into<String>,
        evidence_type: EvidenceType,
        location: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            evidence_type,
            location: location.into(),
            real_meaning: None,
            fabricated_meaning: None,
            is_planted: false,
            steps_required: 0,
        }
    }

    pub fn with_meanings(mut self, real: impl Into<String>, fabricated: impl Into<String>) -> Self {
        self.real_meaning = Some(real.into());
        self.fabricated_meaning = Some(fabricated.into());
        self
    }

    pub fn with_steps(mut self, steps: u32) -> Self {
        self.steps_required = steps;
        self
    }

    /// Steps needed, never less than one.
    pub fn steps(&self) -> u32 {
        self.steps_required.max(1)
    }

    /// Evidence with both readings can expose the conspiracy.
    pub fn is_collision_candidate(&self) -> bool {
        self.real_meaning.is_some() && self.fabricated_meaning.is_some()
    }
}

/// One entry of a timeline.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TimelineEvent {
    #[serde(default)]
    pub time: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub actor: String,
    #[serde(default)]
    pub location: String,
}

/// Ordered, append-only sequence of events.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timeline {
    events: Vec<TimelineEvent>,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_event(
        &mut self,
        time: impl Into<String>,
        description: impl Into<String>,
        actor: impl Into<String>,
        location: impl Into<String>,
    ) {
        self.events.push(TimelineEvent {
            time: time.into(),
            description: description.into(),
            actor: actor.into(),
            location: location.into(),
        });
    }

    pub fn events(&self) -> &[TimelineEvent] {
        &self.events
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }
}

/// The real crime: what actually happened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrimeFacts {
    pub crime_type: String,
    pub victim: Character,
    pub criminal: Character,
    #[serde(default)]
    pub conspirators: Vec<Character>,
    pub motive: String,
    pub method: String,
    #[serde(default)]
    pub timeline: Timeline,
    #[serde(default)]
    pub evidence: Vec<Evidence>,
    pub location: String,
    /// How the conspirators coordinate the cover-up
    #[serde(default)]
    pub coordination_plan: String,
}

impl CrimeFacts {
    /// Conspirator by name, ignoring case.
    pub fn find_conspirator(&self, name: &str) -> Option<&Character> {
        self.conspirators
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name.trim()))
    }

    pub fn find_evidence(&self, id: &str) -> Option<&Evidence> {
        self.evidence.iter().find(|e| e.id == id)
    }

    pub fn conspirator_names(&self) -> Vec<&str> {
        self.conspirators.iter().map(|c| c.name.as_str()).collect()
    }
}

/// The cover story the conspirators present to investigators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FabricatedFacts {
    pub fake_suspect: Character,
    pub fake_motive: String,
    pub fake_method: String,
    #[serde(default)]
    pub fake_timeline: Timeline,
    #[serde(default)]
    pub planted_evidence: Vec<Evidence>,
    /// Character name to alibi text
    #[serde(default)]
    pub alibis: BTreeMap<String, String>,
    #[serde(default)]
    pub cover_story: String,
}

impl FabricatedFacts {
    pub fn alibi_for(&self, name: &str) -> Option<&str> {
        self.alibis.get(name).map(String::as_str)
    }
}

/// A route by which the detective could reach the truth.
///
/// Closing is permanent: once closed a path never reopens and its
/// `closed_by` marker is never overwritten.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryPath {
    pub id: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub involves_character: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub involves_evidence: Option<String>,
    /// 1-10, how hard the route is to follow
    pub difficulty: u8,
    #[serde(default = "default_open")]
    is_open: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    closed_by: Option<String>,
}

fn default_open() -> bool {
    true
}

impl DiscoveryPath {
    pub fn new(id: impl Into<String>, description: impl Into<String>, difficulty: u8) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            involves_character: None,
            involves_evidence: None,
            difficulty: difficulty.clamp(1, 10),
            is_open: true,
            closed_by: None,
        }
    }

    pub fn with_character(mut self, name: impl Into<String>) -> Self {
        self.involves_character = Some(name.into());
        self
    }

    pub fn with_evidence(mut self, id: impl Into<String>) -> Self {
        self.involves_evidence = Some(id.into());
        self
    }

    pub fn is_open(&self) -> bool {
        self.is_open
    }

    pub fn closed_by(&self) -> Option<&str> {
        self.closed_by.as_deref()
    }

    /// Close the path. Returns `false` if it was already closed.
    pub fn close(&mut self, closed_by: impl Into<String>) -> bool {
        if !self.is_open {
            return false;
        }
        self.is_open = false;
        self.closed_by = Some(closed_by.into());
        true
    }
}
