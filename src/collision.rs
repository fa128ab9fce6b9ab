//! Collision detection: does a detective action come close to the truth?
//!
//! Free-form generated actions rarely repeat fact text verbatim, so matching
//! works on name fragments and keyword overlap. A match only makes a
//! collision possible; whether it fires is a roll against the configured
//! sensitivity, drawn from the caller's random stream.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

use crate::facts::{CrimeFacts, DiscoveryPath, FabricatedFacts};

/// Words ignored when extracting keywords.
const STOP_WORDS: &[&str] = &[
    "the", "a", "an", "of", "in", "at", "on", "is", "was", "for", "to", "and", "or", "by", "it",
    "be", "as", "with", "from", "that", "this", "has", "had", "have", "not", "but", "are", "were",
    "been", "their",
];

/// Keywords that mark an action as questioning someone.
const INVESTIGATION_VERBS: &[&str] = &[
    "interview",
    "question",
    "alibi",
    "whereabouts",
    "talk",
    "ask",
    "confront",
    "investigate",
    "verify",
    "check",
    "examine",
];

/// Result of checking one action.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collision {
    pub is_collision: bool,
    /// The fact at risk of exposure
    pub vulnerable_point: Option<String>,
    /// The conspirator with the most to lose
    pub threatened_conspirator: Option<String>,
}

impl Collision {
    pub fn none() -> Self {
        Self::default()
    }

    fn hit(vulnerable_point: String, threatened_conspirator: Option<String>) -> Self {
        Self {
            is_collision: true,
            vulnerable_point: Some(vulnerable_point),
            threatened_conspirator,
        }
    }
}

/// Tiered, probabilistic collision check.
///
/// Tiers in priority order, the first one that fires wins:
/// 1. a conspirator named alongside an investigation verb (`sensitivity`)
/// 2. two or more keywords shared with a two-faced evidence item, or its id
///    (`sensitivity`)
/// 3. a crime-timeline location named in the action (`sensitivity * 0.8`)
/// 4. an open discovery path, by keyword overlap (`sensitivity + 0.2`) or
///    by its involved character's name (`sensitivity + 0.1`)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollisionDetector {
    sensitivity: f64,
}

impl CollisionDetector {
    pub fn new(sensitivity: f64) -> Self {
        Self { sensitivity }
    }

    pub fn sensitivity(&self) -> f64 {
        self.sensitivity
    }

    pub fn check_collision<R: Rng + ?Sized>(
        &self,
        action: &str,
        crime: &CrimeFacts,
        _fabricated: &FabricatedFacts,
        open_paths: &[&DiscoveryPath],
        rng: &mut R,
    ) -> Collision {
        let action_lower = action.to_lowercase();
        let action_keywords = extract_keywords(action);

        if let Some(hit) = self.check_conspirators(&action_lower, &action_keywords, crime, rng) {
            return hit;
        }
        if let Some(hit) = self.check_evidence(&action_lower, &action_keywords, crime, rng) {
            return hit;
        }
        if let Some(hit) = self.check_locations(&action_lower, crime, rng) {
            return hit;
        }
        if let Some(hit) = self.check_paths(&action_lower, &action_keywords, open_paths, rng) {
            return hit;
        }

        Collision::none()
    }

    fn check_conspirators<R: Rng + ?Sized>(
        &self,
        action_lower: &str,
        keywords: &BTreeSet<String>,
        crime: &CrimeFacts,
        rng: &mut R,
    ) -> Option<Collision> {
        if !INVESTIGATION_VERBS.iter().any(|v| keywords.contains(*v)) {
            return None;
        }
        let conspirator = crime
            .conspirators
            .iter()
            .find(|c| name_matches(&c.name, action_lower))?;

        if roll(rng, self.sensitivity) {
            debug!(conspirator = %conspirator.name, "Conspirator questioned");
            return Some(Collision::hit(
                format!("Inconsistency in {}'s alibi", conspirator.name),
                Some(conspirator.name.clone()),
            ));
        }
        None
    }

    fn check_evidence<R: Rng + ?Sized>(
        &self,
        action_lower: &str,
        keywords: &BTreeSet<String>,
        crime: &CrimeFacts,
        rng: &mut R,
    ) -> Option<Collision> {
        for evidence in crime.evidence.iter().filter(|e| e.is_collision_candidate()) {
            let overlap = extract_keywords(&evidence.description)
                .intersection(keywords)
                .count();
            let id_named = action_lower.contains(&evidence.id.to_lowercase());
            if overlap < 2 && !id_named {
                continue;
            }
            if roll(rng, self.sensitivity) {
                debug!(evidence = %evidence.id, overlap, "Evidence examined");
                let real_meaning = evidence.real_meaning.as_deref().unwrap_or_default();
                return Some(Collision::hit(
                    format!("True meaning of {}", evidence.description),
                    conspirator_named_in(crime, real_meaning),
                ));
            }
        }
        None
    }

    fn check_locations<R: Rng + ?Sized>(
        &self,
        action_lower: &str,
        crime: &CrimeFacts,
        rng: &mut R,
    ) -> Option<Collision> {
        for event in crime.timeline.events() {
            if event.location.is_empty() || !action_lower.contains(&event.location.to_lowercase()) {
                continue;
            }
            if roll(rng, self.sensitivity * 0.8) {
                debug!(location = %event.location, "Crime location visited");
                return Some(Collision::hit(
                    format!("Activity at {} during the crime", event.location),
                    conspirator_named_in(crime, &event.actor),
                ));
            }
        }
        None
    }

    fn check_paths<R: Rng + ?Sized>(
        &self,
        action_lower: &str,
        keywords: &BTreeSet<String>,
        open_paths: &[&DiscoveryPath],
        rng: &mut R,
    ) -> Option<Collision> {
        for path in open_paths {
            let overlap = extract_keywords(&path.description)
                .intersection(keywords)
                .count();
            if overlap >= 2 && roll(rng, self.sensitivity + 0.2) {
                debug!(path = %path.id, overlap, "Discovery path approached");
                return Some(Collision::hit(
                    path.description.clone(),
                    path.involves_character.clone(),
                ));
            }

            if let Some(name) = &path.involves_character {
                if name_matches(name, action_lower) && roll(rng, self.sensitivity + 0.1) {
                    debug!(path = %path.id, character = %name, "Discovery path character named");
                    return Some(Collision::hit(path.description.clone(), Some(name.clone())));
                }
            }
        }
        None
    }
}

fn roll<R: Rng + ?Sized>(rng: &mut R, probability: f64) -> bool {
    rng.gen::<f64>() < probability
}

/// Lowercased words longer than two characters, punctuation trimmed,
/// stop words removed.
pub fn extract_keywords(text: &str) -> BTreeSet<String> {
    text.split_whitespace()
        .map(|w| {
            w.trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase()
        })
        .filter(|w| w.chars().count() > 2 && !STOP_WORDS.contains(&w.as_str()))
        .collect()
}

/// Full name, or any name part of three or more characters, appears in
/// `text_lower`.
pub fn name_matches(name: &str, text_lower: &str) -> bool {
    let name_lower = name.to_lowercase();
    if name_lower.is_empty() {
        return false;
    }
    if text_lower.contains(&name_lower) {
        return true;
    }
    name_lower
        .split_whitespace()
        .any(|part| part.chars().count() >= 3 && text_lower.contains(part))
}

/// Conspirator whose name appears in `text`, else the first conspirator.
fn conspirator_named_in(crime: &CrimeFacts, text: &str) -> Option<String> {
    let text_lower = text.to_lowercase();
    crime
        .conspirators
        .iter()
        .find(|c| name_matches(&c.name, &text_lower))
        .or_else(|| crime.conspirators.first())
        .map(|c| c.name.clone())
}
