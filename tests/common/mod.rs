//! Shared fixtures for integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use mystery_suspense::config::{GenerationConfig, SuspenseConfig};
use mystery_suspense::error::{GeneratorError, GeneratorResult};
use mystery_suspense::facts::{
    CaseFile, Character, CharacterRole, CrimeFacts, DiscoveryPath, Evidence, EvidenceType,
    FabricatedFacts, Timeline,
};
use mystery_suspense::generator::{GenerationRequest, Generator};

pub const ACTION: &str = "interview Alice about her alibi";

/// Replies with the same text to every prompt.
pub struct ScriptedGenerator {
    reply: String,
    calls: AtomicUsize,
}

impl ScriptedGenerator {
    pub fn new(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    async fn generate(&self, _request: &GenerationRequest) -> GeneratorResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.reply.clone())
    }
}

/// Fails every call, as an unreachable pipe would.
pub struct OfflineGenerator;

#[async_trait]
impl Generator for OfflineGenerator {
    async fn generate(&self, _request: &GenerationRequest) -> GeneratorResult<String> {
        Err(GeneratorError::Unavailable {
            message: "connection refused".to_string(),
            retries: 3,
        })
    }
}

/// Picks a reply by the first route whose marker appears in the prompt.
/// Prompts with no matching route fail as if the pipe were down.
pub struct RoutedGenerator {
    routes: Vec<(&'static str, String)>,
    prompts: Mutex<Vec<String>>,
}

impl RoutedGenerator {
    pub fn new() -> Self {
        Self {
            routes: Vec::new(),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn route(mut self, marker: &'static str, reply: impl Into<String>) -> Self {
        self.routes.push((marker, reply.into()));
        self
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn count(&self, marker: &str) -> usize {
        self.prompts().iter().filter(|p| p.contains(marker)).count()
    }
}

#[async_trait]
impl Generator for RoutedGenerator {
    async fn generate(&self, request: &GenerationRequest) -> GeneratorResult<String> {
        self.prompts.lock().unwrap().push(request.prompt.clone());
        self.routes
            .iter()
            .find(|(marker, _)| request.prompt.contains(marker))
            .map(|(_, reply)| reply.clone())
            .ok_or_else(|| GeneratorError::Unavailable {
                message: "no route".to_string(),
                retries: 0,
            })
    }
}

pub fn sample_crime() -> CrimeFacts {
    let mut timeline = Timeline::new();
    timeline.add_event("21:00", "Dinner ends", "Edmund Hale", "Dining Room");
    timeline.add_event("22:15", "Poison added to the nightcap", "Edmund Hale", "Conservatory");
    timeline.add_event("22:40", "Decanter rinsed", "Alice", "Scullery");

    CrimeFacts {
        crime_type: "murder".to_string(),
        victim: Character::new("Victor Hale", CharacterRole::Victim, "shipping magnate"),
        criminal: Character::new("Edmund Hale", CharacterRole::Criminal, "nephew")
            .with_motive("inheritance"),
        conspirators: vec![
            Character::new("Alice", CharacterRole::Conspirator, "housekeeper")
                .with_alibi("polishing silver in the pantry")
                .with_leverage("owes Edmund her position"),
            Character::new("Bertram Cole", CharacterRole::Conspirator, "family solicitor")
                .with_alibi("on a late train from the city"),
        ],
        motive: "inheritance".to_string(),
        method: "poisoned nightcap".to_string(),
        timeline,
        evidence: vec![
            Evidence::new("ev_glass", "Crystal tumbler residue", EvidenceType::Physical, "Study")
                .with_meanings(
                    "Edmund Hale poured the nightcap",
                    "Gregory Pike handled the glass",
                )
                .with_steps(1),
            Evidence::new("ev_will", "Torn codicil fragment", EvidenceType::Documentary, "Fireplace")
                .with_meanings(
                    "Bertram Cole destroyed the new will",
                    "Gregory Pike burned old letters",
                )
                .with_steps(2),
            Evidence::new("ev_ledger", "Pharmacy ledger entry", EvidenceType::Digital, "Village chemist")
                .with_meanings("Edmund Hale bought arsenic", "Gregory Pike bought rat poison")
                .with_steps(3),
        ],
        location: "Hale Manor".to_string(),
        coordination_plan: "Keep suspicion on the gardener".to_string(),
    }
}

pub fn sample_fabricated() -> FabricatedFacts {
    let mut fake_timeline = Timeline::new();
    fake_timeline.add_event("22:00", "Gardener seen near the house", "Gregory Pike", "Garden");

    let mut alibis = BTreeMap::new();
    alibis.insert("Alice".to_string(), "polishing silver in the pantry".to_string());
    alibis.insert("Bertram Cole".to_string(), "on a late train from the city".to_string());

    FabricatedFacts {
        fake_suspect: Character::new("Gregory Pike", CharacterRole::Suspect, "gardener"),
        fake_motive: "dismissed without reference".to_string(),
        fake_method: "rat poison from the potting shed".to_string(),
        fake_timeline,
        planted_evidence: Vec::new(),
        alibis,
        cover_story: "A bitter gardener took revenge".to_string(),
    }
}

pub fn sample_paths() -> Vec<DiscoveryPath> {
    vec![
        DiscoveryPath::new("path_conspirator_Alice", "Catch Alice in a lie or contradiction", 5)
            .with_character("Alice"),
        DiscoveryPath::new(
            "path_conspirator_Bertram Cole",
            "Catch Bertram Cole in a lie or contradiction",
            6,
        )
        .with_character("Bertram Cole"),
        DiscoveryPath::new("path_evidence_ev_ledger", "Discover true meaning of Pharmacy ledger entry", 7)
            .with_evidence("ev_ledger"),
        DiscoveryPath::new("path_timeline", "Reconstruct the true timeline", 7),
        DiscoveryPath::new("path_external_witness", "Find an external witness", 6),
    ]
}

pub fn sample_case() -> CaseFile {
    CaseFile {
        crime: sample_crime(),
        fabricated: sample_fabricated(),
        discovery_paths: sample_paths(),
        suspects: Vec::new(),
    }
}

pub fn generation(min_plot_points: usize, max_plot_points: usize) -> GenerationConfig {
    GenerationConfig {
        min_plot_points,
        max_plot_points,
        discovery_paths_threshold: 1,
        initial_discovery_paths: 5,
        deadline_padding: 3,
        max_retries: 1,
        min_conspirators: 1,
        max_conspirators: 2,
    }
}

pub fn suspense(sensitivity: f64, path_close_probability: f64, new_path_probability: f64) -> SuspenseConfig {
    SuspenseConfig {
        initial_level: 3,
        max_level: 10,
        path_close_probability,
        new_path_probability,
        collision_check_sensitivity: sensitivity,
    }
}
