//! Case generation: the real crime, the conspirators' cover story, and a
//! few innocent suspects, produced through the same [`Generator`] the
//! controller uses.
//!
//! Every stage degrades instead of failing. A crime the generator cannot
//! produce is replaced by a fixed fallback case, and a cover story that
//! never validates is returned as the best attempt with its issues logged.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use crate::config::GenerationConfig;
use crate::facts::{
    CaseFile, Character, CharacterRole, ConsistencyValidator, CrimeFacts, Evidence, EvidenceType,
    FabricatedFacts, Timeline,
};
use crate::generator::{generate_with_retry, GenerationOutcome, GenerationRequest, Generator};
use crate::prompts::{self, CASE_SYSTEM_PROMPT, FABRICATION_SYSTEM_PROMPT};

pub const CRIME_TYPES: &[&str] = &["murder", "embezzlement", "art theft", "corporate sabotage", "kidnapping"];

pub const SETTINGS: &[&str] = &[
    "tech startup",
    "law firm",
    "art gallery",
    "luxury hotel",
    "pharmaceutical company",
    "investment bank",
    "university",
    "theater company",
];

const MIN_EVIDENCE: usize = 3;
const MIN_TIMELINE_EVENTS: usize = 4;
const FALLBACK_SUSPECTS: &[&str] = &["Marcus Reed", "Thomas Grey", "Evelyn Shaw"];

/// What to ask the case generator for. Unset fields are drawn at random.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CaseRequest {
    pub crime_type: Option<String>,
    pub setting: Option<String>,
    pub conspirators: Option<usize>,
    /// Innocent red-herring suspects to add
    pub suspects: usize,
}

/// Builds complete [`CaseFile`]s from a generator.
pub struct CaseGenerator<G> {
    generator: G,
    generation: GenerationConfig,
    validator: ConsistencyValidator,
}

impl<G: Generator> CaseGenerator<G> {
    pub fn new(generator: G, generation: GenerationConfig) -> Self {
        Self {
            generator,
            generation,
            validator: ConsistencyValidator::new(),
        }
    }

    pub fn generator(&self) -> &G {
        &self.generator
    }

    /// Generate a case ready for the controller: evidence steps assigned and
    /// discovery paths seeded.
    pub async fn generate<R: Rng + Send>(&self, request: &CaseRequest, rng: &mut R) -> CaseFile {
        let crime_type = request
            .crime_type
            .clone()
            .or_else(|| CRIME_TYPES.choose(rng).map(|s| s.to_string()))
            .unwrap_or_else(|| "murder".to_string());
        let setting = request
            .setting
            .clone()
            .or_else(|| SETTINGS.choose(rng).map(|s| s.to_string()))
            .unwrap_or_else(|| "luxury hotel".to_string());
        let conspirators = request.conspirators.unwrap_or_else(|| {
            let min = self.generation.min_conspirators.max(1);
            rng.gen_range(min..=self.generation.max_conspirators.max(min))
        });

        info!(crime_type = %crime_type, setting = %setting, conspirators, "Generating case");

        let mut crime = self.generate_crime(&crime_type, &setting, conspirators).await;
        let fabricated = self.generate_fabricated(&mut crime).await;
        let suspects = if request.suspects > 0 {
            self.additional_suspects(&crime, &fabricated, request.suspects).await
        } else {
            Vec::new()
        };

        let mut case = CaseFile {
            crime,
            fabricated,
            discovery_paths: Vec::new(),
            suspects,
        };
        case.prepare(self.generation.initial_discovery_paths, rng);

        info!(
            criminal = %case.crime.criminal.name,
            fake_suspect = %case.fabricated.fake_suspect.name,
            paths = case.discovery_paths.len(),
            suspects = case.suspects.len(),
            "Case ready"
        );
        case
    }

    /// The real crime, or the fallback case when nothing usable comes back.
    pub async fn generate_crime(&self, crime_type: &str, setting: &str, conspirators: usize) -> CrimeFacts {
        let outcome = self
            .structured(
                prompts::crime_backstory_prompt(crime_type, conspirators, setting),
                CASE_SYSTEM_PROMPT,
            )
            .await;

        let Some(draft) = decode::<CrimeDraft>(&outcome) else {
            warn!(crime_type, setting, "Crime generation failed, using fallback case");
            return fallback_crime(crime_type, setting);
        };

        let crime = draft.into_crime(crime_type, setting);
        if !self.is_complex_enough(&crime) {
            warn!(
                conspirators = crime.conspirators.len(),
                evidence = crime.evidence.len(),
                timeline = crime.timeline.len(),
                "Generated crime is thinner than requested"
            );
        }
        crime
    }

    /// The cover story for `crime`.
    ///
    /// Explanations the generator gives for real evidence are written into
    /// the crime's `fabricated_meaning` fields. Each attempt that fails
    /// validation gets one fix pass before the next attempt.
    pub async fn generate_fabricated(&self, crime: &mut CrimeFacts) -> FabricatedFacts {
        let real_facts = serde_json::to_string_pretty(&*crime).unwrap_or_default();
        let attempts = self.generation.max_retries.max(1);
        let mut best: Option<FabricatedFacts> = None;

        for attempt in 1..=attempts {
            let outcome = self
                .structured(
                    prompts::fabricated_narrative_prompt(&real_facts),
                    FABRICATION_SYSTEM_PROMPT,
                )
                .await;
            let Some(draft) = decode::<FabricationDraft>(&outcome) else {
                warn!(attempt, "Fabricated narrative generation failed");
                continue;
            };

            explain_evidence(crime, &draft.evidence_explanations);
            let fabricated = draft.into_fabricated();
            let report = self.validator.validate(crime, &fabricated);
            if report.is_valid() {
                info!(attempt, fake_suspect = %fabricated.fake_suspect.name, "Fabricated narrative ready");
                return fabricated;
            }

            warn!(attempt, issues = ?report.issues, "Fabricated narrative inconsistent, attempting fix");
            let fabricated = self.fix_issues(crime, fabricated, &report.issues).await;
            let report = self.validator.validate(crime, &fabricated);
            if report.is_valid() {
                info!(attempt, "Fabricated narrative fixed");
                return fabricated;
            }
            best = Some(fabricated);
        }

        match best {
            Some(fabricated) => {
                warn!("Returning fabricated narrative with outstanding issues");
                fabricated
            }
            None => {
                warn!("No fabricated narrative generated, using fallback cover story");
                fallback_fabricated(crime)
            }
        }
    }

    /// Ask the generator to patch the holes the validator found.
    async fn fix_issues(
        &self,
        crime: &mut CrimeFacts,
        mut fabricated: FabricatedFacts,
        issues: &[String],
    ) -> FabricatedFacts {
        let evidence: Vec<String> = crime
            .evidence
            .iter()
            .map(|e| format!("{}: {}", e.id, e.description))
            .collect();
        let prompt = prompts::fabrication_fix_prompt(
            &serde_json::to_string_pretty(&fabricated).unwrap_or_default(),
            &serde_json::to_string(issues).unwrap_or_default(),
            &serde_json::to_string(&evidence).unwrap_or_default(),
            &serde_json::to_string(&crime.conspirator_names()).unwrap_or_default(),
        );
        let outcome = self.structured(prompt, FABRICATION_SYSTEM_PROMPT).await;

        let Some(fix) = decode::<FixDraft>(&outcome) else {
            debug!("No usable fix returned");
            return fabricated;
        };

        fabricated.alibis.extend(fix.fixed_alibis);
        explain_evidence(crime, &fix.evidence_explanations);
        let offset = fabricated.planted_evidence.len();
        fabricated.planted_evidence.extend(
            fix.additional_planted_evidence
                .into_iter()
                .enumerate()
                .map(|(i, draft)| draft.into_planted(offset + i)),
        );
        fabricated
    }

    /// Innocent people with an apparent motive. Anyone the generator names
    /// who is actually part of the crime is dropped.
    pub async fn additional_suspects(
        &self,
        crime: &CrimeFacts,
        fabricated: &FabricatedFacts,
        count: usize,
    ) -> Vec<Character> {
        let victim = format!("{} ({})", crime.victim.name, crime.victim.occupation);
        let request = GenerationRequest::json(prompts::additional_suspects_prompt(
            count,
            &crime.crime_type,
            &victim,
            &crime.location,
        ));
        let outcome = generate_with_retry(&self.generator, &request, self.generation.max_retries).await;

        let Some(draft) = decode::<SuspectsDraft>(&outcome) else {
            warn!("Suspect generation failed, continuing without red herrings");
            return Vec::new();
        };

        draft
            .suspects
            .into_iter()
            .enumerate()
            .map(|(i, person)| person.into_suspect(i))
            .filter(|s| {
                let guilty = s.name == crime.criminal.name
                    || crime.find_conspirator(&s.name).is_some()
                    || s.name == fabricated.fake_suspect.name;
                if guilty {
                    debug!(suspect = %s.name, "Dropping suspect already in the case");
                }
                !guilty
            })
            .take(count)
            .collect()
    }

    fn is_complex_enough(&self, crime: &CrimeFacts) -> bool {
        crime.conspirators.len() >= self.generation.min_conspirators
            && crime.evidence.len() >= MIN_EVIDENCE
            && crime.timeline.len() >= MIN_TIMELINE_EVENTS
    }

    async fn structured(&self, prompt: String, system: &str) -> GenerationOutcome {
        let request = GenerationRequest::json(prompt).with_system(system);
        generate_with_retry(&self.generator, &request, self.generation.max_retries).await
    }
}

/// Deserialize a structured outcome's payload into `T`.
fn decode<T: DeserializeOwned>(outcome: &GenerationOutcome) -> Option<T> {
    let payload = outcome.payload()?;
    match serde_json::from_value(Value::Object(payload.clone())) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(error = %e, "Generated JSON has the wrong shape");
            None
        }
    }
}

/// Record the cover-story reading of real evidence.
fn explain_evidence(crime: &mut CrimeFacts, explanations: &BTreeMap<String, String>) {
    for evidence in &mut crime.evidence {
        if let Some(explanation) = explanations.get(&evidence.id) {
            let explanation = explanation.trim();
            if !explanation.is_empty() {
                evidence.fabricated_meaning = Some(explanation.to_string());
            }
        }
    }
}

/// The case used when crime generation fails outright.
pub fn fallback_crime(crime_type: &str, setting: &str) -> CrimeFacts {
    let mut criminal = Character::new("David Chen", CharacterRole::Criminal, "CFO")
        .with_motive("Cover up embezzlement");
    criminal.means = Some("Access to the victim's schedule".to_string());
    criminal.opportunity = Some("Late night meeting".to_string());

    let mut timeline = Timeline::new();
    timeline.add_event("8:00 PM", "Victim arrives at the office", "James Wilson", "Office");
    timeline.add_event("9:00 PM", "Crime occurs", "David Chen", "Parking garage");
    timeline.add_event("9:30 PM", "Body discovered", "Alice", "Parking garage");

    let mut footage = Evidence::new("E1", "Security camera footage gap", EvidenceType::Digital, "Security office");
    footage.real_meaning = Some("Footage was deleted by a conspirator".to_string());

    CrimeFacts {
        crime_type: crime_type.to_string(),
        victim: Character::new("James Wilson", CharacterRole::Victim, "Auditor"),
        criminal,
        conspirators: vec![Character::new("Alice", CharacterRole::Conspirator, "Secretary")
            .with_leverage("David knows about her past fraud")
            .with_alibi("Working late on the quarterly report")],
        motive: "Cover up embezzlement".to_string(),
        method: "Staged accident in the parking garage".to_string(),
        timeline,
        evidence: vec![footage],
        location: setting.to_string(),
        coordination_plan: "Synchronized alibis and planted evidence".to_string(),
    }
}

/// A cover story that always validates against `crime`. Every piece of
/// unexplained real evidence is pinned on the framed suspect.
pub fn fallback_fabricated(crime: &mut CrimeFacts) -> FabricatedFacts {
    let taken = |name: &str| {
        name == crime.criminal.name || name == crime.victim.name || crime.find_conspirator(name).is_some()
    };
    let name = FALLBACK_SUSPECTS
        .iter()
        .find(|n| !taken(n))
        .copied()
        .unwrap_or("An unnamed drifter");
    let suspect = Character::new(name, CharacterRole::Suspect, "Former employee")
        .with_motive("Dismissed after a public dispute with the victim");

    let mut fake_timeline = Timeline::new();
    let time = crime
        .timeline
        .events()
        .first()
        .map(|e| e.time.clone())
        .unwrap_or_else(|| "Evening".to_string());
    fake_timeline.add_event(time, format!("{} seen near {}", name, crime.location), name, crime.location.clone());

    let alibis = crime
        .conspirators
        .iter()
        .map(|c| {
            let alibi = c.alibi.clone().unwrap_or_else(|| "Was elsewhere at the time".to_string());
            (c.name.clone(), alibi)
        })
        .collect();

    for evidence in &mut crime.evidence {
        if evidence.fabricated_meaning.is_none() {
            evidence.fabricated_meaning = Some(format!("Points to {}", name));
        }
    }

    FabricatedFacts {
        fake_motive: suspect.motive.clone().unwrap_or_default(),
        fake_suspect: suspect,
        fake_method: crime.method.clone(),
        fake_timeline,
        planted_evidence: Vec::new(),
        alibis,
        cover_story: format!("{} took revenge on {}", name, crime.victim.name),
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PersonDraft {
    name: Option<String>,
    occupation: Option<String>,
    motive: Option<String>,
    means: Option<String>,
    opportunity: Option<String>,
    leverage: Option<String>,
    alibi_provided: Option<String>,
    alibi: Option<String>,
    relationship_to_victim: Option<String>,
    apparent_motive: Option<String>,
    fake_motive: Option<String>,
    fake_means: Option<String>,
    fake_opportunity: Option<String>,
}

impl PersonDraft {
    fn character(&self, role: CharacterRole, default_name: String) -> Character {
        Character::new(
            non_empty(&self.name).unwrap_or(default_name),
            role,
            non_empty(&self.occupation).unwrap_or_else(|| "Unknown".to_string()),
        )
    }

    fn into_suspect(self, index: usize) -> Character {
        let mut suspect = self.character(CharacterRole::Suspect, format!("Suspect_{}", index));
        suspect.motive = non_empty(&self.apparent_motive);
        suspect.alibi = non_empty(&self.alibi);
        suspect.relationship_to_victim = non_empty(&self.relationship_to_victim);
        suspect
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct EventDraft {
    time: Option<String>,
    event: Option<String>,
    actor: Option<String>,
    location: Option<String>,
}

impl EventDraft {
    fn add_to(self, timeline: &mut Timeline) {
        let or_unknown = |v: &Option<String>| non_empty(v).unwrap_or_else(|| "Unknown".to_string());
        timeline.add_event(
            or_unknown(&self.time),
            or_unknown(&self.event),
            or_unknown(&self.actor),
            or_unknown(&self.location),
        );
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct EvidenceDraft {
    id: Option<String>,
    description: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
    location: Option<String>,
    real_meaning: Option<String>,
    fabricated_meaning: Option<String>,
}

impl EvidenceDraft {
    fn evidence(&self, default_id: String) -> Evidence {
        Evidence::new(
            non_empty(&self.id).unwrap_or(default_id),
            non_empty(&self.description).unwrap_or_else(|| "Unknown evidence".to_string()),
            EvidenceType::from_label(self.kind.as_deref().unwrap_or("physical")),
            non_empty(&self.location).unwrap_or_else(|| "Unknown".to_string()),
        )
    }

    /// Steps are left unassigned for [`CaseFile::prepare`] to roll.
    fn into_real(self, index: usize) -> Evidence {
        let mut evidence = self.evidence(format!("E{}", index + 1));
        evidence.real_meaning = non_empty(&self.real_meaning);
        evidence
    }

    fn into_planted(self, index: usize) -> Evidence {
        let mut evidence = self.evidence(format!("PE{}", index + 1));
        evidence.is_planted = true;
        evidence.fabricated_meaning =
            Some(non_empty(&self.fabricated_meaning).unwrap_or_else(|| "Unknown meaning".to_string()));
        evidence
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CrimeDraft {
    crime_type: Option<String>,
    victim: PersonDraft,
    criminal: PersonDraft,
    conspirators: Vec<PersonDraft>,
    motive: Option<String>,
    method: Option<String>,
    timeline: Vec<EventDraft>,
    evidence: Vec<EvidenceDraft>,
    location: Option<String>,
    coordination_plan: Option<String>,
}

impl CrimeDraft {
    fn into_crime(self, requested_type: &str, setting: &str) -> CrimeFacts {
        let victim = self.victim.character(CharacterRole::Victim, "Unknown Victim".to_string());

        let mut criminal = self.criminal.character(CharacterRole::Criminal, "Unknown Criminal".to_string());
        criminal.motive = non_empty(&self.criminal.motive);
        criminal.means = Some(non_empty(&self.criminal.means).unwrap_or_else(|| "Had the means".to_string()));
        criminal.opportunity =
            Some(non_empty(&self.criminal.opportunity).unwrap_or_else(|| "Had the opportunity".to_string()));

        let conspirators = self
            .conspirators
            .iter()
            .enumerate()
            .map(|(i, c)| {
                let mut conspirator = c.character(CharacterRole::Conspirator, format!("Conspirator_{}", i));
                conspirator.leverage = non_empty(&c.leverage);
                conspirator.alibi = non_empty(&c.alibi_provided).or_else(|| non_empty(&c.alibi));
                conspirator
            })
            .collect();

        let mut timeline = Timeline::new();
        for event in self.timeline {
            event.add_to(&mut timeline);
        }

        let evidence = self
            .evidence
            .into_iter()
            .enumerate()
            .map(|(i, e)| e.into_real(i))
            .collect();

        let motive = criminal
            .motive
            .clone()
            .or_else(|| non_empty(&self.motive))
            .unwrap_or_else(|| "Unknown motive".to_string());

        CrimeFacts {
            crime_type: non_empty(&self.crime_type).unwrap_or_else(|| requested_type.to_string()),
            victim,
            criminal,
            conspirators,
            motive,
            method: non_empty(&self.method).unwrap_or_else(|| "Unknown method".to_string()),
            timeline,
            evidence,
            location: non_empty(&self.location).unwrap_or_else(|| setting.to_string()),
            coordination_plan: non_empty(&self.coordination_plan).unwrap_or_default(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FabricationDraft {
    fake_suspect: PersonDraft,
    fake_motive: Option<String>,
    fake_method: Option<String>,
    fake_timeline: Vec<EventDraft>,
    planted_evidence: Vec<EvidenceDraft>,
    alibis: BTreeMap<String, String>,
    cover_story: Option<String>,
    evidence_explanations: BTreeMap<String, String>,
}

impl FabricationDraft {
    fn into_fabricated(self) -> FabricatedFacts {
        let mut fake_suspect = self
            .fake_suspect
            .character(CharacterRole::Suspect, "Unknown Suspect".to_string());
        fake_suspect.motive = non_empty(&self.fake_suspect.fake_motive).or_else(|| non_empty(&self.fake_suspect.motive));
        fake_suspect.means = non_empty(&self.fake_suspect.fake_means);
        fake_suspect.opportunity = non_empty(&self.fake_suspect.fake_opportunity);

        let mut fake_timeline = Timeline::new();
        for event in self.fake_timeline {
            event.add_to(&mut fake_timeline);
        }

        FabricatedFacts {
            fake_motive: fake_suspect
                .motive
                .clone()
                .or_else(|| non_empty(&self.fake_motive))
                .unwrap_or_else(|| "Unknown motive".to_string()),
            fake_suspect,
            fake_method: non_empty(&self.fake_method).unwrap_or_else(|| "Unknown method".to_string()),
            fake_timeline,
            planted_evidence: self
                .planted_evidence
                .into_iter()
                .enumerate()
                .map(|(i, e)| e.into_planted(i))
                .collect(),
            alibis: self.alibis,
            cover_story: non_empty(&self.cover_story).unwrap_or_else(|| "No cover story provided".to_string()),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FixDraft {
    fixed_alibis: BTreeMap<String, String>,
    evidence_explanations: BTreeMap<String, String>,
    additional_planted_evidence: Vec<EvidenceDraft>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SuspectsDraft {
    suspects: Vec<PersonDraft>,
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_crime_draft_fills_gaps() {
        let draft: CrimeDraft = serde_json::from_value(json!({
            "victim": {"name": "Ada"},
            "criminal": {"name": "Boris", "motive": "greed"},
            "conspirators": [{"name": "  ", "alibi_provided": "at the opera"}],
            "evidence": [{"description": "a glove", "type": "Digital"}]
        }))
        .unwrap();
        let crime = draft.into_crime("heist", "casino");

        assert_eq!(crime.crime_type, "heist");
        assert_eq!(crime.location, "casino");
        assert_eq!(crime.motive, "greed");
        assert_eq!(crime.victim.occupation, "Unknown");
        assert_eq!(crime.conspirators[0].name, "Conspirator_0");
        assert_eq!(crime.conspirators[0].alibi.as_deref(), Some("at the opera"));
        assert_eq!(crime.evidence[0].id, "E1");
        assert_eq!(crime.evidence[0].evidence_type, EvidenceType::Digital);
        assert_eq!(crime.evidence[0].steps_required, 0);
        assert!(crime.criminal.has_means_motive_opportunity());
    }

    #[test]
    fn test_fallback_cover_story_validates() {
        let mut crime = fallback_crime("murder", "law firm");
        let fabricated = fallback_fabricated(&mut crime);

        let report = ConsistencyValidator::new().validate(&crime, &fabricated);
        assert!(report.is_valid(), "{:?}", report.issues);
        assert_eq!(crime.location, "law firm");
        assert_eq!(fabricated.fake_suspect.name, "Marcus Reed");
        assert!(crime.evidence[0].is_collision_candidate());
    }

    #[test]
    fn test_fallback_suspect_avoids_case_names() {
        let mut crime = fallback_crime("murder", "law firm");
        crime.conspirators.push(Character::new("Marcus Reed", CharacterRole::Conspirator, "guard"));
        let fabricated = fallback_fabricated(&mut crime);
        assert_eq!(fabricated.fake_suspect.name, "Thomas Grey");
    }

    #[test]
    fn test_explanations_ignore_unknown_and_blank() {
        let mut crime = fallback_crime("murder", "bank");
        let mut explanations = BTreeMap::new();
        explanations.insert("E9".to_string(), "nothing".to_string());
        explanations.insert("E1".to_string(), "   ".to_string());
        explain_evidence(&mut crime, &explanations);
        assert_eq!(crime.evidence[0].fabricated_meaning, None);

        explanations.insert("E1".to_string(), "a routine outage".to_string());
        explain_evidence(&mut crime, &explanations);
        assert_eq!(crime.evidence[0].fabricated_meaning.as_deref(), Some("a routine outage"));
    }
}
