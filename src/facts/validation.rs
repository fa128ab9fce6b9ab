use serde::Serialize;
use std::collections::BTreeSet;
use tracing::debug;

use super::{CharacterRole, CrimeFacts, FabricatedFacts};

/// Outcome of checking a fabricated narrative against the real crime.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidationReport {
    pub issues: Vec<String>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Checks that the two fact layers fit together.
///
/// Violations are generation defects: they are reported so the caller can
/// regenerate or warn, never raised.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsistencyValidator;

impl ConsistencyValidator {
    pub fn new() -> Self {
        Self
    }

    pub fn validate(&self, crime: &CrimeFacts, fabricated: &FabricatedFacts) -> ValidationReport {
        let mut issues = Vec::new();

        Self::check_evidence_coverage(crime, fabricated, &mut issues);
        if fabricated.fake_timeline.is_empty() {
            issues.push("Fabricated timeline is empty".to_string());
        }
        for conspirator in &crime.conspirators {
            if fabricated.alibi_for(&conspirator.name).is_none() {
                issues.push(format!("Missing alibi for conspirator: {}", conspirator.name));
            }
        }
        Self::check_identities(crime, fabricated, &mut issues);

        debug!(issues = issues.len(), "Consistency validation finished");
        ValidationReport { issues }
    }

    fn check_evidence_coverage(crime: &CrimeFacts, fabricated: &FabricatedFacts, issues: &mut Vec<String>) {
        let planted: BTreeSet<&str> = fabricated
            .planted_evidence
            .iter()
            .filter(|e| e.fabricated_meaning.is_some())
            .map(|e| e.id.as_str())
            .collect();

        let uncovered: Vec<&str> = crime
            .evidence
            .iter()
            .filter(|e| e.fabricated_meaning.is_none() && !planted.contains(e.id.as_str()))
            .map(|e| e.id.as_str())
            .collect();

        if !uncovered.is_empty() {
            issues.push(format!(
                "Real evidence not explained in fabricated narrative: {}",
                uncovered.join(", ")
            ));
        }
    }

    fn check_identities(crime: &CrimeFacts, fabricated: &FabricatedFacts, issues: &mut Vec<String>) {
        let fake = &fabricated.fake_suspect.name;

        if crime.criminal.role != CharacterRole::Criminal {
            issues.push(format!(
                "Criminal {} does not have the criminal role",
                crime.criminal.name
            ));
        }
        if fake == &crime.criminal.name {
            issues.push("Fake suspect is the same as the real criminal".to_string());
        }
        if crime.conspirators.iter().any(|c| &c.name == fake) {
            issues.push(format!("Fake suspect {} is also a conspirator", fake));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facts::{Character, Evidence, EvidenceType, Timeline};
    use std::collections::BTreeMap;

    fn crime() -> CrimeFacts {
        CrimeFacts {
            crime_type: "murder".to_string(),
            victim: Character::new("Vic", CharacterRole::Victim, "auditor"),
            criminal: Character::new("David", CharacterRole::Criminal, "CFO"),
            conspirators: vec![Character::new("Alice", CharacterRole::Conspirator, "secretary")],
            motive: "money".to_string(),
            method: "poison".to_string(),
            timeline: Timeline::new(),
            evidence: vec![
                Evidence::new("E1", "cup", EvidenceType::Physical, "office").with_meanings("poisoned", "tea"),
                Evidence::new("E2", "email", EvidenceType::Digital, "server"),
            ],
            location: "office".to_string(),
            coordination_plan: String::new(),
        }
    }

    fn fabricated() -> FabricatedFacts {
        let mut fake_timeline = Timeline::new();
        fake_timeline.add_event("8pm", "Eric leaves", "Eric", "lobby");
        let mut alibis = BTreeMap::new();
        alibis.insert("Alice".to_string(), "At the gym".to_string());
        FabricatedFacts {
            fake_suspect: Character::new("Eric", CharacterRole::Suspect, "ex-employee"),
            fake_motive: "revenge".to_string(),
            fake_method: "poison".to_string(),
            fake_timeline,
            planted_evidence: vec![Evidence::new("E2", "email", EvidenceType::Digital, "server")
                .with_meanings("sent by David", "sent by Eric")],
            alibis,
            cover_story: "Eric did it".to_string(),
        }
    }

    #[test]
    fn test_consistent_case_is_valid() {
        let report = ConsistencyValidator::new().validate(&crime(), &fabricated());
        assert!(report.is_valid(), "{:?}", report.issues);
    }

    #[test]
    fn test_reports_every_violation() {
        let mut crime = crime();
        crime.evidence.push(Evidence::new("E3", "glove", EvidenceType::Physical, "garage"));
        crime.conspirators.push(Character::new("Eric", CharacterRole::Conspirator, "driver"));
        let mut fabricated = fabricated();
        fabricated.fake_timeline = Timeline::new();

        let report = ConsistencyValidator::new().validate(&crime, &fabricated);

        assert!(!report.is_valid());
        assert!(report.issues.iter().any(|i| i.contains("E3")));
        assert!(report.issues.iter().any(|i| i == "Fabricated timeline is empty"));
        assert!(report.issues.iter().any(|i| i == "Missing alibi for conspirator: Eric"));
        assert!(report.issues.iter().any(|i| i.contains("also a conspirator")));
    }

    #[test]
    fn test_fake_suspect_cannot_be_criminal() {
        let mut fabricated = fabricated();
        fabricated.fake_suspect.name = "David".to_string();
        let report = ConsistencyValidator::new().validate(&crime(), &fabricated);
        assert_eq!(report.issues, vec!["Fake suspect is the same as the real criminal".to_string()]);
    }
}
