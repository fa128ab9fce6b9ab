use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

use super::{
    seed_discovery_paths, Character, ConsistencyValidator, CrimeFacts, DiscoveryPath, FabricatedFacts,
    ValidationReport,
};
use crate::error::{CaseError, CaseResult};

/// Both fact layers of a case as produced by the backstory stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseFile {
    pub crime: CrimeFacts,
    pub fabricated: FabricatedFacts,
    /// Seeded by [`CaseFile::prepare`] when the file carries none
    #[serde(default)]
    pub discovery_paths: Vec<DiscoveryPath>,
    /// Innocent people with an apparent motive, kept as red herrings
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suspects: Vec<Character>,
}

impl CaseFile {
    /// Read a case from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> CaseResult<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| CaseError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let case: CaseFile = serde_json::from_str(&raw)?;
        info!(
            path = %path.display(),
            conspirators = case.crime.conspirators.len(),
            evidence = case.crime.evidence.len(),
            "Case loaded"
        );
        Ok(case)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> CaseResult<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).map_err(|source| CaseError::Io {
            path: path.display().to_string(),
            source,
        })
    }

    /// Fill in what the backstory stage may leave unassigned: evidence step
    /// counts and the initial discovery paths.
    pub fn prepare<R: Rng + ?Sized>(&mut self, initial_paths: usize, rng: &mut R) {
        for evidence in &mut self.crime.evidence {
            if evidence.steps_required == 0 {
                evidence.steps_required = evidence.evidence_type.roll_steps(rng);
                debug!(evidence = %evidence.id, steps = evidence.steps_required, "Assigned investigation steps");
            }
        }
        if self.discovery_paths.is_empty() {
            self.discovery_paths = seed_discovery_paths(&self.crime, initial_paths, rng);
        }
    }

    pub fn validate(&self) -> ValidationReport {
        let mut report = ConsistencyValidator::new().validate(&self.crime, &self.fabricated);
        for suspect in &self.suspects {
            let guilty = suspect.name == self.crime.criminal.name
                || self.crime.conspirators.iter().any(|c| c.name == suspect.name);
            if guilty {
                report
                    .issues
                    .push(format!("Innocent suspect {} is part of the real crime", suspect.name));
            }
        }
        report
    }

    /// Validate and turn any issues into an error.
    pub fn ensure_valid(&self) -> CaseResult<()> {
        let report = self.validate();
        if report.is_valid() {
            Ok(())
        } else {
            Err(CaseError::Invalid { issues: report.issues })
        }
    }
}
