//! Prompt context rendered from story state.

use crate::facts::{CrimeFacts, FabricatedFacts};
use crate::state::{ActionRecord, AlibiStatus, StoryState};

/// One-line summary of the crime.
pub fn crime_summary(crime: &CrimeFacts) -> String {
    format!(
        "{} - victim: {} ({}) at {}",
        crime.crime_type, crime.victim.name, crime.victim.occupation, crime.location
    )
}

/// Every previous action and what came of it.
pub fn format_action_history(history: &[ActionRecord]) -> String {
    if history.is_empty() {
        return "No actions taken yet. This is the start of the investigation.".to_string();
    }

    history
        .iter()
        .enumerate()
        .map(|(i, record)| {
            let mut entry = format!("Action {}: {}\n  -> Outcome: {}", i + 1, record.action, record.outcome);
            if record.was_blocked {
                if let Some(by) = &record.blocked_by {
                    entry.push_str(&format!("\n  -> [BLOCKED] {}", by));
                }
            }
            if let Some(obstacle) = &record.obstacle {
                entry.push_str(&format!("\n  -> [OBSTACLE] {}", obstacle));
            }
            if let Some(learned) = &record.detective_learned {
                entry.push_str(&format!("\n  -> Detective learned: {}", learned));
            }
            entry
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Countdown pressure, keyed on the share of time left.
pub fn urgency_note(state: &StoryState) -> &'static str {
    let ratio = state.time_ratio();
    if ratio <= 0.15 {
        "CRITICAL: Almost no time left! The detective is desperate and must act decisively or accept failure."
    } else if ratio <= 0.3 {
        "URGENT: Time is running dangerously low. The detective feels the pressure mounting with every passing hour."
    } else if ratio <= 0.5 {
        "The clock is ticking. The detective is increasingly aware that time is not on their side."
    } else {
        "The investigation is underway. Time pressure is present but manageable for now."
    }
}

/// Concrete menu of evidence, alibis and suspects for the next action.
pub fn investigation_agenda(state: &StoryState, crime: &CrimeFacts, fabricated: &FabricatedFacts) -> String {
    let mut lines = vec!["EVIDENCE TO INVESTIGATE:".to_string()];
    for id in &state.undiscovered_evidence {
        let Some(evidence) = crime.find_evidence(id) else {
            continue;
        };
        let done = state.evidence_progress.get(id).copied().unwrap_or(0);
        if done > 0 {
            lines.push(format!(
                "  - [{}] {} at {} [{}/{} steps done, needs more work]",
                id,
                evidence.description,
                evidence.location,
                done,
                evidence.steps()
            ));
        } else {
            lines.push(format!(
                "  - [{}] {} at {} [requires {} step(s)]",
                id,
                evidence.description,
                evidence.location,
                evidence.steps()
            ));
        }
    }
    if state.undiscovered_evidence.is_empty() {
        lines.push("  All known evidence has been examined.".to_string());
    }

    lines.push(String::new());
    lines.push("ALIBIS TO VERIFY:".to_string());
    for (name, status) in &state.alibi_status {
        if let Some(conspirator) = crime.find_conspirator(name) {
            let status = match status {
                AlibiStatus::Unverified => "unverified",
                AlibiStatus::Challenged => "challenged",
            };
            lines.push(format!(
                "  - {} ({}): \"{}\" [status: {}]",
                name,
                conspirator.occupation,
                conspirator.alibi.as_deref().unwrap_or("claims to have been elsewhere"),
                status
            ));
        }
    }

    lines.push(String::new());
    lines.push("KNOWN SUSPECTS:".to_string());
    lines.push(format!(
        "  - Primary suspect: {} ({}), alleged motive: {}",
        fabricated.fake_suspect.name, fabricated.fake_suspect.occupation, fabricated.fake_motive
    ));

    lines.push(String::new());
    lines.push(format!("CRIME SCENE: {}", crime.location));
    lines.push(format!("CRIME TYPE: {}", crime.crime_type));

    lines.join("\n")
}
