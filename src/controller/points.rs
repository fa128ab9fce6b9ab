//! Plot point generators for each branch of the loop.

use rand::distributions::WeightedIndex;
use rand::prelude::*;
use tracing::{debug, info, warn};

use super::context::{crime_summary, format_action_history, investigation_agenda, urgency_note};
use super::SuspenseController;
use crate::facts::{CrimeFacts, DiscoveryPath, FabricatedFacts};
use crate::generator::{generate_text, generate_with_retry, GenerationOutcome, GenerationRequest, Generator};
use crate::prompts::{self, ActionPromptContext, STORY_SYSTEM_PROMPT};
use crate::state::{DetectiveProfile, PlotPoint, StoryState};

const FALLBACK_ACTION: &str = "Continue investigation";
const FALLBACK_OBSTACLE: &str = "encounters resistance";
const FALLBACK_INTERVENTION: &str = "intervenes to misdirect";
const FALLBACK_RESOLUTION: &str = "The investigation reaches its conclusion";
const OBSTACLE_PROBABILITY: f64 = 0.4;
const DEFAULT_ALIBI: &str = "claims to have been elsewhere";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProgressKind {
    Evidence,
    Alibi,
    Generic,
}

/// What a progress sub-branch produced.
struct Progress {
    description: String,
    detective_learns: String,
    reader_revelation: Option<String>,
}

impl<G: Generator, R: Rng + Send> SuspenseController<G, R> {
    fn request(&self, prompt: String) -> GenerationRequest {
        GenerationRequest::json(prompt).with_system(STORY_SYSTEM_PROMPT)
    }

    async fn structured(&self, prompt: String) -> GenerationOutcome {
        let request = self.request(prompt);
        generate_with_retry(&self.generator, &request, self.generation.max_retries).await
    }

    pub(super) async fn detective_profile(&self, crime: &CrimeFacts) -> DetectiveProfile {
        let summary = format!(
            "{} involving {} ({}) at {}",
            crime.crime_type, crime.victim.name, crime.victim.occupation, crime.location
        );
        let outcome = self
            .structured(prompts::detective_stakes_prompt(&summary, &crime.location))
            .await;

        if !outcome.is_structured() {
            warn!("Detective profile generation failed, using fallback profile");
            return DetectiveProfile::fallback();
        }

        DetectiveProfile {
            name: outcome.field_or("name", "Detective Morgan"),
            background: outcome.field_or("background", "Veteran homicide detective"),
            personal_stakes: outcome.field_or("personal_stakes", "Career on the line after a recent failure"),
            dire_consequence: outcome.field_or(
                "dire_consequence",
                "Will be forced off the case and an innocent person convicted",
            ),
            deadline_reason: outcome.field_or("deadline_reason", "Key evidence will be destroyed in 72 hours"),
        }
    }

    pub(super) async fn detective_action(
        &self,
        state: &StoryState,
        crime: &CrimeFacts,
        fabricated: &FabricatedFacts,
    ) -> String {
        let knowledge = if state.detective_knowledge.is_empty() {
            "Nothing yet".to_string()
        } else {
            state
                .detective_knowledge
                .iter()
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join("; ")
        };
        let open = state.open_paths();
        let leads = if open.is_empty() {
            "No clear leads remaining".to_string()
        } else {
            open.iter()
                .map(|p| p.description.as_str())
                .collect::<Vec<_>>()
                .join("; ")
        };
        let summary = crime_summary(crime);
        let history = format_action_history(&state.action_history);
        let agenda = investigation_agenda(state, crime, fabricated);
        let profile = &state.detective_profile;

        let prompt = prompts::detective_action_prompt(&ActionPromptContext {
            crime_summary: &summary,
            detective_name: &profile.name,
            detective_stakes: &profile.personal_stakes,
            dire_consequence: &profile.dire_consequence,
            deadline_reason: &profile.deadline_reason,
            time_remaining: state.time_remaining,
            total_time: state.total_time,
            success_percent: (state.success_probability() * 100.0).round() as u32,
            accumulated_actions: &history,
            investigation_agenda: &agenda,
            detective_knowledge: &knowledge,
            current_leads: &leads,
            closed_paths: state.discovery_paths.len() - open.len(),
            total_paths: state.discovery_paths.len(),
            previous_actions: state.action_history.len(),
            urgency_note: urgency_note(state),
        });

        let outcome = self.structured(prompt).await;
        if let Some(action) = outcome.field_str("action") {
            return action.to_string();
        }
        match outcome.first_line() {
            Some(line) => line.to_string(),
            None => {
                warn!("No detective action generated, using fallback");
                FALLBACK_ACTION.to_string()
            }
        }
    }

    /// A conspirator steps in. Falls back to a standard point when the
    /// threatened name is not a conspirator of this case.
    #[allow(clippy::too_many_arguments)]
    pub(super) async fn intervention_point(
        &mut self,
        id: u32,
        action: &str,
        vulnerable_point: &str,
        threatened: &str,
        state: &mut StoryState,
        crime: &CrimeFacts,
        fabricated: &FabricatedFacts,
    ) -> PlotPoint {
        let Some(conspirator) = crime.find_conspirator(threatened) else {
            warn!(threatened, "Threatened conspirator not in case, treating as progress");
            return self.standard_point(id, action, state, crime, fabricated).await;
        };

        let situation = format!(
            "The detective is {}.\nThis threatens to expose: {}.\nIf the detective continues, they might discover the truth about the crime.",
            action, vulnerable_point
        );
        let outcome = self
            .structured(prompts::intervention_prompt(
                &situation,
                &conspirator.name,
                &conspirator.occupation,
                conspirator.leverage.as_deref().unwrap_or("position of trust"),
                vulnerable_point,
                state.time_remaining,
                state.total_time,
            ))
            .await;
        let intervention = outcome.field_or("action", FALLBACK_INTERVENTION);
        if let Some(effectiveness) = outcome.field_str("effectiveness") {
            debug!(conspirator = %conspirator.name, effectiveness, "Intervention framed");
        }

        let path_to_close = path_for_intervention(state, &conspirator.name, vulnerable_point);

        let suspense = self.raise_suspense(state.suspense_level, 1, 2);
        state.adjust_probability(-self.rng.gen_range(0.06..0.12));

        info!(
            plot_point = id,
            conspirator = %conspirator.name,
            vulnerable_point,
            closes = ?path_to_close,
            "Conspirator intervenes"
        );

        PlotPoint {
            id,
            description: format!("Detective {} but {} {}", action, conspirator.name, intervention),
            detective_action: Some(action.to_string()),
            conspirator_intervention: Some(format!("{}: {}", conspirator.name, intervention)),
            obstacle: None,
            reader_revelation: Some(format!(
                "The reader sees {} actively protecting the conspiracy",
                conspirator.name
            )),
            detective_learns: Some(format!("Detective accepts {}'s explanation", conspirator.name)),
            paths_closed: path_to_close.into_iter().collect(),
            suspense_level: suspense,
            is_collision: true,
        }
    }

    /// No collision: either an obstacle or progress inside the cover story.
    pub(super) async fn standard_point(
        &mut self,
        id: u32,
        action: &str,
        state: &mut StoryState,
        crime: &CrimeFacts,
        fabricated: &FabricatedFacts,
    ) -> PlotPoint {
        let mut point = PlotPoint::new(id, String::new(), state.suspense_level);
        point.detective_action = Some(action.to_string());

        if self.rng.gen_bool(OBSTACLE_PROBABILITY) {
            let current = format!("Investigation of {}", fabricated.fake_suspect.name);
            let outcome = self
                .structured(prompts::obstacle_prompt(action, &current, state.time_remaining, state.total_time))
                .await;
            let obstacle = outcome.field_str("description").map(str::to_string).unwrap_or_else(|| {
                debug!(plot_point = id, "Obstacle text missing, using fallback");
                FALLBACK_OBSTACLE.to_string()
            });

            point.description = format!("Detective {} but {}", action, obstacle);
            point.obstacle = Some(obstacle);
            state.adjust_probability(-self.rng.gen_range(0.02..0.05));
            return point;
        }

        let progress = match self.pick_progress(state) {
            ProgressKind::Evidence => self.evidence_progress(action, state, crime, fabricated),
            ProgressKind::Alibi => self.alibi_progress(action, state, crime),
            ProgressKind::Generic => generic_progress(action, fabricated),
        };
        point.description = progress.description;
        point.detective_learns = Some(progress.detective_learns);
        point.reader_revelation = progress.reader_revelation;

        if self.rng.gen_bool(self.suspense.path_close_probability.clamp(0.0, 1.0)) {
            if let Some(path) = state.open_paths().choose(&mut self.rng) {
                point.paths_closed.push(path.id.clone());
            }
        }

        state.adjust_probability(self.rng.gen_range(0.01..0.03));
        point.suspense_level = self.raise_suspense(state.suspense_level, 0, 1);
        point
    }

    /// Weighted draw: evidence 3 while any remains, alibi 2 while any is
    /// unverified, generic 1 always.
    fn pick_progress(&mut self, state: &StoryState) -> ProgressKind {
        let mut options: Vec<(ProgressKind, u32)> = Vec::with_capacity(3);
        if !state.undiscovered_evidence.is_empty() {
            options.push((ProgressKind::Evidence, 3));
        }
        if !state.unverified_alibis().is_empty() {
            options.push((ProgressKind::Alibi, 2));
        }
        options.push((ProgressKind::Generic, 1));

        match WeightedIndex::new(options.iter().map(|(_, w)| *w)) {
            Ok(dist) => options[dist.sample(&mut self.rng)].0,
            Err(_) => ProgressKind::Generic,
        }
    }

    fn evidence_progress(
        &mut self,
        action: &str,
        state: &mut StoryState,
        crime: &CrimeFacts,
        fabricated: &FabricatedFacts,
    ) -> Progress {
        let in_progress: Vec<&String> = state
            .undiscovered_evidence
            .iter()
            .filter(|id| state.evidence_progress.get(*id).copied().unwrap_or(0) > 0)
            .collect();
        let pool: Vec<&String> = if in_progress.is_empty() {
            state.undiscovered_evidence.iter().collect()
        } else {
            in_progress
        };

        let evidence = pool
            .choose(&mut self.rng)
            .and_then(|id| crime.find_evidence(id));
        let Some(evidence) = evidence else {
            return generic_progress_with(
                format!("Detective {} and finds corroborating details", action),
                fabricated,
            );
        };

        let required = evidence.steps();
        let done = state.advance_evidence(&evidence.id, required);

        if done >= required {
            let fabricated_meaning = evidence
                .fabricated_meaning
                .clone()
                .unwrap_or_else(|| format!("evidence implicating {}", fabricated.fake_suspect.name));
            info!(evidence = %evidence.id, steps = required, "Evidence fully obtained");
            Progress {
                description: format!(
                    "Detective {} and fully obtains {} ({} steps complete)",
                    action, evidence.description, required
                ),
                detective_learns: format!(
                    "Fully obtained {} at {}: {}",
                    evidence.description, evidence.location, fabricated_meaning
                ),
                reader_revelation: Some(format!(
                    "Reader knows the true meaning: {}",
                    evidence.real_meaning.as_deref().unwrap_or("unknown")
                )),
            }
        } else {
            Progress {
                description: format!(
                    "Detective {} and makes partial progress examining {} ({}/{})",
                    action, evidence.description, done, required
                ),
                detective_learns: format!(
                    "Partial progress on {} ({}/{} steps)",
                    evidence.description, done, required
                ),
                reader_revelation: Some(
                    "Reader knows this evidence has deeper significance the detective hasn't uncovered yet"
                        .to_string(),
                ),
            }
        }
    }

    fn alibi_progress(&mut self, action: &str, state: &mut StoryState, crime: &CrimeFacts) -> Progress {
        let name = state
            .unverified_alibis()
            .choose(&mut self.rng)
            .map(|n| n.to_string());
        let Some(name) = name else {
            return Progress {
                description: format!("Detective {} and reviews case notes", action),
                detective_learns: "All alibis have been checked".to_string(),
                reader_revelation: None,
            };
        };

        state.challenge_alibi(&name);
        let alibi = crime
            .find_conspirator(&name)
            .and_then(|c| c.alibi.as_deref())
            .unwrap_or(DEFAULT_ALIBI);
        debug!(conspirator = %name, "Alibi challenged");

        Progress {
            description: format!("Detective {} and verifies {}'s alibi", action, name),
            detective_learns: format!(
                "Checked {}'s alibi: \"{}\", appears consistent on the surface",
                name, alibi
            ),
            reader_revelation: Some(format!(
                "Reader knows {}'s alibi is fabricated; they were actually involved in the crime",
                name
            )),
        }
    }

    /// The terminal point. Its structured fields never depend on the
    /// generator.
    pub(super) async fn resolution_point(
        &self,
        id: u32,
        state: &StoryState,
        crime: &CrimeFacts,
        fabricated: &FabricatedFacts,
    ) -> PlotPoint {
        let profile = &state.detective_profile;
        let profile_block = format!(
            "Detective {} has been driven by: {}\nWhat's at stake: {}\nTime remaining: {} of {} units\nEstimated success chance: {:.0}%",
            profile.name,
            profile.personal_stakes,
            profile.dire_consequence,
            state.time_remaining,
            state.total_time,
            state.success_probability() * 100.0
        );
        let prompt = prompts::resolution_prompt(
            &crime.crime_type,
            &crime.criminal.name,
            &fabricated.fake_suspect.name,
            &profile_block,
            state.action_history.len(),
        );
        let request = GenerationRequest::text(prompt)
            .with_system(STORY_SYSTEM_PROMPT)
            .with_max_tokens(512);
        let outcome = generate_text(&self.generator, &request).await;
        let description = if outcome.text().is_empty() {
            warn!(plot_point = id, "Resolution text missing, using fallback");
            FALLBACK_RESOLUTION.to_string()
        } else {
            outcome.text().to_string()
        };

        PlotPoint {
            id,
            description,
            detective_action: Some("Reviews all evidence and makes final determination".to_string()),
            conspirator_intervention: None,
            obstacle: None,
            reader_revelation: Some(format!(
                "The reader watches as the truth remains hidden, {}'s secret safe",
                crime.criminal.name
            )),
            detective_learns: Some(format!(
                "Concludes {} is the primary suspect",
                fabricated.fake_suspect.name
            )),
            paths_closed: Vec::new(),
            suspense_level: self.suspense.max_level,
            is_collision: false,
        }
    }

    /// Apply a finished point to the state, then the per-turn decay and the
    /// chance of a fresh lead.
    pub(super) fn update_state(&mut self, state: &mut StoryState, point: &PlotPoint) {
        state.suspense_level = point.suspense_level;

        let closed_by = format!("plot_point_{}", point.id);
        for path_id in &point.paths_closed {
            if state.close_path(path_id, &closed_by) {
                state.adjust_probability(-self.rng.gen_range(0.03..0.07));
            }
        }

        if let Some(learned) = &point.detective_learns {
            state.learn(learned.clone());
        }
        if let Some(revelation) = &point.reader_revelation {
            state.reveal_to_reader(revelation);
        }

        state.adjust_probability(-0.01);

        if self.rng.gen_bool(self.suspense.new_path_probability.clamp(0.0, 1.0)) {
            let path = DiscoveryPath::new(
                format!("path_new_{}", state.discovery_paths.len()),
                "A new potential lead emerges",
                self.rng.gen_range(6..=9),
            );
            info!(path = %path.id, difficulty = path.difficulty, "New lead emerges");
            state.discovery_paths.push(path);
            state.adjust_probability(0.02);
        }
    }

    fn raise_suspense(&mut self, current: u8, min_step: u8, max_step: u8) -> u8 {
        current
            .saturating_add(self.rng.gen_range(min_step..=max_step))
            .min(self.suspense.max_level)
    }
}

/// The path an intervention shuts: the conspirator's own path first, else
/// one whose description mentions the threatened point.
pub(super) fn path_for_intervention(
    state: &StoryState,
    conspirator: &str,
    vulnerable_point: &str,
) -> Option<String> {
    let vulnerable_lower = vulnerable_point.to_lowercase();
    let mut open = state.discovery_paths.iter().filter(|p| p.is_open());

    open.clone()
        .find(|p| p.involves_character.as_deref() == Some(conspirator))
        .or_else(|| {
            open.find(|p| {
                !vulnerable_lower.is_empty() && p.description.to_lowercase().contains(&vulnerable_lower)
            })
        })
        .map(|p| p.id.clone())
}

fn generic_progress(action: &str, fabricated: &FabricatedFacts) -> Progress {
    let learns = format!("Evidence pointing toward {}", fabricated.fake_suspect.name);
    Progress {
        description: format!("Detective {} and finds {}", action, learns),
        detective_learns: learns,
        reader_revelation: None,
    }
}

fn generic_progress_with(description: String, fabricated: &FabricatedFacts) -> Progress {
    Progress {
        description,
        detective_learns: format!("Evidence pointing toward {}", fabricated.fake_suspect.name),
        reader_revelation: None,
    }
}
