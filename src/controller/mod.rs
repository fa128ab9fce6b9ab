//! Suspense meta-controller.
//!
//! Runs the investigation as an adversarial loop: each iteration asks the
//! generator for the detective's next move, checks it for a collision with
//! the truth, and lets either a conspirator, an obstacle or a small win
//! shape the resulting plot point. The run always ends with exactly one
//! resolution point in which the cover story holds.
//!
//! All randomness comes from the controller's own seeded generator, so two
//! runs with the same seed and the same generator replies make the same
//! structural decisions.

mod context;
mod points;
mod revision;

pub use context::{crime_summary, format_action_history, investigation_agenda, urgency_note};

use rand::Rng;
use tracing::info;

use crate::collision::CollisionDetector;
use crate::config::{GenerationConfig, SuspenseConfig};
use crate::facts::{CrimeFacts, DiscoveryPath, FabricatedFacts};
use crate::generator::Generator;
use crate::state::{ActionRecord, PlotPoint, ResolutionReason, StoryState};

/// Orchestrates one story generation run at a time.
pub struct SuspenseController<G, R> {
    generator: G,
    rng: R,
    detector: CollisionDetector,
    generation: GenerationConfig,
    suspense: SuspenseConfig,
}

impl<G: Generator, R: Rng + Send> SuspenseController<G, R> {
    pub fn new(generator: G, generation: GenerationConfig, suspense: SuspenseConfig, rng: R) -> Self {
        Self {
            detector: CollisionDetector::new(suspense.collision_check_sensitivity),
            generator,
            rng,
            generation,
            suspense,
        }
    }

    pub fn generator(&self) -> &G {
        &self.generator
    }

    /// Generate the full investigation.
    ///
    /// Never fails: every generator defect has a local fallback, so the
    /// returned sequence is always complete and ends in a resolution point.
    pub async fn generate_story(
        &mut self,
        crime: &CrimeFacts,
        fabricated: &FabricatedFacts,
        discovery_paths: Vec<DiscoveryPath>,
    ) -> (Vec<PlotPoint>, StoryState) {
        info!(
            conspirators = crime.conspirators.len(),
            evidence = crime.evidence.len(),
            paths = discovery_paths.len(),
            "Starting suspense meta-controller"
        );

        let profile = self.detective_profile(crime).await;
        info!(
            detective = %profile.name,
            stakes = %profile.personal_stakes,
            deadline = %profile.deadline_reason,
            "Detective profile ready"
        );

        let mut state = StoryState::new(
            crime,
            discovery_paths,
            profile,
            self.suspense.initial_level,
            self.generation.total_time(),
        );
        let mut plot_points: Vec<PlotPoint> = Vec::new();
        let mut iteration: u32 = 0;

        loop {
            iteration += 1;
            state.tick();
            info!(
                plot_point = iteration,
                time_remaining = state.time_remaining,
                total_time = state.total_time,
                success_probability = state.success_probability(),
                "Generating plot point"
            );

            if let Some(reason) = self.termination(&state, plot_points.len(), iteration) {
                info!(plot_point = iteration, reason = ?reason, "Entering resolution");
                state.resolve(reason);
                let resolution = self.resolution_point(iteration, &state, crime, fabricated).await;
                if let Some(revelation) = &resolution.reader_revelation {
                    state.reveal_to_reader(revelation);
                }
                if let Some(learned) = &resolution.detective_learns {
                    state.learn(learned.clone());
                }
                state.suspense_level = resolution.suspense_level;
                plot_points.push(resolution);
                break;
            }

            let action = self.detective_action(&state, crime, fabricated).await;

            let collision = {
                let open_paths = state.open_paths();
                self.detector
                    .check_collision(&action, crime, fabricated, &open_paths, &mut self.rng)
            };

            let point = match (collision.is_collision, &collision.threatened_conspirator) {
                (true, Some(threatened)) => {
                    let vulnerable = collision.vulnerable_point.as_deref().unwrap_or_default();
                    self.intervention_point(iteration, &action, vulnerable, threatened, &mut state, crime, fabricated)
                        .await
                }
                _ => self.standard_point(iteration, &action, &mut state, crime, fabricated).await,
            };

            state.action_history.push(ActionRecord::from_point(&action, &point, collision.is_collision));
            self.update_state(&mut state, &point);

            info!(
                plot_point = point.id,
                suspense = point.suspense_level,
                collision = point.is_collision,
                success_probability = state.success_probability(),
                open_paths = state.open_path_count(),
                "Plot point complete"
            );
            plot_points.push(point);
        }

        (plot_points, state)
    }

    /// Why the run should end now, if it should.
    ///
    /// The deadline wins over path exhaustion, which wins over the plot budget.
    fn termination(&self, state: &StoryState, generated: usize, iteration: u32) -> Option<ResolutionReason> {
        if state.time_remaining == 0 {
            return Some(ResolutionReason::Deadline);
        }
        if state.open_path_count() <= self.generation.discovery_paths_threshold
            && generated >= self.generation.min_plot_points
        {
            return Some(ResolutionReason::PathsExhausted);
        }
        if iteration as usize >= self.generation.max_plot_points {
            return Some(ResolutionReason::PlotBudget);
        }
        None
    }
}
