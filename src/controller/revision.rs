use rand::Rng;
use tracing::{debug, info};

use super::SuspenseController;
use crate::facts::{CrimeFacts, FabricatedFacts};
use crate::feedback::RevisionDirective;
use crate::generator::{generate_text, GenerationRequest, Generator};
use crate::prompts::{self, STORY_SYSTEM_PROMPT};
use crate::state::PlotPoint;

/// Longest description a revision may produce.
const MAX_REVISED_CHARS: usize = 200;

impl<G: Generator, R: Rng + Send> SuspenseController<G, R> {
    /// Rewrite the description of each targeted plot point.
    ///
    /// Targets out of range, or with no directive naming them, are skipped.
    /// Every other field is kept and the suspense level goes up by one. The
    /// patched point is not re-checked against its neighbours.
    pub async fn revise_plot_points(
        &self,
        plot_points: &[PlotPoint],
        targets: &[usize],
        directives: &[RevisionDirective],
        crime: &CrimeFacts,
        fabricated: &FabricatedFacts,
    ) -> Vec<PlotPoint> {
        let mut revised = plot_points.to_vec();
        let layer_note = format!(
            "The detective must keep believing the cover story about {}; {} must stay hidden.",
            fabricated.fake_suspect.name, crime.criminal.name
        );

        for &target in targets {
            if target >= revised.len() {
                debug!(target, points = revised.len(), "Revision target out of range, skipping");
                continue;
            }
            let relevant: Vec<&RevisionDirective> = directives.iter().filter(|d| d.targets(target)).collect();
            if relevant.is_empty() {
                debug!(target, "No directive for revision target, skipping");
                continue;
            }

            let original = &revised[target];
            let previous = if target > 0 {
                revised[target - 1].description.as_str()
            } else {
                "Start of investigation"
            };
            let following = revised
                .get(target + 1)
                .map(|p| p.description.as_str())
                .unwrap_or("End of story");
            let issues: Vec<&str> = relevant.iter().map(|d| d.description.as_str()).collect();
            let fixes: Vec<&str> = relevant.iter().map(|d| d.suggested_revision.as_str()).collect();

            let prompt = prompts::revision_prompt(
                &serde_json::to_string(original).unwrap_or_default(),
                &serde_json::to_string(&issues).unwrap_or_default(),
                &serde_json::to_string(&fixes).unwrap_or_default(),
                previous,
                following,
                &layer_note,
            );
            let request = GenerationRequest::text(prompt)
                .with_system(STORY_SYSTEM_PROMPT)
                .with_max_tokens(512);
            let outcome = generate_text(&self.generator, &request).await;

            let description = if outcome.text().is_empty() {
                original.description.clone()
            } else {
                outcome.text().chars().take(MAX_REVISED_CHARS).collect()
            };

            let point = &mut revised[target];
            point.description = description;
            point.suspense_level = point.suspense_level.saturating_add(1);
            info!(target, plot_point = point.id, directives = relevant.len(), "Plot point revised");
        }

        revised
    }
}
