//! End-to-end tests for the suspense meta-controller
//!
//! The generator is replaced by scripted stand-ins so every run is
//! reproducible from its seed.

mod common;

use async_trait::async_trait;
use mockall::mock;
use pretty_assertions::assert_eq;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::BTreeSet;

use mystery_suspense::controller::SuspenseController;
use mystery_suspense::error::GeneratorResult;
use mystery_suspense::facts::DiscoveryPath;
use mystery_suspense::feedback::{IssueSeverity, IssueType, RevisionDirective};
use mystery_suspense::generator::{GenerationRequest, Generator};
use mystery_suspense::state::{
    DetectiveProfile, PlotPoint, ResolutionReason, StoryState, INITIAL_SUCCESS_PROBABILITY,
    MAX_SUCCESS_PROBABILITY, MIN_SUCCESS_PROBABILITY,
};

use common::{
    generation, sample_crime, sample_fabricated, sample_paths, suspense, OfflineGenerator,
    ScriptedGenerator, ACTION,
};

mock! {
    pub Pipe {}

    #[async_trait]
    impl Generator for Pipe {
        async fn generate(&self, request: &GenerationRequest) -> GeneratorResult<String>;
    }
}

async fn run<G: Generator>(
    generator: G,
    min_plot_points: usize,
    max_plot_points: usize,
    sensitivity: f64,
    path_close_probability: f64,
    seed: u64,
) -> (Vec<PlotPoint>, StoryState) {
    let mut controller = SuspenseController::new(
        generator,
        generation(min_plot_points, max_plot_points),
        suspense(sensitivity, path_close_probability, 0.0),
        StdRng::seed_from_u64(seed),
    );
    controller
        .generate_story(&sample_crime(), &sample_fabricated(), sample_paths())
        .await
}

#[cfg(test)]
mod scenario_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_questioning_a_conspirator_collides_on_first_turn() {
        let (points, state) = run(ScriptedGenerator::new(ACTION), 5, 8, 1.0, 0.7, 42).await;

        let first = &points[0];
        assert!(first.is_collision);
        assert_eq!(first.detective_action.as_deref(), Some(ACTION));
        assert_eq!(first.paths_closed, vec!["path_conspirator_Alice".to_string()]);
        assert!(first
            .conspirator_intervention
            .as_deref()
            .is_some_and(|i| i.starts_with("Alice:")));

        let record = &state.action_history[0];
        assert!(record.was_blocked);
        assert!(record.blocked_by.as_deref().is_some_and(|b| b.contains("Alice")));

        // Every investigation turn collides at full sensitivity
        assert!(points[..points.len() - 1].iter().all(|p| p.is_collision));
    }

    #[tokio::test]
    async fn test_run_ends_with_single_resolution_point() {
        let (points, state) = run(ScriptedGenerator::new(ACTION), 5, 8, 1.0, 0.7, 42).await;

        // Only Alice's path closes, so the plot budget ends the run
        assert_eq!(points.len(), 8);
        assert_eq!(state.resolution_reason, Some(ResolutionReason::PlotBudget));
        assert!(state.is_resolved());

        let last = points.last().unwrap();
        assert_eq!(last.id, 8);
        assert_eq!(last.suspense_level, 10);
        assert_eq!(last.description, ACTION);
        assert_eq!(
            last.detective_learns.as_deref(),
            Some("Concludes Gregory Pike is the primary suspect")
        );
        assert!(!last.is_collision);
        assert_eq!(state.suspense_level, 10);
        assert!(state
            .detective_knowledge
            .contains("Concludes Gregory Pike is the primary suspect"));

        let ids: Vec<u32> = points.iter().map(|p| p.id).collect();
        assert_eq!(ids, (1..=8).collect::<Vec<u32>>());
    }

    #[tokio::test]
    async fn test_interventions_drive_success_probability_down() {
        let (_, state) = run(ScriptedGenerator::new(ACTION), 5, 25, 1.0, 0.7, 11).await;

        assert!(state.success_probability() < INITIAL_SUCCESS_PROBABILITY);
        assert_eq!(state.success_probability(), MIN_SUCCESS_PROBABILITY);
    }

    #[tokio::test]
    async fn test_paths_exhaust_before_plot_budget() {
        let (points, state) = run(ScriptedGenerator::new(ACTION), 5, 40, 0.5, 1.0, 7).await;

        assert_eq!(state.resolution_reason, Some(ResolutionReason::PathsExhausted));
        assert!(state.open_path_count() <= 1);
        assert!(points.len() > 5 && points.len() < 40);
        assert_eq!(points.last().unwrap().suspense_level, 10);

        // Replay closures: each must hit a path that is still open, and the
        // run may only stop once at most one path is left
        let mut open: BTreeSet<String> = sample_paths().into_iter().map(|p| p.id).collect();
        let mut open_after = Vec::with_capacity(points.len());
        for point in &points {
            for path_id in &point.paths_closed {
                assert!(open.remove(path_id), "{} closed while not open", path_id);
            }
            open_after.push(open.len());
        }

        let investigated = points.len() - 1;
        for generated in 5..investigated {
            assert!(
                open_after[generated - 1] > 1,
                "run continued past exhaustion at point {}",
                generated
            );
        }
        assert!(open_after[investigated - 1] <= 1);
        assert_eq!(open.len(), state.open_path_count());
        assert_eq!(state.discovery_paths.len(), sample_paths().len());
    }

    #[tokio::test]
    async fn test_closed_paths_stay_closed_with_first_closer() {
        let (points, state) = run(ScriptedGenerator::new(ACTION), 5, 40, 0.5, 1.0, 7).await;

        let mut seen = BTreeSet::new();
        for point in &points {
            for path_id in &point.paths_closed {
                assert!(seen.insert(path_id.clone()), "{} closed twice", path_id);
                let path = state
                    .discovery_paths
                    .iter()
                    .find(|p| &p.id == path_id)
                    .unwrap();
                assert!(!path.is_open());
                assert_eq!(path.closed_by(), Some(format!("plot_point_{}", point.id).as_str()));
            }
        }
        for path in &state.discovery_paths {
            assert_eq!(path.is_open(), path.closed_by().is_none());
        }
    }

    #[tokio::test]
    async fn test_intervention_closes_conspirator_path_before_listed_evidence_path() {
        let mut paths = vec![DiscoveryPath::new(
            "path_evidence_ev_will",
            "Discover true meaning of Torn codicil fragment",
            7,
        )
        .with_evidence("ev_will")];
        paths.extend(sample_paths());

        let mut controller = SuspenseController::new(
            ScriptedGenerator::new("study the torn codicil fragment closely"),
            generation(5, 8),
            suspense(1.0, 0.0, 0.0),
            StdRng::seed_from_u64(1),
        );
        let (points, _) = controller
            .generate_story(&sample_crime(), &sample_fabricated(), paths)
            .await;

        assert!(points[0].is_collision);
        assert!(points[0]
            .conspirator_intervention
            .as_deref()
            .is_some_and(|i| i.starts_with("Bertram Cole:")));
        assert_eq!(points[0].paths_closed, vec!["path_conspirator_Bertram Cole".to_string()]);
        // With Bertram's own path gone the evidence path is next
        assert_eq!(points[1].paths_closed, vec!["path_evidence_ev_will".to_string()]);
    }

    #[tokio::test]
    async fn test_detected_collision_without_conspirator_is_recorded() {
        let (points, state) = run(ScriptedGenerator::new("find the external witness"), 5, 6, 1.0, 0.0, 4).await;

        let investigated = &points[..points.len() - 1];
        assert!(investigated.iter().all(|p| !p.is_collision));
        assert!(investigated.iter().all(|p| p.conspirator_intervention.is_none()));
        assert_eq!(state.action_history.len(), investigated.len());
        assert!(state.action_history.iter().all(|a| a.was_blocked));
        assert!(state.action_history.iter().all(|a| a.blocked_by.is_none()));
    }

    #[tokio::test]
    async fn test_deadline_ends_run_before_plot_budget() {
        let mut config = generation(5, 6);
        config.deadline_padding = 0;
        let mut controller = SuspenseController::new(
            ScriptedGenerator::new("search the grounds carefully"),
            config,
            suspense(0.0, 0.0, 0.0),
            StdRng::seed_from_u64(5),
        );
        let (points, state) = controller
            .generate_story(&sample_crime(), &sample_fabricated(), sample_paths())
            .await;

        assert_eq!(state.resolution_reason, Some(ResolutionReason::Deadline));
        assert_eq!(state.time_remaining, 0);
        assert_eq!(state.total_time, 6);
        assert_eq!(points.len(), 6);
    }

    #[tokio::test]
    async fn test_countdown_drops_once_per_iteration() {
        let (points, state) = run(ScriptedGenerator::new(ACTION), 5, 8, 0.5, 0.0, 3).await;

        assert_eq!(state.total_time, 11);
        assert_eq!(state.time_remaining, state.total_time - points.len() as u32);
    }

    #[tokio::test]
    async fn test_success_probability_stays_in_bounds() {
        for seed in 0..8 {
            let (_, state) = run(ScriptedGenerator::new(ACTION), 5, 20, 0.5, 0.7, seed).await;
            let p = state.success_probability();
            assert!(
                (MIN_SUCCESS_PROBABILITY..=MAX_SUCCESS_PROBABILITY).contains(&p),
                "seed {} left probability at {}",
                seed,
                p
            );
        }
    }

    #[tokio::test]
    async fn test_evidence_progress_never_exceeds_required_steps() {
        let crime = sample_crime();
        let (points, state) = run(
            ScriptedGenerator::new("search the grounds carefully"),
            5,
            30,
            0.0,
            0.0,
            3,
        )
        .await;

        for evidence in &crime.evidence {
            let done = state.evidence_progress[&evidence.id];
            assert!(done <= evidence.steps());

            let complete = done == evidence.steps();
            assert_eq!(!complete, state.undiscovered_evidence.contains(&evidence.id));

            let obtained = points
                .iter()
                .filter(|p| p.description.contains(&format!("fully obtains {}", evidence.description)))
                .count();
            assert_eq!(obtained, usize::from(complete));
        }
    }

    #[tokio::test]
    async fn test_same_seed_same_story() {
        let (points_a, state_a) = run(ScriptedGenerator::new(ACTION), 5, 15, 0.5, 0.7, 99).await;
        let (points_b, state_b) = run(ScriptedGenerator::new(ACTION), 5, 15, 0.5, 0.7, 99).await;

        assert_eq!(points_a, points_b);
        assert_eq!(state_a, state_b);
    }
}

#[cfg(test)]
mod fallback_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_offline_generator_still_completes_story() {
        let (points, state) = run(OfflineGenerator, 5, 6, 0.5, 0.7, 1).await;

        assert_eq!(points.len(), 6);
        assert_eq!(state.detective_profile, DetectiveProfile::fallback());
        assert!(state
            .action_history
            .iter()
            .all(|a| a.action == "Continue investigation"));

        let last = points.last().unwrap();
        assert_eq!(last.description, "The investigation reaches its conclusion");
        assert_eq!(last.suspense_level, 10);
    }

    #[tokio::test]
    async fn test_structured_action_field_is_used() {
        let generator = ScriptedGenerator::new(r#"{"action": "dust the decanter for prints"}"#);
        let (points, _) = run(generator, 5, 4, 0.0, 0.0, 2).await;

        assert_eq!(
            points[0].detective_action.as_deref(),
            Some("dust the decanter for prints")
        );
    }
}

#[cfg(test)]
mod revision_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn controller(mock: MockPipe) -> SuspenseController<MockPipe, StdRng> {
        SuspenseController::new(
            mock,
            generation(5, 10),
            suspense(0.5, 0.7, 0.2),
            StdRng::seed_from_u64(0),
        )
    }

    fn story() -> Vec<PlotPoint> {
        vec![
            PlotPoint::new(1, "The detective arrives at the manor", 3),
            PlotPoint::new(2, "The detective questions the gardener", 4),
            PlotPoint::new(3, "The case is closed", 10),
        ]
    }

    fn directive(target: usize) -> RevisionDirective {
        RevisionDirective::new(
            vec![target],
            IssueType::LogicalInconsistency,
            IssueSeverity::Critical,
            "The gardener could not have known about the will",
            "Have the solicitor mention the will first",
            2,
        )
    }

    #[tokio::test]
    async fn test_out_of_range_target_changes_nothing() {
        let mut mock = MockPipe::new();
        mock.expect_generate().times(0);

        let points = story();
        let revised = controller(mock)
            .revise_plot_points(&points, &[7], &[directive(7)], &sample_crime(), &sample_fabricated())
            .await;

        assert_eq!(revised, points);
    }

    #[tokio::test]
    async fn test_target_without_directive_is_skipped() {
        let mut mock = MockPipe::new();
        mock.expect_generate().times(0);

        let points = story();
        let revised = controller(mock)
            .revise_plot_points(&points, &[0], &[directive(2)], &sample_crime(), &sample_fabricated())
            .await;

        assert_eq!(revised, points);
    }

    #[tokio::test]
    async fn test_revision_rewrites_only_the_target() {
        let mut mock = MockPipe::new();
        mock.expect_generate()
            .withf(|request: &GenerationRequest| {
                request.prompt.contains("Have the solicitor mention the will first")
                    && request.prompt.contains("Gregory Pike")
            })
            .times(1)
            .returning(|_| Ok("  The solicitor lets slip that a new will existed.  ".to_string()));

        let points = story();
        let revised = controller(mock)
            .revise_plot_points(&points, &[1], &[directive(1)], &sample_crime(), &sample_fabricated())
            .await;

        assert_eq!(revised[0], points[0]);
        assert_eq!(revised[2], points[2]);
        assert_eq!(revised[1].description, "The solicitor lets slip that a new will existed.");
        assert_eq!(revised[1].suspense_level, 5);
        assert_eq!(revised[1].id, 2);
    }

    #[tokio::test]
    async fn test_empty_revision_keeps_original_text() {
        let mut mock = MockPipe::new();
        mock.expect_generate().times(1).returning(|_| Ok(String::new()));

        let points = story();
        let revised = controller(mock)
            .revise_plot_points(&points, &[0], &[directive(0)], &sample_crime(), &sample_fabricated())
            .await;

        assert_eq!(revised[0].description, points[0].description);
        assert_eq!(revised[0].suspense_level, 4);
    }

    #[tokio::test]
    async fn test_long_revision_is_truncated() {
        let mut mock = MockPipe::new();
        mock.expect_generate().times(1).returning(|_| Ok("x".repeat(500)));

        let revised = controller(mock)
            .revise_plot_points(&story(), &[2], &[directive(2)], &sample_crime(), &sample_fabricated())
            .await;

        assert_eq!(revised[2].description.chars().count(), 200);
        assert_eq!(revised[2].suspense_level, 11);
    }
}
