//! Case file and story record persistence tests
//!
//! Uses temporary directories so nothing touches the working tree.

mod common;

use rand::rngs::StdRng;
use rand::SeedableRng;
use std::fs;
use tempfile::TempDir;

use mystery_suspense::cli::{execute_command, Commands};
use mystery_suspense::controller::SuspenseController;
use mystery_suspense::error::CaseError;
use mystery_suspense::facts::CaseFile;
use mystery_suspense::record::StoryRecord;

use common::{generation, sample_case, suspense, ScriptedGenerator, ACTION};

#[cfg(test)]
mod case_file_tests {
    use super::*;

    #[test]
    fn test_case_file_survives_disk() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("case.json");

        let case = sample_case();
        case.save(&path).unwrap();
        let loaded = CaseFile::load(&path).unwrap();

        assert_eq!(loaded, case);
    }

    #[test]
    fn test_missing_case_file_reports_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nope.json");

        let err = CaseFile::load(&path).unwrap_err();
        assert!(matches!(err, CaseError::Io { .. }));
        assert!(err.to_string().contains("nope.json"));
    }

    #[test]
    fn test_malformed_case_file_is_json_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("case.json");
        fs::write(&path, "{ \"crime\": 12 }").unwrap();

        assert!(matches!(CaseFile::load(&path), Err(CaseError::Json(_))));
    }

    #[test]
    fn test_prepare_fills_steps_and_paths() {
        let mut case = sample_case();
        case.discovery_paths.clear();
        for evidence in &mut case.crime.evidence {
            evidence.steps_required = 0;
        }

        let mut rng = StdRng::seed_from_u64(42);
        case.prepare(5, &mut rng);

        assert!(case.crime.evidence.iter().all(|e| e.steps_required >= 1));
        assert!(!case.discovery_paths.is_empty());
        assert!(case.discovery_paths.len() <= 8);
        assert!(case.discovery_paths.iter().all(|p| p.is_open()));
    }

    #[test]
    fn test_prepare_keeps_authored_paths() {
        let mut case = sample_case();
        let authored = case.discovery_paths.clone();

        case.prepare(5, &mut StdRng::seed_from_u64(1));

        assert_eq!(case.discovery_paths, authored);
        let steps: Vec<u32> = case.crime.evidence.iter().map(|e| e.steps_required).collect();
        assert_eq!(steps, vec![1, 2, 3]);
    }

    #[test]
    fn test_sample_case_is_consistent() {
        assert!(sample_case().ensure_valid().is_ok());
    }

    #[test]
    fn test_inconsistent_case_lists_issues() {
        let mut case = sample_case();
        case.fabricated.alibis.remove("Alice");
        case.fabricated.fake_suspect.name = "Edmund Hale".to_string();

        match case.ensure_valid() {
            Err(CaseError::Invalid { issues }) => {
                assert!(issues.iter().any(|i| i.contains("Alice")));
                assert!(issues.iter().any(|i| i.contains("real criminal")));
            }
            other => panic!("expected Invalid, got {:?}", other),
        }
    }
}

#[cfg(test)]
mod record_tests {
    use super::*;

    async fn sample_record() -> StoryRecord {
        let case = sample_case();
        let initial = case.discovery_paths.len();
        let mut controller = SuspenseController::new(
            ScriptedGenerator::new(ACTION),
            generation(5, 8),
            suspense(0.5, 0.7, 0.2),
            StdRng::seed_from_u64(21),
        );
        let (points, state) = controller
            .generate_story(&case.crime, &case.fabricated, case.discovery_paths)
            .await;
        StoryRecord::new(21, initial, points, state)
    }

    #[tokio::test]
    async fn test_story_record_survives_disk() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("story.json");

        let record = sample_record().await;
        record.save(&path).unwrap();
        let loaded = StoryRecord::load(&path).unwrap();

        assert_eq!(loaded.id, record.id);
        assert_eq!(loaded.seed, 21);
        assert_eq!(loaded.plot_points, record.plot_points);
        assert_eq!(loaded.final_state.resolution_reason, record.final_state.resolution_reason);
        assert_eq!(
            loaded.final_state.success_probability(),
            record.final_state.success_probability()
        );
    }

    #[tokio::test]
    async fn test_validate_command_reports_consistency() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("case.json");
        sample_case().save(&path).unwrap();

        let result = execute_command(Commands::Validate { case: path.clone() }).await;
        assert_eq!(result.exit_code, 0);
        assert!(result.message.contains("consistent"));

        let mut broken = sample_case();
        broken.fabricated.fake_timeline = Default::default();
        broken.save(&path).unwrap();

        let result = execute_command(Commands::Validate { case: path }).await;
        assert_eq!(result.exit_code, 1);
        assert!(result.message.contains("Fabricated timeline is empty"));
    }

    #[tokio::test]
    async fn test_metrics_command_prints_table() {
        let dir = TempDir::new().unwrap();
        let record_path = dir.path().join("story.json");
        sample_record().await.save(&record_path).unwrap();

        let result = execute_command(Commands::Metrics {
            record: record_path,
            evaluations: None,
            case: None,
        })
        .await;

        assert_eq!(result.exit_code, 0);
        assert!(result.message.contains("Plot points"));
        assert!(result.message.contains("Overall score"));
    }

    #[tokio::test]
    async fn test_metrics_command_missing_record_fails() {
        let dir = TempDir::new().unwrap();

        let result = execute_command(Commands::Metrics {
            record: dir.path().join("missing.json"),
            evaluations: None,
            case: None,
        })
        .await;

        assert_eq!(result.exit_code, 1);
        assert!(result.message.contains("missing.json"));
    }
}
