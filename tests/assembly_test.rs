//! Manuscript assembly tests

mod common;

use pretty_assertions::assert_eq;

use mystery_suspense::assembly::StoryAssembler;
use mystery_suspense::record::StoryRecord;
use mystery_suspense::state::{DetectiveProfile, PlotPoint, StoryState};

use common::{sample_case, sample_crime, sample_paths, OfflineGenerator, RoutedGenerator};

fn record(points: u32) -> StoryRecord {
    let plot_points = (1..=points)
        .map(|i| {
            let mut point = PlotPoint::new(i, format!("Scene {} at the manor.", i), 3);
            point.detective_learns = Some(format!("clue {}", i));
            point
        })
        .collect();
    let state = StoryState::new(&sample_crime(), sample_paths(), DetectiveProfile::fallback(), 3, 12);
    StoryRecord::new(7, 5, plot_points, state)
}

#[cfg(test)]
mod assembly_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_manuscript_sections_in_order() {
        let routed = RoutedGenerator::new()
            .route("Write Chapter", "Chapter 2: Echo\n\nFog pressed against the glass.")
            .route("Write an epilogue", "# Epilogue\n\nThe garden grew wild.");
        let assembler = StoryAssembler::new(routed);

        let manuscript = assembler.assemble(&record(7), &sample_case()).await;

        let headings: Vec<&str> = manuscript.lines().filter(|l| l.starts_with('#')).collect();
        assert_eq!(
            headings,
            vec![
                "# The Dual Narrative",
                "## Prologue",
                "## Chapter 1: The Discovery",
                "## Chapter 2: First Threads",
                "## Chapter 3: Following the Trail",
                "## Epilogue",
            ]
        );
        assert_eq!(manuscript.matches("Fog pressed against the glass.").count(), 3);
        assert!(manuscript.ends_with("The garden grew wild."));
        assert!(!manuscript.contains("Chapter 2: Echo"));
        assert!(manuscript.contains("Edmund Hale did it."));
        assert!(manuscript.contains("points at Gregory Pike"));
    }

    #[tokio::test]
    async fn test_chapter_prompts_carry_their_plot_points() {
        let routed = RoutedGenerator::new()
            .route("Write Chapter", "Prose.")
            .route("Write an epilogue", "End.");
        let assembler = StoryAssembler::new(routed);

        assembler.assemble(&record(4), &sample_case()).await;

        let prompts = assembler.generator().prompts();
        assert_eq!(prompts.len(), 3);
        assert!(prompts[0].contains("Scene 3 at the manor."));
        assert!(!prompts[0].contains("Scene 4 at the manor."));
        assert!(prompts[1].contains("Previously: Scene 3 at the manor."));
        assert!(prompts[2].contains("Edmund Hale committed the murder"));
        assert!(prompts[2].contains("Alice, Bertram Cole helped cover it up"));
    }

    #[tokio::test]
    async fn test_offline_assembly_falls_back_to_summaries() {
        let assembler = StoryAssembler::new(OfflineGenerator);

        let manuscript = assembler.assemble(&record(2), &sample_case()).await;

        assert!(manuscript.contains("## Chapter 1: The Discovery"));
        assert!(manuscript.contains("Scene 1 at the manor. The detective noted: clue 1."));
        assert!(manuscript.contains("closed with Gregory Pike's name on it"));
        assert!(!manuscript.contains("## Chapter 2"));
    }

    #[tokio::test]
    async fn test_prologue_can_be_left_out() {
        let assembler = StoryAssembler::new(OfflineGenerator).with_reader_perspective(false);

        let manuscript = assembler.assemble(&record(3), &sample_case()).await;

        assert!(!manuscript.contains("## Prologue"));
        assert!(!manuscript.contains("Edmund Hale did it."));
        assert!(manuscript.starts_with("# The Dual Narrative\n\n## Chapter 1"));
    }
}

