//! Turns a finished [`StoryRecord`] into readable prose.
//!
//! Plot points are grouped three to a chapter. Each chapter and the
//! epilogue is one generator call; a failed or empty call falls back to
//! prose stitched from the plot point descriptions, so assembly always
//! produces a complete manuscript.

use tracing::{info, warn};

use crate::facts::CaseFile;
use crate::generator::{generate_text, strip_thinking, GenerationRequest, Generator};
use crate::prompts;
use crate::record::StoryRecord;
use crate::state::PlotPoint;

pub const STORY_TITLE: &str = "The Dual Narrative";

const POINTS_PER_CHAPTER: usize = 3;
const PROSE_MAX_TOKENS: u32 = 4096;
const PROSE_TEMPERATURE: f64 = 0.8;

const CHAPTER_TITLES: &[&str] = &[
    "The Discovery",
    "First Threads",
    "Following the Trail",
    "Smoke and Mirrors",
    "Shifting Shadows",
    "The Web Tightens",
    "Closing In",
    "The Final Deception",
    "Unraveling",
    "The Last Thread",
];

/// Writes the manuscript for one run.
pub struct StoryAssembler<G> {
    generator: G,
    reader_perspective: bool,
}

impl<G: Generator> StoryAssembler<G> {
    pub fn new(generator: G) -> Self {
        Self {
            generator,
            reader_perspective: true,
        }
    }

    pub fn generator(&self) -> &G {
        &self.generator
    }

    /// Whether to open with a prologue that shows the reader the truth.
    pub fn with_reader_perspective(mut self, enabled: bool) -> Self {
        self.reader_perspective = enabled;
        self
    }

    pub async fn assemble(&self, record: &StoryRecord, case: &CaseFile) -> String {
        let mut sections = vec![format!("# {}", STORY_TITLE)];
        if self.reader_perspective {
            sections.push(format!("## Prologue\n\n{}", prologue(case)));
        }

        let context = case_context(record, case);
        let mut previous = "The investigation begins.".to_string();
        for (index, points) in record.plot_points.chunks(POINTS_PER_CHAPTER).enumerate() {
            let number = index + 1;
            let title = chapter_title(index);
            let body = self.chapter(number, &title, &context, &previous, points).await;
            sections.push(format!("## Chapter {}: {}\n\n{}", number, title, body));
            if let Some(last) = points.last() {
                previous = last.description.clone();
            }
        }

        sections.push(format!("## Epilogue\n\n{}", self.epilogue(case).await));

        info!(
            chapters = record.plot_points.chunks(POINTS_PER_CHAPTER).len(),
            "Story assembled"
        );
        sections.join("\n\n")
    }

    async fn chapter(
        &self,
        number: usize,
        title: &str,
        context: &str,
        previous: &str,
        points: &[PlotPoint],
    ) -> String {
        let events = points.iter().map(event_line).collect::<Vec<_>>().join("\n");
        let prompt = prompts::chapter_prompt(number, title, context, previous, &events);
        match self.prose(prompt).await {
            Some(text) => text,
            None => {
                warn!(chapter = number, "Chapter generation failed, using plot point summaries");
                fallback_chapter(points)
            }
        }
    }

    async fn epilogue(&self, case: &CaseFile) -> String {
        let crime = &case.crime;
        let conspirators = crime.conspirator_names().join(", ");
        let prompt = prompts::epilogue_prompt(
            &crime.criminal.name,
            &crime.crime_type,
            if conspirators.is_empty() { "No one" } else { &conspirators },
            &case.fabricated.fake_suspect.name,
        );
        match self.prose(prompt).await {
            Some(text) => text,
            None => {
                warn!("Epilogue generation failed, using fallback");
                fallback_epilogue(case)
            }
        }
    }

    async fn prose(&self, prompt: String) -> Option<String> {
        let request = GenerationRequest::text(prompt)
            .with_max_tokens(PROSE_MAX_TOKENS)
            .with_temperature(PROSE_TEMPERATURE);
        let outcome = generate_text(&self.generator, &request).await;
        let text = clean_prose(outcome.text());
        (!text.is_empty()).then_some(text)
    }
}

fn chapter_title(index: usize) -> String {
    CHAPTER_TITLES
        .get(index)
        .map(|t| t.to_string())
        .unwrap_or_else(|| format!("Part {}", index + 1))
}

fn case_context(record: &StoryRecord, case: &CaseFile) -> String {
    let crime = &case.crime;
    let detective = &record.final_state.detective_profile;
    format!(
        "- Crime: {} of {} ({})\n- Setting: {}\n- Detective: {}, {}\n- Stakes: {}",
        crime.crime_type,
        crime.victim.name,
        crime.victim.occupation,
        crime.location,
        detective.name,
        detective.background,
        detective.personal_stakes,
    )
}

fn event_line(point: &PlotPoint) -> String {
    let mut line = format!("- {}", point.description);
    if let Some(intervention) = &point.conspirator_intervention {
        line.push_str(&format!(" (behind the scenes: {})", intervention));
    }
    if let Some(revelation) = &point.reader_revelation {
        line.push_str(&format!(" [reader learns: {}]", revelation));
    }
    line
}

/// Drop thinking blocks, then any headings or plot point labels the
/// generator echoed back.
pub fn clean_prose(text: &str) -> String {
    let text = strip_thinking(text);
    let mut lines: Vec<&str> = text
        .lines()
        .filter(|line| !line.trim_start().starts_with("Plot Point"))
        .collect();
    while let Some(first) = lines.first() {
        let trimmed = first.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with("Chapter ") {
            lines.remove(0);
        } else {
            break;
        }
    }
    lines.join("\n").trim().to_string()
}

fn prologue(case: &CaseFile) -> String {
    let crime = &case.crime;
    let mut text = format!(
        "{} did it. The {} of {} at the {} was {}'s work, and the reason was simple: {}.",
        crime.criminal.name,
        crime.crime_type,
        crime.victim.name,
        crime.location,
        crime.criminal.name,
        crime.motive.to_lowercase(),
    );
    if !crime.conspirators.is_empty() {
        text.push_str(&format!(
            " {} agreed to keep the secret.",
            crime.conspirator_names().join(" and ")
        ));
    }
    text.push_str(&format!(
        "\n\nThe story they tell points at {}. The detective will hear that story first.",
        case.fabricated.fake_suspect.name
    ));
    text
}

fn fallback_chapter(points: &[PlotPoint]) -> String {
    points
        .iter()
        .map(|p| {
            let mut paragraph = p.description.clone();
            if let Some(learned) = &p.detective_learns {
                paragraph.push_str(&format!(" The detective noted: {}.", learned.trim_end_matches('.')));
            }
            paragraph
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn fallback_epilogue(case: &CaseFile) -> String {
    format!(
        "Months later the file on the {} was closed with {}'s name on it. {} kept to the routines of an ordinary life, and the detective kept a copy of the file.",
        case.crime.crime_type, case.fabricated.fake_suspect.name, case.crime.criminal.name,
    )
}
