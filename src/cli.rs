//! Command-line subcommands.
//!
//! Each subcommand is a thin shell over the library: load files, run one
//! operation, write the result, and report a message plus exit code.

use clap::{Parser, Subcommand};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::assembly::StoryAssembler;
use crate::backstory::{CaseGenerator, CaseRequest};
use crate::config::Config;
use crate::controller::SuspenseController;
use crate::error::{AppResult, CaseError};
use crate::facts::CaseFile;
use crate::feedback::{revision_summary, revision_targets, FeedbackAggregator, ReaderEvaluation};
use crate::generator::PipeGenerator;
use crate::metrics::MetricsCalculator;
use crate::record::StoryRecord;

/// Dual-layer mystery generator.
#[derive(Parser, Debug)]
#[command(name = "mystery-suspense", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Run the suspense controller over a case file, generating one first
    /// when no case is given
    Generate {
        /// Case file with the real and fabricated fact layers
        #[arg(long)]
        case: Option<PathBuf>,

        /// Crime type for a generated case (random when omitted)
        #[arg(long, conflicts_with = "case")]
        crime_type: Option<String>,

        /// Setting for a generated case (random when omitted)
        #[arg(long, conflicts_with = "case")]
        setting: Option<String>,

        /// Innocent suspects to add to a generated case
        #[arg(long, default_value_t = 2, conflicts_with = "case")]
        suspects: usize,

        /// Seed for the random stream (overrides STORY_SEED)
        #[arg(long)]
        seed: Option<u64>,

        /// Where to write the story record
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Check a case file for consistency between its layers
    Validate {
        #[arg(long)]
        case: PathBuf,
    },

    /// Revise a story record from reader evaluations
    Revise {
        #[arg(long)]
        record: PathBuf,

        /// JSON list of reader evaluations
        #[arg(long)]
        evaluations: PathBuf,

        #[arg(long)]
        case: PathBuf,

        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Write a story record out as a markdown manuscript
    Assemble {
        #[arg(long)]
        record: PathBuf,

        #[arg(long)]
        case: PathBuf,

        /// Defaults to the record path with an `.md` extension
        #[arg(long)]
        output: Option<PathBuf>,

        /// Leave out the prologue that shows the reader the truth
        #[arg(long)]
        no_prologue: bool,
    },

    /// Print structural metrics for a story record
    Metrics {
        #[arg(long)]
        record: PathBuf,

        #[arg(long)]
        evaluations: Option<PathBuf>,

        /// Needed to detect layer leaks
        #[arg(long)]
        case: Option<PathBuf>,
    },
}

/// Result of CLI command execution.
pub struct CliResult {
    /// Exit code (0 = success)
    pub exit_code: i32,
    pub message: String,
}

impl CliResult {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            exit_code: 0,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            exit_code: 1,
            message: message.into(),
        }
    }
}

impl From<AppResult<String>> for CliResult {
    fn from(result: AppResult<String>) -> Self {
        match result {
            Ok(message) => Self::success(message),
            Err(e) => Self::error(e.to_string()),
        }
    }
}

/// Execute a CLI command.
pub async fn execute_command(command: Commands) -> CliResult {
    match command {
        Commands::Generate {
            case,
            crime_type,
            setting,
            suspects,
            seed,
            output,
        } => {
            let request = CaseRequest {
                crime_type,
                setting,
                conspirators: None,
                suspects,
            };
            execute_generate(case.as_deref(), request, seed, output).await.into()
        }
        Commands::Validate { case } => execute_validate(&case),
        Commands::Revise {
            record,
            evaluations,
            case,
            output,
        } => execute_revise(&record, &evaluations, &case, output).await.into(),
        Commands::Assemble {
            record,
            case,
            output,
            no_prologue,
        } => execute_assemble(&record, &case, output, !no_prologue).await.into(),
        Commands::Metrics {
            record,
            evaluations,
            case,
        } => execute_metrics(&record, evaluations.as_deref(), case.as_deref()).into(),
    }
}

async fn execute_generate(
    case_path: Option<&Path>,
    request: CaseRequest,
    seed: Option<u64>,
    output: Option<PathBuf>,
) -> AppResult<String> {
    let config = Config::from_env()?;
    let seed = seed.unwrap_or(config.seed);
    let mut rng = StdRng::seed_from_u64(seed);

    let generator = PipeGenerator::new(&config.generator, config.request.clone())?;
    info!(base_url = %generator.base_url(), pipe = %generator.pipe(), seed, "Generator ready");

    let (case, generated) = match case_path {
        Some(path) => {
            let mut case = CaseFile::load(path)?;
            case.prepare(config.generation.initial_discovery_paths, &mut rng);
            (case, false)
        }
        None => {
            let cases = CaseGenerator::new(generator.clone(), config.generation.clone());
            (cases.generate(&request, &mut rng).await, true)
        }
    };
    let report = case.validate();
    for issue in &report.issues {
        warn!(issue = %issue, "Case consistency issue");
    }

    let initial_paths = case.discovery_paths.len();
    let mut controller = SuspenseController::new(generator, config.generation.clone(), config.suspense.clone(), rng);
    let (plot_points, state) = controller
        .generate_story(&case.crime, &case.fabricated, case.discovery_paths.clone())
        .await;

    let record = StoryRecord::new(seed, initial_paths, plot_points, state);
    let path = output.unwrap_or_else(|| PathBuf::from(format!("story-{}.json", record.id)));
    record.save(&path)?;
    if generated {
        let case_out = path.with_extension("case.json");
        case.save(&case_out)?;
        info!(path = %case_out.display(), "Generated case saved");
    }

    let reason = record
        .final_state
        .resolution_reason
        .map(|r| format!("{:?}", r))
        .unwrap_or_else(|| "unknown".to_string());
    Ok(format!(
        "Generated {} plot points (ended by {}, success probability {:.0}%) -> {}",
        record.plot_points.len(),
        reason,
        record.final_state.success_probability() * 100.0,
        path.display()
    ))
}

fn execute_validate(case_path: &Path) -> CliResult {
    let case = match CaseFile::load(case_path) {
        Ok(case) => case,
        Err(e) => return CliResult::error(e.to_string()),
    };
    let report = case.validate();
    if report.is_valid() {
        CliResult::success(format!("{}: consistent", case_path.display()))
    } else {
        let mut message = format!("{}: {} issue(s)", case_path.display(), report.issues.len());
        for issue in &report.issues {
            message.push_str(&format!("\n  - {}", issue));
        }
        CliResult::error(message)
    }
}

async fn execute_revise(
    record_path: &Path,
    evaluations_path: &Path,
    case_path: &Path,
    output: Option<PathBuf>,
) -> AppResult<String> {
    let config = Config::from_env()?;
    let mut record = StoryRecord::load(record_path)?;
    let evaluations = load_evaluations(evaluations_path)?;
    let case = CaseFile::load(case_path)?;

    let aggregator = FeedbackAggregator::new(config.refinement.clone());
    let directives = aggregator.aggregate(&evaluations, &record.plot_points, Some(&case.crime));
    let directives = aggregator.filter_directives(&directives, config.refinement.max_revisions);
    let targets = revision_targets(&directives);

    let generator = PipeGenerator::new(&config.generator, config.request.clone())?;
    let controller = SuspenseController::new(
        generator,
        config.generation.clone(),
        config.suspense.clone(),
        StdRng::seed_from_u64(record.seed),
    );
    record.plot_points = controller
        .revise_plot_points(&record.plot_points, &targets, &directives, &case.crime, &case.fabricated)
        .await;

    let path = output.unwrap_or_else(|| record_path.with_extension("revised.json"));
    record.save(&path)?;

    Ok(format!("{}\n\nRevised {} target(s) -> {}", revision_summary(&directives), targets.len(), path.display()))
}

async fn execute_assemble(
    record_path: &Path,
    case_path: &Path,
    output: Option<PathBuf>,
    reader_perspective: bool,
) -> AppResult<String> {
    let config = Config::from_env()?;
    let record = StoryRecord::load(record_path)?;
    let case = CaseFile::load(case_path)?;

    let generator = PipeGenerator::new(&config.generator, config.request.clone())?;
    let assembler = StoryAssembler::new(generator).with_reader_perspective(reader_perspective);
    let manuscript = assembler.assemble(&record, &case).await;

    let path = output.unwrap_or_else(|| record_path.with_extension("md"));
    fs::write(&path, &manuscript).map_err(|source| CaseError::Io {
        path: path.display().to_string(),
        source,
    })?;

    Ok(format!(
        "Assembled {} plot points ({} words) -> {}",
        record.plot_points.len(),
        manuscript.split_whitespace().count(),
        path.display()
    ))
}

fn execute_metrics(record_path: &Path, evaluations_path: Option<&Path>, case_path: Option<&Path>) -> AppResult<String> {
    let record = StoryRecord::load(record_path)?;
    let evaluations = match evaluations_path {
        Some(path) => load_evaluations(path)?,
        None => Vec::new(),
    };
    let case = case_path.map(CaseFile::load).transpose()?;

    let metrics = MetricsCalculator::new().calculate(
        &record.plot_points,
        &record.final_state,
        &evaluations,
        case.as_ref().map(|c| &c.crime),
        record.initial_paths,
    );
    Ok(metrics.format_table())
}

fn load_evaluations(path: &Path) -> AppResult<Vec<ReaderEvaluation>> {
    let raw = fs::read_to_string(path).map_err(|source| CaseError::Io {
        path: path.display().to_string(),
        source,
    })?;
    Ok(serde_json::from_str(&raw).map_err(CaseError::from)?)
}
