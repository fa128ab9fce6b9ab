//! # Mystery Suspense
//!
//! A dual-layer mystery generator. A case carries two fact layers: the real
//! crime, known to the conspirators and the reader, and a fabricated cover
//! story that the detective is steered towards. A suspense meta-controller
//! runs the investigation one plot point at a time against a countdown,
//! letting conspirators intervene whenever the detective gets close.
//!
//! ## Architecture
//!
//! ```text
//! CaseGenerator → CaseFile → SuspenseController → Generator (LLM pipe over HTTP)
//!                  ↓
//!        PlotPoints + StoryState → StoryRecord (JSON) → StoryAssembler (markdown)
//!                  ↓
//!   ReaderEvaluations → FeedbackAggregator → revise_plot_points
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use mystery_suspense::{CaseFile, Config, PipeGenerator, SuspenseController};
//! use rand::{rngs::StdRng, SeedableRng};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let mut rng = StdRng::seed_from_u64(config.seed);
//!     let mut case = CaseFile::load("case.json")?;
//!     case.prepare(config.generation.initial_discovery_paths, &mut rng);
//!
//!     let generator = PipeGenerator::new(&config.generator, config.request.clone())?;
//!     let mut controller =
//!         SuspenseController::new(generator, config.generation, config.suspense, rng);
//!     let (points, state) = controller
//!         .generate_story(&case.crime, &case.fabricated, case.discovery_paths)
//!         .await;
//!     println!("{} plot points, ended by {:?}", points.len(), state.resolution_reason);
//!     Ok(())
//! }
//! ```

/// Manuscript assembly from a story record.
pub mod assembly;
/// Case generation: real crime, cover story and red herrings.
pub mod backstory;
/// Command-line subcommands.
pub mod cli;
/// Collision detection between detective actions and the real layer.
pub mod collision;
/// Configuration loaded from environment variables.
pub mod config;
/// The suspense meta-controller.
pub mod controller;
/// Error types and result aliases.
pub mod error;
/// Real and fabricated fact layers, discovery paths and case files.
pub mod facts;
/// Reader evaluations and revision directives.
pub mod feedback;
/// Text generator seam and its HTTP pipe client.
pub mod generator;
/// Structural story metrics.
pub mod metrics;
/// Prompt templates.
pub mod prompts;
/// Persisted generation runs.
pub mod record;
/// Story state and plot points.
pub mod state;

pub use assembly::StoryAssembler;
pub use backstory::{CaseGenerator, CaseRequest};
pub use config::Config;
pub use controller::SuspenseController;
pub use error::{AppError, AppResult};
pub use facts::{CaseFile, CrimeFacts, DiscoveryPath, FabricatedFacts};
pub use generator::{Generator, PipeGenerator};
pub use record::StoryRecord;
pub use state::{PlotPoint, StoryState};
