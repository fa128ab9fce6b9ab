//! Serializable record of one generation run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::info;
use uuid::Uuid;

use crate::error::{CaseError, CaseResult};
use crate::state::{PlotPoint, StoryState};

/// Plot points plus the final state, one plot point per entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoryRecord {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub seed: u64,
    /// Discovery paths the run started with
    #[serde(default)]
    pub initial_paths: usize,
    pub plot_points: Vec<PlotPoint>,
    pub final_state: StoryState,
}

impl StoryRecord {
    pub fn new(seed: u64, initial_paths: usize, plot_points: Vec<PlotPoint>, final_state: StoryState) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            seed,
            initial_paths,
            plot_points,
            final_state,
        }
    }

    pub fn save(&self, path: impl AsRef<Path>) -> CaseResult<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).map_err(|source| CaseError::Io {
            path: path.display().to_string(),
            source,
        })?;
        info!(record = %self.id, path = %path.display(), "Story record saved");
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> CaseResult<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| CaseError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Ok(serde_json::from_str(&raw)?)
    }
}
