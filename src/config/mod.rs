use std::env;
use std::str::FromStr;

use crate::error::AppError;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub generator: GeneratorConfig,
    pub logging: LoggingConfig,
    pub request: RequestConfig,
    pub generation: GenerationConfig,
    pub suspense: SuspenseConfig,
    pub refinement: RefinementConfig,
    /// Seed for the random stream threaded through a generation run
    pub seed: u64,
}

/// Text generator (Langbase-style pipe) configuration
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    pub api_key: String,
    pub base_url: String,
    /// Pipe that serves every story prompt
    pub pipe: String,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

/// Log output format
#[derive(Debug, Clone, PartialEq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// HTTP request configuration
#[derive(Debug, Clone)]
pub struct RequestConfig {
    pub timeout_ms: u64,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
}

/// Story generation limits.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationConfig {
    /// Plot points required before path exhaustion may end the investigation
    pub min_plot_points: usize,
    /// Hard cap on plot points, resolution included
    pub max_plot_points: usize,
    /// Open-path count at or below which the investigation may resolve
    pub discovery_paths_threshold: usize,
    /// Discovery paths seeded when a case file carries none
    pub initial_discovery_paths: usize,
    /// Extra countdown units on top of `max_plot_points`
    pub deadline_padding: u32,
    /// Structured-output retries per generator call
    pub max_retries: u32,
    /// Conspirator count range for generated cases
    pub min_conspirators: usize,
    pub max_conspirators: usize,
}

/// Suspense tuning for the meta-controller.
#[derive(Debug, Clone, PartialEq)]
pub struct SuspenseConfig {
    pub initial_level: u8,
    pub max_level: u8,
    /// Chance that a progress turn also closes a random open path
    pub path_close_probability: f64,
    /// Chance per turn that a new minor lead opens
    pub new_path_probability: f64,
    /// Base firing probability of the collision detector
    pub collision_check_sensitivity: f64,
}

/// Weights used when turning reader feedback into revision directives.
#[derive(Debug, Clone, PartialEq)]
pub struct RefinementConfig {
    /// Distinct readers that must agree before a non-critical issue counts
    pub consensus_threshold: usize,
    pub critical_issue_weight: f64,
    pub moderate_issue_weight: f64,
    pub minor_issue_weight: f64,
    /// Directive cap applied by `filter_directives`
    pub max_revisions: usize,
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, AppError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let generator = GeneratorConfig {
            api_key: env::var("GENERATOR_API_KEY").map_err(|_| AppError::Config {
                message: "GENERATOR_API_KEY is required".to_string(),
            })?,
            base_url: env::var("GENERATOR_BASE_URL")
                .unwrap_or_else(|_| "https://api.langbase.com".to_string()),
            pipe: env::var("GENERATOR_PIPE").unwrap_or_else(|_| "mystery-story-v1".to_string()),
        };

        let logging = LoggingConfig::from_env();

        let request = RequestConfig {
            timeout_ms: env_or("REQUEST_TIMEOUT_MS", 30000),
            max_retries: env_or("MAX_RETRIES", 3),
            retry_delay_ms: env_or("RETRY_DELAY_MS", 1000),
        };

        let config = Config {
            generator,
            logging,
            request,
            generation: GenerationConfig::from_env(),
            suspense: SuspenseConfig::from_env(),
            refinement: RefinementConfig::from_env(),
            seed: env_or("STORY_SEED", 42),
        };
        config.validate()?;
        Ok(config)
    }

    /// Check the tuning parameters for out-of-range values.
    pub fn validate(&self) -> Result<(), AppError> {
        let mut problems = Vec::new();

        let g = &self.generation;
        if g.min_plot_points > g.max_plot_points {
            problems.push(format!(
                "min_plot_points ({}) exceeds max_plot_points ({})",
                g.min_plot_points, g.max_plot_points
            ));
        }
        if g.max_plot_points == 0 {
            problems.push("max_plot_points must be at least 1".to_string());
        }
        if g.min_conspirators == 0 || g.min_conspirators > g.max_conspirators {
            problems.push(format!(
                "conspirator range {}..={} must be non-empty and start at 1 or more",
                g.min_conspirators, g.max_conspirators
            ));
        }

        let s = &self.suspense;
        if s.initial_level == 0 || s.initial_level > s.max_level {
            problems.push(format!(
                "initial_level ({}) must be within 1..={}",
                s.initial_level, s.max_level
            ));
        }
        for (name, value) in [
            ("path_close_probability", s.path_close_probability),
            ("new_path_probability", s.new_path_probability),
            ("collision_check_sensitivity", s.collision_check_sensitivity),
        ] {
            if !(0.0..=1.0).contains(&value) {
                problems.push(format!("{} ({}) must be within [0, 1]", name, value));
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(AppError::Config {
                message: problems.join("; "),
            })
        }
    }
}

impl LoggingConfig {
    /// Load from environment variables. Never fails, so commands that do
    /// not talk to the generator can log without a full [`Config`].
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        Self {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            format: match env::var("LOG_FORMAT")
                .unwrap_or_else(|_| "pretty".to_string())
                .to_lowercase()
                .as_str()
            {
                "json" => LogFormat::Json,
                _ => LogFormat::Pretty,
            },
        }
    }
}

impl GenerationConfig {
    /// Load from environment variables.
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            min_plot_points: env_or("STORY_MIN_PLOT_POINTS", d.min_plot_points),
            max_plot_points: env_or("STORY_MAX_PLOT_POINTS", d.max_plot_points),
            discovery_paths_threshold: env_or(
                "STORY_DISCOVERY_PATHS_THRESHOLD",
                d.discovery_paths_threshold,
            ),
            initial_discovery_paths: env_or(
                "STORY_INITIAL_DISCOVERY_PATHS",
                d.initial_discovery_paths,
            ),
            deadline_padding: env_or("STORY_DEADLINE_PADDING", d.deadline_padding),
            max_retries: env_or("STORY_JSON_RETRIES", d.max_retries),
            min_conspirators: env_or("STORY_MIN_CONSPIRATORS", d.min_conspirators),
            max_conspirators: env_or("STORY_MAX_CONSPIRATORS", d.max_conspirators),
        }
    }

    /// Countdown units a run starts with.
    pub fn total_time(&self) -> u32 {
        self.max_plot_points as u32 + self.deadline_padding
    }
}

impl SuspenseConfig {
    /// Load from environment variables.
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            initial_level: env_or("SUSPENSE_INITIAL_LEVEL", d.initial_level),
            max_level: env_or("SUSPENSE_MAX_LEVEL", d.max_level),
            path_close_probability: env_or(
                "SUSPENSE_PATH_CLOSE_PROBABILITY",
                d.path_close_probability,
            ),
            new_path_probability: env_or("SUSPENSE_NEW_PATH_PROBABILITY", d.new_path_probability),
            collision_check_sensitivity: env_or(
                "SUSPENSE_COLLISION_SENSITIVITY",
                d.collision_check_sensitivity,
            ),
        }
    }
}

impl RefinementConfig {
    /// Load from environment variables.
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            consensus_threshold: env_or("REFINE_CONSENSUS_THRESHOLD", d.consensus_threshold),
            critical_issue_weight: env_or("REFINE_CRITICAL_WEIGHT", d.critical_issue_weight),
            moderate_issue_weight: env_or("REFINE_MODERATE_WEIGHT", d.moderate_issue_weight),
            minor_issue_weight: env_or("REFINE_MINOR_WEIGHT", d.minor_issue_weight),
            max_revisions: env_or("REFINE_MAX_REVISIONS", d.max_revisions),
        }
    }
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 30000,
            max_retries: 3,
            retry_delay_ms: 1000,
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            min_plot_points: 15,
            max_plot_points: 25,
            discovery_paths_threshold: 1,
            initial_discovery_paths: 5,
            deadline_padding: 3,
            max_retries: 3,
            min_conspirators: 2,
            max_conspirators: 4,
        }
    }
}

impl Default for SuspenseConfig {
    fn default() -> Self {
        Self {
            initial_level: 3,
            max_level: 10,
            path_close_probability: 0.7,
            new_path_probability: 0.2,
            collision_check_sensitivity: 0.5,
        }
    }
}

impl Default for RefinementConfig {
    fn default() -> Self {
        Self {
            consensus_threshold: 2,
            critical_issue_weight: 3.0,
            moderate_issue_weight: 1.5,
            minor_issue_weight: 0.5,
            max_revisions: 5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> Config {
        Config {
            generator: GeneratorConfig {
                api_key: "key".to_string(),
                base_url: "http://localhost".to_string(),
                pipe: "pipe".to_string(),
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: LogFormat::Pretty,
            },
            request: RequestConfig::default(),
            generation: GenerationConfig::default(),
            suspense: SuspenseConfig::default(),
            refinement: RefinementConfig::default(),
            seed: 42,
        }
    }

    #[test]
    fn test_defaults_are_valid() {
        assert!(test_config().validate().is_ok());
    }

    #[test]
    fn test_total_time_adds_padding() {
        let g = GenerationConfig::default();
        assert_eq!(g.total_time(), 28);
    }

    #[test]
    fn test_validate_rejects_inverted_plot_limits() {
        let mut config = test_config();
        config.generation.min_plot_points = 30;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("min_plot_points"));
    }

    #[test]
    fn test_validate_rejects_out_of_range_probability() {
        let mut config = test_config();
        config.suspense.collision_check_sensitivity = 1.5;
        config.suspense.new_path_probability = -0.1;
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("collision_check_sensitivity"));
        assert!(err.contains("new_path_probability"));
    }

    #[test]
    fn test_validate_rejects_empty_conspirator_range() {
        let mut config = test_config();
        config.generation.min_conspirators = 5;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("conspirator range"));
    }

    #[test]
    fn test_validate_rejects_initial_level_above_max() {
        let mut config = test_config();
        config.suspense.initial_level = 11;
        assert!(config.validate().is_err());
    }
}
