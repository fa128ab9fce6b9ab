use thiserror::Error;

/// Application-level errors
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Generator error: {0}")]
    Generator(#[from] GeneratorError),

    #[error("Case error: {0}")]
    Case(#[from] CaseError),

    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Text generator (LLM pipe) errors
#[derive(Debug, Error)]
pub enum GeneratorError {
    #[error("Generator unavailable: {message} (retries: {retries})")]
    Unavailable { message: String, retries: u32 },

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Invalid response: {message}")]
    InvalidResponse { message: String },

    #[error("Request timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl GeneratorError {
    /// Whether repeating the same request could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Api { status, .. } => *status >= 500 || *status == 408 || *status == 429,
            _ => true,
        }
    }
}

/// Errors loading or saving case files and story records
#[derive(Debug, Error)]
pub enum CaseError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid case: {}", issues.join("; "))]
    Invalid { issues: Vec<String> },
}

/// Result type alias for application errors
pub type AppResult<T> = Result<T, AppError>;

/// Result type alias for generator calls
pub type GeneratorResult<T> = Result<T, GeneratorError>;

/// Result type alias for case and record files
pub type CaseResult<T> = Result<T, CaseError>;
