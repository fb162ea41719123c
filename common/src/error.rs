use thiserror::Error;
use tokio::task::JoinError;

// Core internal errors
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Invalid refresh token")]
    AuthInvalid,
    #[error("Rate limit exceeded, retry after {retry_after}s")]
    RateLimited { retry_after: u64 },
    #[error("External provider error: {0}")]
    External(String),
    #[error("Cache error: {0}")]
    Cache(#[from] redis::RedisError),
    #[error("Database error: {0}")]
    Persistence(#[from] surrealdb::Error),
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("Corpus parse error in {path}: {message}")]
    CorpusParse { path: String, message: String },
    #[error("Reqwest error: {0}")]
    Reqwest(#[from] reqwest::Error),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("IoError: {0}")]
    Io(#[from] std::io::Error),
    #[error("Task join error: {0}")]
    Join(#[from] JoinError),
    #[error("Anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),
    #[error("Internal service error: {0}")]
    InternalError(String),
}

impl AppError {
    /// Stable machine-readable kind, used in logs and response envelopes.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::NotFound(_) => "not_found",
            Self::AuthInvalid => "auth_invalid",
            Self::RateLimited { .. } => "rate_limited",
            Self::External(_) => "external",
            Self::Cache(_) => "cache",
            Self::Persistence(_) => "persistence",
            Self::Configuration(_) => "configuration",
            Self::CorpusParse { .. } => "corpus_parse",
            Self::Reqwest(_) => "external",
            Self::Serde(_) => "internal",
            Self::Io(_) => "internal",
            Self::Join(_) => "internal",
            Self::Anyhow(_) => "internal",
            Self::InternalError(_) => "internal",
        }
    }
}
