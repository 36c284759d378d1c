//! Error types for fin-assist.

use std::path::PathBuf;
use std::time::Duration;

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Database-related errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Errors reading or flattening an input dataset.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("{source_name} data file not found: {}", .path.display())]
    NotFound { source_name: String, path: PathBuf },

    #[error("Failed to read {source_name} data file {}: {reason}", .path.display())]
    Unreadable {
        source_name: String,
        path: PathBuf,
        reason: String,
    },

    #[error("Invalid JSON in {source_name} file: {reason}")]
    InvalidJson { source_name: String, reason: String },

    #[error("Failed to parse {source_name} data: {reason}")]
    Malformed { source_name: String, reason: String },
}

/// Input validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Invalid date format for {field}: {value} (expected YYYY-MM-DD)")]
    InvalidDate { field: String, value: String },

    #[error("{start_field} must be before {end_field}")]
    InvertedRange {
        start_field: String,
        end_field: String,
    },

    #[error("Invalid source: {0}")]
    InvalidSource(String),

    #[error("Invalid numeric value for {0}")]
    InvalidAmount(String),
}

/// LLM provider errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Provider {provider} rate limited, retry after {retry_after:?}")]
    RateLimited {
        provider: String,
        retry_after: Option<Duration>,
    },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("Authentication failed for provider {provider}")]
    AuthFailed { provider: String },
}

/// Errors surfaced by the data and AI services.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("{0}")]
    InvalidRequest(String),

    #[error("{entity} {id} not found")]
    NotFound { entity: String, id: String },

    #[error("LLM API key not configured")]
    NotConfigured,

    #[error("Failed to process {purpose} request: {source}")]
    Llm {
        purpose: String,
        #[source]
        source: LlmError,
    },

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}
