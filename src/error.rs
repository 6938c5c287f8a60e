//! Error types for Svar.

use thiserror::Error;

/// Library-level error type for Svar operations.
#[derive(Error, Debug)]
pub enum SvarError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Empty transcript for video {0}")]
    EmptyTranscript(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),

    #[error("Collection already exists for video {0}")]
    CollectionExists(String),

    #[error("Collection not found for video {0}")]
    CollectionNotFound(String),

    #[error("Embedding model unavailable: {0}")]
    EmbeddingUnavailable(String),

    #[error("Generation model did not respond within {0} seconds")]
    GenerationTimeout(u64),

    #[error("Generation failed: {0}")]
    Generation(String),

    #[error("Index error: {0}")]
    Index(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
}

/// Coarse error classification for callers that branch on the class of
/// failure rather than the specific variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Caller error: malformed input, invalid parameters. Never worth retrying.
    Input,
    /// An external model or service could not be reached. The caller decides
    /// whether to retry; the library never retries on its own.
    ResourceUnavailable,
    /// A collection that was dropped or never created.
    NotFound,
    /// Everything else: storage, IO, serialization.
    Internal,
}

impl SvarError {
    /// Classify this error per the taxonomy above.
    pub fn kind(&self) -> ErrorKind {
        match self {
            SvarError::Config(_)
            | SvarError::EmptyTranscript(_)
            | SvarError::InvalidQuery(_)
            | SvarError::DimensionMismatch(_)
            | SvarError::CollectionExists(_) => ErrorKind::Input,
            SvarError::EmbeddingUnavailable(_)
            | SvarError::GenerationTimeout(_)
            | SvarError::Http(_) => ErrorKind::ResourceUnavailable,
            SvarError::CollectionNotFound(_) => ErrorKind::NotFound,
            SvarError::Generation(_)
            | SvarError::Index(_)
            | SvarError::Io(_)
            | SvarError::Json(_)
            | SvarError::TomlParse(_)
            | SvarError::Database(_) => ErrorKind::Internal,
        }
    }
}

/// Result type alias for Svar operations.
pub type Result<T> = std::result::Result<T, SvarError>;
