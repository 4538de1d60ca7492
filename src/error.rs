//! Muninn error types

/// Muninn error types
#[derive(Debug, thiserror::Error)]
pub enum MuninnError {
    // Context/key resolution errors
    #[error("plugin context is missing {0} instance settings")]
    MissingSettings(&'static str),

    #[error("invalid plugin context: {0}")]
    InvalidContext(String),

    // Construction errors
    #[error("instance construction failed: {0}")]
    Construction(String),

    // Capability errors
    #[error("instance does not support {0}")]
    Unsupported(&'static str),

    // Streaming errors
    #[error("stream error: {0}")]
    Stream(String),

    // Data errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // Configuration errors
    #[error("configuration error: {0}")]
    Configuration(String),
}

/// Result type alias for Muninn operations
pub type Result<T> = std::result::Result<T, MuninnError>;
