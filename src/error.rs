//! Error types for canvas-assist.

/// Bad environment values.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{key} has an unusable value: {message}")]
    InvalidValue { key: String, message: String },
}

/// Persistence errors, shared by every assistant store backend.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("could not open database: {0}")]
    Open(String),

    #[error("slot query failed: {0}")]
    Query(String),

    #[error("schema upgrade failed: {0}")]
    Migration(String),

    #[error("slot encoding failed: {0}")]
    Serialization(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Errors returned by the assistant manager.
#[derive(Debug, thiserror::Error)]
pub enum AssistantError {
    #[error("assistant store unavailable: {0}")]
    Store(#[from] DatabaseError),

    #[error("invalid assistant: {0}")]
    InvalidFields(String),

    #[error("no assistant with id {id}")]
    NotFound { id: String },
}

/// Speech-to-text proxy errors.
#[derive(Debug, thiserror::Error)]
pub enum TranscriptionError {
    #[error("no transcription API key configured (set GROQ_API_KEY)")]
    MissingApiKey,

    #[error("could not reach the transcription service: {0}")]
    Request(String),

    #[error("transcription service answered {status}: {message}")]
    Upstream { status: u16, message: String },

    #[error("unreadable transcription response: {0}")]
    InvalidResponse(String),
}
