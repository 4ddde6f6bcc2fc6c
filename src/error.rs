//! Jazmin Error Types
//!
//! Centralized error handling for the chat, speech and tuning paths.

use thiserror::Error;

/// Central error type for Jazmin
#[derive(Error, Debug)]
pub enum JazminError {
    #[error("Chat API error: {0}")]
    Chat(String),

    #[error("TTS engine error: {0}")]
    Tts(String),

    #[error("Audio playback error: {0}")]
    Audio(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid name: {0}")]
    InvalidName(String),

    #[error("Lock poisoned: {0}")]
    Lock(String),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias for Jazmin operations
pub type JazminResult<T> = Result<T, JazminError>;

/// Helper to convert Mutex poison errors
impl<T> From<std::sync::PoisonError<T>> for JazminError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        JazminError::Lock(err.to_string())
    }
}
