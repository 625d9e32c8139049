//! Error types for the arena.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ArenaError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("TTS error: {0}")]
    TtsError(String),

    #[error("Unknown intervention: {0}")]
    UnknownIntervention(String),
}
