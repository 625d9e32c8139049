//! Arena Core Library
//!
//! Provides the debate loop, prompt construction, response cleanup,
//! the retrying generation gateway, and the TTS speech sink.

pub mod config;
pub mod director;
pub mod error;
pub mod gateway;
pub mod persona;
pub mod prompt;
pub mod sanitize;
pub mod scheduler;
pub mod session;
pub mod transcript;
pub mod tts;

pub use config::{Config, default_config};
pub use director::Intervention;
pub use error::ArenaError;
pub use gateway::{ChatTransport, Gateway, HttpTransport};
pub use persona::{Persona, Side, Speaker};
pub use prompt::{CatalogTactics, TacticProvider, build_prompt};
pub use sanitize::sanitize;
pub use scheduler::{ArenaEvent, ArenaHandle, DebateScheduler};
pub use session::{DebateStatus, SessionConfig};
pub use transcript::{Transcript, TranscriptEntry};
pub use tts::{KokoroSpeech, NullSpeech, SpeechSink};
