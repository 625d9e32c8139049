//! Configuration module for loading TOML config files.

use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::error::ArenaError;
use crate::persona::Side;

/// Root configuration structure.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub generation: GenerationConfig,
    #[serde(default)]
    pub voices: VoicesConfig,
    pub content: ContentConfig,
}

/// Settings for the remote generation exchange.
#[derive(Debug, Clone, Deserialize)]
pub struct GenerationConfig {
    /// Model identifier forwarded to the provider.
    pub model: String,
    /// Relay endpoint the gateway posts chat requests to.
    pub endpoint: String,
}

/// Voice configuration for TTS.
#[derive(Debug, Clone, Deserialize)]
pub struct VoicesConfig {
    pub side_a_voice: String,
    pub side_b_voice: String,
}

impl Default for VoicesConfig {
    fn default() -> Self {
        Self {
            side_a_voice: "bm_george".to_string(),
            side_b_voice: "bf_emma".to_string(),
        }
    }
}

impl VoicesConfig {
    pub fn voice_for(&self, side: Side) -> &str {
        match side {
            Side::A => &self.side_a_voice,
            Side::B => &self.side_b_voice,
        }
    }
}

/// Opaque content catalogs: rhetorical tactics and fallback lines.
#[derive(Debug, Clone, Deserialize)]
pub struct ContentConfig {
    /// Rhetorical tactics, one drawn uniformly per turn.
    pub tactics: Vec<String>,
    /// Generic rebuttals used when generation attempts are exhausted.
    pub fallbacks: Vec<String>,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ArenaError> {
        let content = fs::read_to_string(path.as_ref())
            .map_err(|e| ArenaError::ConfigError(format!("Failed to read config: {}", e)))?;

        toml::from_str(&content)
            .map_err(|e| ArenaError::ConfigError(format!("Failed to parse config: {}", e)))
    }

    /// Load configuration from string content.
    pub fn from_str(content: &str) -> Result<Self, ArenaError> {
        toml::from_str(content)
            .map_err(|e| ArenaError::ConfigError(format!("Failed to parse config: {}", e)))
    }
}

/// Default configuration embedded in the binary.
pub fn default_config() -> Config {
    Config {
        generation: GenerationConfig {
            model: "meta-llama/llama-3.3-70b-instruct:free".to_string(),
            endpoint: "http://127.0.0.1:8787/api/chat".to_string(),
        },
        voices: VoicesConfig::default(),
        content: ContentConfig {
            tactics: DEFAULT_TACTICS.iter().map(|s| s.to_string()).collect(),
            fallbacks: DEFAULT_FALLBACKS.iter().map(|s| s.to_string()).collect(),
        },
    }
}

const DEFAULT_TACTICS: &[&str] = &[
    "Use a dramatic historical analogy",
    "Cite a suspiciously precise statistic with total confidence",
    "Reframe the opponent's point so it supports your side",
    "Ask a rhetorical question and answer it yourself",
    "Appeal to the common sense the audience already shares",
    "Push the opponent's argument to an absurd conclusion",
    "Tell a one-sentence personal anecdote as proof",
    "Attack the premise, not the conclusion",
];

const DEFAULT_FALLBACKS: &[&str] = &[
    "Your logic is full of holes. 🕳️",
    "Are you even listening to yourself? 🤨",
    "That is scientifically inaccurate. 🧪",
    "You are missing the entire point. 🎯",
    "Let's stick to the facts, shall we? 📉",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_has_catalogs() {
        let config = default_config();
        assert!(!config.content.tactics.is_empty());
        assert_eq!(config.content.fallbacks.len(), 5);
        assert!(config.generation.endpoint.ends_with("/api/chat"));
    }

    #[test]
    fn test_parse_round_trip() {
        let toml_src = r#"
            [generation]
            model = "test-model"
            endpoint = "http://localhost:9999/api/chat"

            [voices]
            side_a_voice = "am_adam"
            side_b_voice = "af_sky"

            [content]
            tactics = ["only tactic"]
            fallbacks = ["only fallback"]
        "#;
        let config = Config::from_str(toml_src).unwrap();
        assert_eq!(config.generation.model, "test-model");
        assert_eq!(config.voices.voice_for(Side::A), "am_adam");
        assert_eq!(config.content.tactics, vec!["only tactic"]);
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let err = Config::from_str("not valid [[ toml").unwrap_err();
        assert!(err.to_string().contains("Failed to parse config"));
    }
}
