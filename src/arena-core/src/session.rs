//! Run-level debate state.

use serde::{Deserialize, Serialize};

use crate::director::InterventionSlot;
use crate::persona::{Persona, Side};
use crate::transcript::Transcript;

/// Lifecycle status of a debate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DebateStatus {
    Running,
    Paused,
    Stopped,
}

/// Everything a debate is started with. Immutable for the run.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub topic: String,
    pub language: String,
    pub persona_a: Persona,
    pub persona_b: Persona,
    /// Cosmetic model label shown for side A; carries no behavioral weight.
    pub model_label_a: String,
    /// Cosmetic model label shown for side B.
    pub model_label_b: String,
}

/// The run-level aggregate owned and mutated only by the scheduler.
#[derive(Debug)]
pub struct DebateSession {
    pub config: SessionConfig,
    pub transcript: Transcript,
    pub status: DebateStatus,
    pub active_speaker: Side,
    pub pending_intervention: InterventionSlot,
}

impl DebateSession {
    /// Side B opens the debate.
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            transcript: Transcript::new(),
            status: DebateStatus::Running,
            active_speaker: Side::B,
            pending_intervention: InterventionSlot::default(),
        }
    }

    pub fn persona(&self, side: Side) -> &Persona {
        match side {
            Side::A => &self.config.persona_a,
            Side::B => &self.config.persona_b,
        }
    }

    pub fn is_running(&self) -> bool {
        self.status == DebateStatus::Running
    }
}
