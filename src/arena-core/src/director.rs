//! Director interventions: one-shot commands that bias the next turn.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::ArenaError;

/// A director command consumed by the next scheduled turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Intervention {
    Enrage,
    Confuse,
    Chaos,
}

impl Intervention {
    /// The urgent override text injected into the next prompt.
    pub fn directive(self) -> &'static str {
        match self {
            Intervention::Enrage => {
                "MANDATORY: You are now FURIOUS. Yell, insult the opponent, and be aggressive! 🤬"
            }
            Intervention::Confuse => {
                "MANDATORY: Make up a completely detailed but OBVIOUSLY FALSE scientific fact to support your argument. Gaslight the opponent. 🤥"
            }
            Intervention::Chaos => {
                "MANDATORY: Ignore the previous topic entirely. Pivot to talking about Aliens or Conspiracy Theories immediately! 👽"
            }
        }
    }

    /// Short label announced in the transcript when the command is issued.
    pub fn label(self) -> &'static str {
        match self {
            Intervention::Enrage => "ENRAGE",
            Intervention::Confuse => "CONFUSE",
            Intervention::Chaos => "CHAOS",
        }
    }
}

impl FromStr for Intervention {
    type Err = ArenaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "enrage" => Ok(Intervention::Enrage),
            "confuse" => Ok(Intervention::Confuse),
            "chaos" => Ok(Intervention::Chaos),
            other => Err(ArenaError::UnknownIntervention(other.to_string())),
        }
    }
}

/// Single-slot pending-command buffer. Setting overwrites any unconsumed
/// command; the scheduler takes (and thereby clears) it when a turn starts.
#[derive(Debug, Default, Clone)]
pub struct InterventionSlot {
    pending: Option<Intervention>,
}

impl InterventionSlot {
    pub fn set(&mut self, intervention: Intervention) {
        self.pending = Some(intervention);
    }

    /// One-shot consumption: returns the pending command and clears the slot.
    pub fn take(&mut self) -> Option<Intervention> {
        self.pending.take()
    }

    pub fn peek(&self) -> Option<Intervention> {
        self.pending
    }
}
