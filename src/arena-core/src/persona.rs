//! Debate personas and speaker identities.

use serde::{Deserialize, Serialize};

/// One of the two fixed debate slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    A,
    B,
}

impl Side {
    /// The opposing slot.
    pub fn other(self) -> Side {
        match self {
            Side::A => Side::B,
            Side::B => Side::A,
        }
    }
}

/// Who authored a transcript entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Speaker {
    Side(Side),
    User,
    System,
}

impl Speaker {
    pub fn side(self) -> Option<Side> {
        match self {
            Speaker::Side(side) => Some(side),
            _ => None,
        }
    }
}

/// Identity of one debate side. Immutable for the duration of a debate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Persona {
    /// Display name for this persona.
    pub name: String,
    /// Stance or role, free text (e.g., "Pro", "Skeptical scientist").
    pub role: String,
    /// Speaking tone, free text.
    pub tone: String,
    /// Comma-separated character traits.
    pub traits: String,
    /// Presentation-only accent color.
    pub accent_color: String,
}

impl Persona {
    pub fn new(
        name: impl Into<String>,
        role: impl Into<String>,
        tone: impl Into<String>,
        traits: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            role: role.into(),
            tone: tone.into(),
            traits: traits.into(),
            accent_color: String::new(),
        }
    }

    pub fn with_accent_color(mut self, color: impl Into<String>) -> Self {
        self.accent_color = color.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_side_other_flips() {
        assert_eq!(Side::A.other(), Side::B);
        assert_eq!(Side::B.other(), Side::A);
        assert_eq!(Side::A.other().other(), Side::A);
    }

    #[test]
    fn test_speaker_side_extraction() {
        assert_eq!(Speaker::Side(Side::A).side(), Some(Side::A));
        assert_eq!(Speaker::User.side(), None);
        assert_eq!(Speaker::System.side(), None);
    }
}
