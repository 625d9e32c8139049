//! The visible conversation and its entry lifecycle.
//!
//! Entries are created either finalized (system/user lines) or pending
//! (a placeholder while generation is in flight). A pending entry is
//! finalized exactly once, or removed outright when its turn is cancelled.

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::persona::{Side, Speaker};

/// Stable identifier for a transcript entry, monotonic within a session.
pub type EntryId = u64;

/// One unit of the visible conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub id: EntryId,
    pub speaker: Speaker,
    pub display_name: String,
    pub text: String,
    /// Milliseconds since the Unix epoch.
    pub created_at: u64,
    /// True while generation for this entry is in flight.
    pub pending: bool,
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Append-ordered conversation transcript.
///
/// Append order is the authoritative conversation order. At most one
/// pending entry exists at any time; while in flight it is always the
/// most recent entry.
#[derive(Debug, Default, Clone)]
pub struct Transcript {
    entries: Vec<TranscriptEntry>,
    next_id: EntryId,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn push(&mut self, speaker: Speaker, display_name: String, text: String, pending: bool) -> EntryId {
        let id = self.next_id;
        self.next_id += 1;
        self.entries.push(TranscriptEntry {
            id,
            speaker,
            display_name,
            text,
            created_at: now_millis(),
            pending,
        });
        id
    }

    /// Append a finalized system entry.
    pub fn push_system(&mut self, author: impl Into<String>, text: impl Into<String>) -> EntryId {
        self.push(Speaker::System, author.into(), text.into(), false)
    }

    /// Append a finalized user entry.
    pub fn push_user(&mut self, author: impl Into<String>, text: impl Into<String>) -> EntryId {
        self.push(Speaker::User, author.into(), text.into(), false)
    }

    /// Append a pending placeholder for `side`, or `None` if a pending
    /// entry already exists (a turn is already in flight).
    pub fn begin_pending(&mut self, side: Side, display_name: impl Into<String>) -> Option<EntryId> {
        if self.pending_id().is_some() {
            return None;
        }
        Some(self.push(Speaker::Side(side), display_name.into(), String::new(), true))
    }

    /// Id of the in-flight entry, if any.
    pub fn pending_id(&self) -> Option<EntryId> {
        self.entries.iter().find(|e| e.pending).map(|e| e.id)
    }

    /// Finalize a pending entry in place with its spoken text. This is the
    /// sole mutation an entry undergoes after creation. Returns false if
    /// the entry no longer exists or was already finalized.
    pub fn finalize(&mut self, id: EntryId, text: impl Into<String>) -> bool {
        match self.entries.iter_mut().find(|e| e.id == id && e.pending) {
            Some(entry) => {
                entry.text = text.into();
                entry.pending = false;
                entry.created_at = now_millis();
                true
            }
            None => false,
        }
    }

    /// Remove an entry (used to discard a cancelled turn's placeholder).
    pub fn remove(&mut self, id: EntryId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.id != id);
        self.entries.len() != before
    }

    /// Remove the pending entry, if any, returning its id.
    pub fn remove_pending(&mut self) -> Option<EntryId> {
        let id = self.pending_id()?;
        self.remove(id);
        Some(id)
    }

    /// Entries that count as conversation: finalized and not system-authored.
    fn relevant(&self) -> impl Iterator<Item = &TranscriptEntry> {
        self.entries
            .iter()
            .filter(|e| !e.pending && e.speaker != Speaker::System)
    }

    /// The most recent conversational line, if it was not spoken by `side`.
    /// A debater only rebuts what was just said, so anything older is ignored.
    pub fn last_opponent_utterance(&self, side: Side) -> Option<&str> {
        let last = self.relevant().last()?;
        if last.speaker == Speaker::Side(side) {
            None
        } else {
            Some(last.text.as_str())
        }
    }

    /// Up to the last `limit` lines spoken by `side`, oldest first.
    pub fn recent_self_utterances(&self, side: Side, limit: usize) -> Vec<String> {
        let own: Vec<&TranscriptEntry> = self
            .relevant()
            .filter(|e| e.speaker == Speaker::Side(side))
            .collect();
        let start = own.len().saturating_sub(limit);
        own[start..].iter().map(|e| e.text.clone()).collect()
    }

    /// The last `limit` conversational entries, oldest first, for the
    /// history payload sent to generation.
    pub fn history_window(&self, limit: usize) -> Vec<&TranscriptEntry> {
        let relevant: Vec<&TranscriptEntry> = self.relevant().collect();
        let start = relevant.len().saturating_sub(limit);
        relevant[start..].to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_at_most_one_pending() {
        let mut t = Transcript::new();
        let first = t.begin_pending(Side::A, "Nova");
        assert!(first.is_some());
        assert!(t.begin_pending(Side::B, "Vex").is_none());
        assert_eq!(t.entries.iter().filter(|e| e.pending).count(), 1);
    }

    #[test]
    fn test_finalize_is_one_shot() {
        let mut t = Transcript::new();
        let id = t.begin_pending(Side::A, "Nova").unwrap();
        assert!(t.finalize(id, "First point."));
        assert!(!t.finalize(id, "Second point."));
        assert_eq!(t.entries()[0].text, "First point.");
        assert!(!t.entries()[0].pending);
    }

    #[test]
    fn test_remove_pending_discards_placeholder() {
        let mut t = Transcript::new();
        t.push_system("Host", "welcome");
        let id = t.begin_pending(Side::B, "Vex").unwrap();
        assert_eq!(t.remove_pending(), Some(id));
        assert_eq!(t.len(), 1);
        assert!(t.pending_id().is_none());
    }

    #[test]
    fn test_last_opponent_skips_own_trailing_line() {
        let mut t = Transcript::new();
        let a = t.begin_pending(Side::A, "Nova").unwrap();
        t.finalize(a, "Cats rule.");
        assert_eq!(t.last_opponent_utterance(Side::B), Some("Cats rule."));
        // From A's perspective the trailing line is its own.
        assert_eq!(t.last_opponent_utterance(Side::A), None);
    }

    #[test]
    fn test_history_window_excludes_system_and_pending() {
        let mut t = Transcript::new();
        t.push_system("Host", "intro");
        for i in 0..6 {
            let side = if i % 2 == 0 { Side::A } else { Side::B };
            let id = t.begin_pending(side, "x").unwrap();
            t.finalize(id, format!("line {i}"));
        }
        t.begin_pending(Side::A, "x").unwrap();
        let window = t.history_window(4);
        assert_eq!(window.len(), 4);
        assert_eq!(window[0].text, "line 2");
        assert_eq!(window[3].text, "line 5");
    }

    #[test]
    fn test_recent_self_keeps_latest_three() {
        let mut t = Transcript::new();
        for i in 0..5 {
            let id = t.begin_pending(Side::A, "Nova").unwrap();
            t.finalize(id, format!("own {i}"));
        }
        let recent = t.recent_self_utterances(Side::A, 3);
        assert_eq!(recent, vec!["own 2", "own 3", "own 4"]);
        assert!(t.recent_self_utterances(Side::B, 3).is_empty());
    }

    #[test]
    fn test_user_entries_count_as_conversation() {
        let mut t = Transcript::new();
        t.push_user("You", "What about ferrets?");
        assert_eq!(t.last_opponent_utterance(Side::A), Some("What about ferrets?"));
        assert_eq!(t.history_window(4).len(), 1);
    }
}
