//! Cleanup of raw provider output into spoken text.
//!
//! Models echo role labels, wrap replies in quotes, emit stage directions
//! in asterisks, and sometimes leak hidden reasoning blocks. None of that
//! is spoken content.

use regex::Regex;

/// Reasoning/internal tags stripped together with their content.
const REASONING_TAGS: &[&str] = &["think", "thinking", "reasoning", "reflection"];

/// Generic role words a model may echo as a leading label.
const ROLE_WORDS: &[&str] = &["AI", "Pro", "Contra", "Speaker", "User"];

const QUOTE_CHARS: &[char] = &['"', '\''];

/// Strip provider artifacts from `raw`.
///
/// One cleanup pass can expose a new artifact (removing emphasis can
/// uncover wrapping quotes, a stripped prefix can reveal another), so the
/// passes are iterated until the text stops changing. Since every pass
/// only removes characters this terminates, and it makes the function
/// idempotent: `sanitize(sanitize(x)) == sanitize(x)`.
pub fn sanitize(raw: &str, speaker_name: &str) -> String {
    let mut text = raw.to_string();
    loop {
        let next = sanitize_pass(&text, speaker_name);
        if next == text {
            return next;
        }
        text = next;
    }
}

fn sanitize_pass(raw: &str, speaker_name: &str) -> String {
    let mut text = raw.to_string();

    // Hidden reasoning blocks are internal monologue, not dialogue.
    for tag in REASONING_TAGS {
        let pattern = format!(r"(?is)<{tag}[^>]*>.*?</{tag}>", tag = tag);
        if let Ok(re) = Regex::new(&pattern) {
            text = re.replace_all(&text, "").to_string();
        }
    }

    // Leading self-referential role label, e.g. `Contra: ...` or `Nova: ...`.
    let mut labels: Vec<String> = vec![regex::escape(speaker_name)];
    labels.extend(ROLE_WORDS.iter().map(|w| (*w).to_string()));
    let prefix = format!(r"(?i)^\s*({}):\s*", labels.join("|"));
    if let Ok(re) = Regex::new(&prefix) {
        text = re.replace(&text, "").to_string();
    }

    // A wrapping quote pair, only when present at both ends.
    let trimmed = text.trim();
    let mut chars = trimmed.chars();
    if let (Some(first), Some(last)) = (chars.next(), chars.next_back()) {
        if QUOTE_CHARS.contains(&first) && QUOTE_CHARS.contains(&last) {
            text = trimmed[first.len_utf8()..trimmed.len() - last.len_utf8()].to_string();
        }
    }

    // Emphasis runs are stage directions, not spoken content.
    if let Ok(re) = Regex::new(r"\*[^*]+\*") {
        text = re.replace_all(&text, "").to_string();
    }

    text.trim().to_string()
}
