//! Per-turn instruction text for the generation provider.
//!
//! The block order is deliberate and must not be shuffled: the model
//! weighs later blocks more heavily, so the director override and the
//! immediate task sit below the identity preamble.

use rand::seq::IndexedRandom;

use crate::persona::Persona;

/// Cap on the quoted opponent excerpt.
const OPPONENT_QUOTE_CHARS: usize = 200;
/// Cap on each anti-repetition excerpt.
const SELF_EXCERPT_CHARS: usize = 30;

/// Source of the per-turn rhetorical tactic. The draw must be repeated on
/// every call; tests supply a deterministic provider.
pub trait TacticProvider: Send + Sync {
    fn draw(&self) -> String;
}

/// Uniform draw from a tactic catalog.
pub struct CatalogTactics {
    tactics: Vec<String>,
}

impl CatalogTactics {
    pub fn new(tactics: Vec<String>) -> Self {
        Self { tactics }
    }
}

impl TacticProvider for CatalogTactics {
    fn draw(&self) -> String {
        self.tactics
            .choose(&mut rand::rng())
            .cloned()
            .unwrap_or_default()
    }
}

/// First `limit` characters of `text` (char boundary safe).
fn excerpt(text: &str, limit: usize) -> String {
    text.chars().take(limit).collect()
}

/// Build the system prompt for one turn.
///
/// Deterministic given its inputs except for the tactic draw. Pure: no
/// side effects, no I/O.
#[allow(clippy::too_many_arguments)]
pub fn build_prompt(
    speaker: &Persona,
    opponent_name: &str,
    topic: &str,
    language: &str,
    last_opponent_utterance: Option<&str>,
    recent_self_utterances: &[String],
    intervention: Option<&str>,
    tactics: &dyn TacticProvider,
) -> String {
    let tactic = tactics.draw();

    let mut prompt = format!(
        "Identity: {name} ({role}).\n\
         Traits: {traits}.\n\
         Tone: {tone}.\n\
         Lang: {language}.\n\
         Topic: \"{topic}\".\n\
         Vs: {opponent}.\n\
         \n\
         MANDATORY STRATEGY: \"{tactic}\".\n\
         \n\
         EMOJI RULE: You MUST use 1-3 emojis in your response to convey strong emotion. Place them naturally.\n",
        name = speaker.name,
        role = speaker.role,
        traits = speaker.traits,
        tone = speaker.tone,
        language = language,
        topic = topic,
        opponent = opponent_name,
        tactic = tactic,
    );

    if let Some(directive) = intervention {
        prompt.push_str(&format!(
            "\n*** URGENT DIRECTOR INSTRUCTION ***\n\
             The show director has issued a command you MUST follow immediately:\n\
             {directive}\n\
             ***********************************\n"
        ));
    }

    match last_opponent_utterance {
        Some(said) => {
            prompt.push_str(&format!(
                "\nOPPONENT SAID:\n\
                 \"{}...\"\n\
                 \n\
                 TASK:\n\
                 1. Acknowledge their point briefly.\n\
                 2. DESTROY it using the strategy.\n",
                excerpt(said, OPPONENT_QUOTE_CHARS)
            ));
        }
        None => {
            prompt.push_str(&format!(
                "\nTASK:\n\
                 Start with a controversial claim about \"{topic}\".\n"
            ));
        }
    }

    if !recent_self_utterances.is_empty() {
        prompt.push_str("\nAVOID REPEATING:\n");
        for line in recent_self_utterances {
            prompt.push_str(&format!("- [{}...]\n", excerpt(line, SELF_EXCERPT_CHARS)));
        }
    }

    prompt.push_str(
        "\nRULES:\n\
         - Max 2 sentences. Punchy.\n\
         - No boilerplate.\n",
    );

    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    pub struct FixedTactic(pub &'static str);

    impl TacticProvider for FixedTactic {
        fn draw(&self) -> String {
            self.0.to_string()
        }
    }

    fn persona() -> Persona {
        Persona::new("Nova", "Pro", "smug", "witty, relentless")
    }

    #[test]
    fn test_block_order_is_fixed() {
        let prompt = build_prompt(
            &persona(),
            "Rex",
            "Cats vs Dogs",
            "English",
            Some("Dogs are loyal."),
            &["Cats are liquid.".to_string()],
            Some("MANDATORY: be furious"),
            &FixedTactic("Use a vivid analogy"),
        );

        let identity = prompt.find("Identity: Nova (Pro)").unwrap();
        let tactic = prompt.find("MANDATORY STRATEGY: \"Use a vivid analogy\"").unwrap();
        let emoji = prompt.find("EMOJI RULE").unwrap();
        let urgent = prompt.find("URGENT DIRECTOR INSTRUCTION").unwrap();
        let opponent = prompt.find("OPPONENT SAID").unwrap();
        let avoid = prompt.find("AVOID REPEATING").unwrap();
        let rules = prompt.find("RULES:").unwrap();

        assert!(identity < tactic && tactic < emoji);
        assert!(emoji < urgent && urgent < opponent);
        assert!(opponent < avoid && avoid < rules);
    }

    #[test]
    fn test_opens_with_bold_claim_without_opponent_line() {
        let prompt = build_prompt(
            &persona(),
            "Rex",
            "Cats vs Dogs",
            "English",
            None,
            &[],
            None,
            &FixedTactic("t"),
        );
        assert!(prompt.contains("Start with a controversial claim about \"Cats vs Dogs\"."));
        assert!(!prompt.contains("OPPONENT SAID"));
        assert!(!prompt.contains("URGENT DIRECTOR INSTRUCTION"));
        assert!(!prompt.contains("AVOID REPEATING"));
    }

    #[test]
    fn test_opponent_quote_truncated_to_200_chars() {
        let long = "x".repeat(300);
        let prompt = build_prompt(
            &persona(),
            "Rex",
            "T",
            "English",
            Some(&long),
            &[],
            None,
            &FixedTactic("t"),
        );
        assert!(prompt.contains(&format!("\"{}...\"", "x".repeat(200))));
        assert!(!prompt.contains(&"x".repeat(201)));
    }

    #[test]
    fn test_self_excerpts_truncated_to_30_chars() {
        let lines = vec!["y".repeat(80)];
        let prompt = build_prompt(
            &persona(),
            "Rex",
            "T",
            "English",
            None,
            &lines,
            None,
            &FixedTactic("t"),
        );
        assert!(prompt.contains(&format!("- [{}...]", "y".repeat(30))));
        assert!(!prompt.contains(&"y".repeat(31)));
    }

    #[test]
    fn test_catalog_draw_comes_from_catalog() {
        let catalog = CatalogTactics::new(vec!["only option".to_string()]);
        assert_eq!(catalog.draw(), "only option");
    }
}
