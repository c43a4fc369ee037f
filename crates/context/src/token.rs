//! Token estimation utilities.
//!
//! Uses a character-based heuristic: ~4 characters per token. This
//! approximation is accurate within ~10% for BPE tokenizers (GPT-4, Claude)
//! on English text, and it is deterministic, which the windowing code
//! depends on.

use colloquy_core::turn::Turn;

/// Estimate the token count for a string.
///
/// Heuristic: 1 token ≈ 4 characters. Rounds up.
pub fn estimate_tokens(text: &str) -> usize {
    if text.is_empty() {
        return 0;
    }
    (text.len() + 3) / 4
}

/// Estimate tokens for a single turn including per-turn overhead.
///
/// Each turn costs ~4 tokens of overhead for role name, delimiters, and
/// formatting markers in the wire format. Attachment references count too:
/// backends render them into the prompt.
pub fn estimate_turn_tokens(turn: &Turn) -> usize {
    let overhead = 4;
    let attachment_tokens: usize = turn
        .attachments
        .iter()
        .map(|a| estimate_tokens(&a.name) + estimate_tokens(&a.uri))
        .sum();
    overhead + estimate_tokens(&turn.content) + attachment_tokens
}

/// Estimate tokens for a slice of turns.
pub fn estimate_turns_tokens(turns: &[Turn]) -> usize {
    turns.iter().map(estimate_turn_tokens).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_string_is_zero() {
        assert_eq!(estimate_tokens(""), 0);
    }

    #[test]
    fn four_chars_is_one_token() {
        assert_eq!(estimate_tokens("test"), 1);
    }

    #[test]
    fn five_chars_rounds_up() {
        assert_eq!(estimate_tokens("hello"), 2);
    }

    #[test]
    fn hundred_chars() {
        let text = "a".repeat(100);
        assert_eq!(estimate_tokens(&text), 25);
    }

    #[test]
    fn turn_includes_overhead() {
        let turn = Turn::user("test"); // 4 chars → 1 token + 4 overhead = 5
        assert_eq!(estimate_turn_tokens(&turn), 5);
    }

    #[test]
    fn attachments_counted() {
        let bare = Turn::user("test");
        let with = Turn::user("test").with_attachment("notes.txt", "file:///tmp/notes.txt");
        assert!(estimate_turn_tokens(&with) > estimate_turn_tokens(&bare));
    }

    #[test]
    fn multiple_turns() {
        let turns = vec![
            Turn::user("hello"),      // 5 chars → 2 tokens + 4 overhead = 6
            Turn::assistant("world"), // 5 chars → 2 tokens + 4 overhead = 6
        ];
        assert_eq!(estimate_turns_tokens(&turns), 12);
    }
}
