//! Summarizer collaborator — condenses turns dropped during trimming.

use async_trait::async_trait;

use crate::turn::{Role, Turn};

/// Condenses a run of turns into one replacement summary. Invoked by the
/// context store when history exceeds its budget.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, turns: &[Turn]) -> String;
}

/// The default heuristic: first line of each turn, role-prefixed, truncated
/// to a character cap. A model-backed summarizer can replace this.
pub struct TruncateSummarizer {
    max_chars: usize,
}

impl TruncateSummarizer {
    pub fn new(max_chars: usize) -> Self {
        Self { max_chars }
    }
}

impl Default for TruncateSummarizer {
    fn default() -> Self {
        Self::new(480)
    }
}

#[async_trait]
impl Summarizer for TruncateSummarizer {
    async fn summarize(&self, turns: &[Turn]) -> String {
        let mut summary = String::from("Earlier in this conversation: ");
        for turn in turns {
            let prefix = match turn.role {
                Role::User => "user",
                Role::Assistant => "assistant",
                Role::System => "system",
                Role::ToolResult => "tool",
            };
            let first_line = turn.content.lines().next().unwrap_or("");
            summary.push_str(prefix);
            summary.push_str(": ");
            summary.push_str(first_line);
            summary.push_str("; ");
        }

        if summary.len() > self.max_chars {
            // Cut on a char boundary, not mid-codepoint.
            let mut cut = self.max_chars;
            while !summary.is_char_boundary(cut) {
                cut -= 1;
            }
            summary.truncate(cut);
            summary.push('…');
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn summarizer_prefixes_roles() {
        let summarizer = TruncateSummarizer::default();
        let turns = vec![Turn::user("What is Rust?"), Turn::assistant("A language.")];
        let summary = summarizer.summarize(&turns).await;
        assert!(summary.contains("user: What is Rust?"));
        assert!(summary.contains("assistant: A language."));
    }

    #[tokio::test]
    async fn summarizer_truncates_on_char_boundary() {
        let summarizer = TruncateSummarizer::new(40);
        let turns = vec![Turn::user("éééééééééééééééééééééééééééééééééééééééé")];
        let summary = summarizer.summarize(&turns).await;
        assert!(summary.chars().count() > 0);
        assert!(summary.len() <= 44); // cap + ellipsis bytes
        assert!(summary.ends_with('…'));
    }

    #[tokio::test]
    async fn summarizer_uses_first_line_only() {
        let summarizer = TruncateSummarizer::default();
        let turns = vec![Turn::assistant("line one\nline two\nline three")];
        let summary = summarizer.summarize(&turns).await;
        assert!(summary.contains("line one"));
        assert!(!summary.contains("line two"));
    }
}
