//! Session state: an append-only turn history plus bookkeeping.
//!
//! Turns are never edited in place. Trimming marks old turns as summarized
//! (excluded from windows) and stands a single summary turn in their place;
//! the originals stay in the session for audit.

use chrono::{DateTime, Utc};
use colloquy_core::backend::Usage;
use colloquy_core::summarize::Summarizer;
use colloquy_core::turn::{Role, SessionId, Turn};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::token;
use crate::window::{self, Window};

const TITLE_MAX_CHARS: usize = 48;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Entry {
    turn: Turn,
    summarized: bool,
}

/// One conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,

    /// Derived from the first user turn, unless set explicitly.
    pub title: Option<String>,

    entries: Vec<Entry>,
    usage: Usage,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    /// Create a new empty session.
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: SessionId::new(),
            title: None,
            entries: Vec::new(),
            usage: Usage::default(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Append a turn. The first user turn names the session.
    pub fn append(&mut self, turn: Turn) {
        if self.title.is_none() && turn.role == Role::User {
            self.title = Some(derive_title(&turn.content));
        }
        self.updated_at = Utc::now();
        self.entries.push(Entry {
            turn,
            summarized: false,
        });
    }

    /// All turns in append order, summarized ones included.
    pub fn all_turns(&self) -> Vec<&Turn> {
        self.entries.iter().map(|e| &e.turn).collect()
    }

    /// Turns eligible for windowing, in append order.
    pub fn active_turns(&self) -> Vec<Turn> {
        self.entries
            .iter()
            .filter(|e| !e.summarized)
            .map(|e| e.turn.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Estimated tokens across all active turns.
    pub fn estimated_tokens(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| !e.summarized)
            .map(|e| token::estimate_turn_tokens(&e.turn))
            .sum()
    }

    /// Select a context window over the active turns.
    pub fn window(&self, budget: usize) -> Window {
        window::select_window(&self.active_turns(), budget)
    }

    /// Convenience: just the windowed turns.
    pub fn windowed(&self, budget: usize) -> Vec<Turn> {
        self.window(budget).turns
    }

    /// Fold one round's token usage into the session total.
    pub fn absorb_usage(&mut self, usage: Usage) {
        self.usage.absorb(usage);
    }

    pub fn usage(&self) -> Usage {
        self.usage
    }

    /// Compact history down toward `target_tokens`: the oldest non-system
    /// turns before the most recent user turn are summarized into one
    /// standing summary turn. Returns how many turns were summarized.
    pub async fn compact(&mut self, target_tokens: usize, summarizer: &dyn Summarizer) -> usize {
        let before = self.estimated_tokens();
        if before <= target_tokens {
            return 0;
        }

        let last_user = self
            .entries
            .iter()
            .rposition(|e| !e.summarized && e.turn.role == Role::User);

        // Oldest-first candidates: active, non-system, strictly before the
        // in-flight user turn.
        let mut remaining = before;
        let mut candidates: Vec<usize> = Vec::new();
        for (i, entry) in self.entries.iter().enumerate() {
            if remaining <= target_tokens {
                break;
            }
            if entry.summarized || entry.turn.role == Role::System {
                continue;
            }
            if let Some(last) = last_user {
                if i >= last {
                    break;
                }
            }
            remaining -= token::estimate_turn_tokens(&entry.turn);
            candidates.push(i);
        }

        if candidates.is_empty() {
            return 0;
        }

        let turns: Vec<Turn> = candidates
            .iter()
            .map(|&i| self.entries[i].turn.clone())
            .collect();
        let summary = summarizer.summarize(&turns).await;

        for &i in &candidates {
            self.entries[i].summarized = true;
        }
        let insert_at = candidates[0];
        self.entries.insert(
            insert_at,
            Entry {
                turn: Turn::system(summary),
                summarized: false,
            },
        );
        self.updated_at = Utc::now();

        debug!(
            session = %self.id,
            summarized = candidates.len(),
            tokens_before = before,
            tokens_after = self.estimated_tokens(),
            "compacted session history"
        );
        candidates.len()
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

/// First line of the first user turn, whitespace collapsed, word-truncated.
fn derive_title(content: &str) -> String {
    let first_line = content.lines().next().unwrap_or("");
    let collapsed = first_line.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= TITLE_MAX_CHARS {
        return collapsed;
    }
    let mut title: String = collapsed.chars().take(TITLE_MAX_CHARS).collect();
    if let Some(pos) = title.rfind(' ') {
        title.truncate(pos);
    }
    title.push('…');
    title
}

#[cfg(test)]
mod tests {
    use super::*;
    use colloquy_core::summarize::TruncateSummarizer;

    #[test]
    fn first_user_turn_names_the_session() {
        let mut session = Session::new();
        assert!(session.title.is_none());

        session.append(Turn::system("You are helpful"));
        assert!(session.title.is_none());

        session.append(Turn::user("How do lifetimes work?"));
        assert_eq!(session.title.as_deref(), Some("How do lifetimes work?"));

        session.append(Turn::user("And another question"));
        assert_eq!(session.title.as_deref(), Some("How do lifetimes work?"));
    }

    #[test]
    fn long_titles_truncate_at_word_boundary() {
        let mut session = Session::new();
        session.append(Turn::user(
            "Please give me a very detailed explanation of the borrow checker internals",
        ));
        let title = session.title.unwrap();
        assert!(title.chars().count() <= TITLE_MAX_CHARS + 1);
        assert!(title.ends_with('…'));
        assert!(!title.contains("internals"));
    }

    #[test]
    fn append_preserves_order() {
        let mut session = Session::new();
        session.append(Turn::user("one"));
        session.append(Turn::assistant("two"));
        session.append(Turn::user("three"));

        let turns = session.active_turns();
        let contents: Vec<&str> = turns.iter().map(|t| t.content.as_str()).collect();
        assert_eq!(contents, vec!["one", "two", "three"]);
    }

    #[test]
    fn appended_result_visible_through_window() {
        let mut session = Session::new();
        session.append(Turn::user("list the files"));
        session.append(Turn::assistant("listing"));
        session.append(Turn::tool_result("call_1", "a.txt b.txt"));

        let windowed = session.windowed(10_000);
        assert_eq!(windowed.len(), 3);
        assert_eq!(windowed[2].role, Role::ToolResult);
        assert_eq!(windowed[2].content, "a.txt b.txt");
    }

    #[test]
    fn usage_accumulates_across_rounds() {
        let mut session = Session::new();
        session.absorb_usage(Usage {
            prompt_tokens: 100,
            completion_tokens: 10,
            total_tokens: 110,
        });
        session.absorb_usage(Usage {
            prompt_tokens: 50,
            completion_tokens: 5,
            total_tokens: 55,
        });
        assert_eq!(session.usage().total_tokens, 165);
    }

    #[tokio::test]
    async fn compact_marks_old_turns_and_stands_in_a_summary() {
        let mut session = Session::new();
        session.append(Turn::system("You are helpful"));
        for i in 0..10 {
            session.append(Turn::user(format!("question {i} {}", "pad ".repeat(30))));
            session.append(Turn::assistant(format!("answer {i} {}", "pad ".repeat(30))));
        }
        session.append(Turn::user("latest question"));

        let before = session.estimated_tokens();
        let summarizer = TruncateSummarizer::default();
        let summarized = session.compact(before / 4, &summarizer).await;
        assert!(summarized > 0);
        assert!(session.estimated_tokens() < before);

        // Every original turn is still in the session.
        assert_eq!(session.all_turns().len(), 22 + 1);

        // Exactly one standing summary turn, at the front of active history
        // (after the original system turn).
        let active = session.active_turns();
        let summaries: Vec<&Turn> = active
            .iter()
            .filter(|t| t.content.starts_with("Earlier in this conversation"))
            .collect();
        assert_eq!(summaries.len(), 1);
        assert_eq!(active[1].content, summaries[0].content);
    }

    #[tokio::test]
    async fn compact_never_touches_system_or_latest_user() {
        let mut session = Session::new();
        session.append(Turn::system("rules"));
        session.append(Turn::user("old question"));
        session.append(Turn::assistant("old answer"));
        session.append(Turn::user("current question"));

        let summarizer = TruncateSummarizer::default();
        session.compact(0, &summarizer).await;

        let active = session.active_turns();
        assert!(active.iter().any(|t| t.content == "rules"));
        assert!(active.iter().any(|t| t.content == "current question"));
        assert!(!active.iter().any(|t| t.content == "old question"));
    }

    #[tokio::test]
    async fn compact_is_a_noop_under_target() {
        let mut session = Session::new();
        session.append(Turn::user("short"));
        let summarizer = TruncateSummarizer::default();
        assert_eq!(session.compact(10_000, &summarizer).await, 0);
        assert_eq!(session.active_turns().len(), 1);
    }

    #[test]
    fn session_serialization_roundtrip() {
        let mut session = Session::new();
        session.append(Turn::user("persist me"));
        let json = serde_json::to_string(&session).unwrap();
        let back: Session = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, session.id);
        assert_eq!(back.active_turns().len(), 1);
        assert_eq!(back.title, session.title);
    }
}
