//! Budget-driven window selection.
//!
//! Selection is deterministic: identical turns and budget always produce the
//! identical window. Turns are whole units — a turn either fits entirely or
//! is left out.

use colloquy_core::turn::{Role, Turn};

use crate::token;

/// A selected context window, chronological order.
#[derive(Debug, Clone)]
pub struct Window {
    /// The turns that made the window
    pub turns: Vec<Turn>,
    /// Estimated tokens of the selected turns
    pub tokens: usize,
    /// Active turns left out
    pub dropped: usize,
}

/// Select a window over `turns` (chronological, already filtered to active
/// turns) that fits `budget` estimated tokens.
///
/// Reserved turns come first: every system turn and the most recent user
/// turn are always selected, even when they alone exceed the budget — the
/// backend is the final arbiter of an oversized prompt. The remainder is a
/// contiguous suffix of recent turns: walking newest to oldest, the first
/// turn that does not fit ends the walk, so the window never has gaps a
/// model would trip over. Tool-result turns left leading the suffix after
/// selection are excluded; a result without the assistant turn that caused
/// it is noise.
pub fn select_window(turns: &[Turn], budget: usize) -> Window {
    let mut include = vec![false; turns.len()];

    // Reserved set: all system turns + most recent user turn.
    let mut used = 0;
    for (i, turn) in turns.iter().enumerate() {
        if turn.role == Role::System {
            include[i] = true;
            used += token::estimate_turn_tokens(turn);
        }
    }
    if let Some(last_user) = turns.iter().rposition(|t| t.role == Role::User) {
        if !include[last_user] {
            include[last_user] = true;
            used += token::estimate_turn_tokens(&turns[last_user]);
        }
    }

    // Contiguous recent suffix, newest to oldest, stop at the first miss.
    let mut suffix_start = turns.len();
    for i in (0..turns.len()).rev() {
        if include[i] {
            suffix_start = i;
            continue;
        }
        let cost = token::estimate_turn_tokens(&turns[i]);
        if used + cost <= budget {
            include[i] = true;
            used += cost;
            suffix_start = i;
        } else {
            break;
        }
    }

    // Tool results at the head of the suffix lost the assistant turn that
    // issued them to the budget cut; strip them until real dialogue starts.
    let mut i = suffix_start;
    while i < turns.len() {
        if !include[i] {
            i += 1;
            continue;
        }
        match turns[i].role {
            Role::System => i += 1,
            Role::ToolResult => {
                include[i] = false;
                used -= token::estimate_turn_tokens(&turns[i]);
                i += 1;
            }
            _ => break,
        }
    }

    let selected: Vec<Turn> = turns
        .iter()
        .zip(include.iter())
        .filter(|(_, inc)| **inc)
        .map(|(t, _)| t.clone())
        .collect();
    let dropped = turns.len() - selected.len();

    Window {
        turns: selected,
        tokens: used,
        dropped,
    }
}
