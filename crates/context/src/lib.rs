//! # Colloquy Context
//!
//! The context store: session histories, the token-budget heuristic, and
//! deterministic window selection. The guarantees the orchestrator leans on:
//!
//! - Turns are whole units; a window never splits one.
//! - System turns and the most recent user turn are never dropped.
//! - Identical history and budget always select the identical window.
//! - Trimming summarizes old turns instead of silently losing them.

pub mod session;
pub mod store;
pub mod token;
pub mod window;

pub use session::Session;
pub use store::{InMemorySessionStore, SessionStore, StoreError};
pub use window::{Window, select_window};
