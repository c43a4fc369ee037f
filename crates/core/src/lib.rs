//! # Colloquy Core
//!
//! Domain types, traits, and error definitions for the Colloquy conversation
//! engine. This crate does no I/O of its own — it defines the domain model
//! that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! The seams of the engine are traits defined here — [`ChatBackend`] for
//! model access, [`CommandExecutor`] for what the model may do,
//! [`ConfirmationPolicy`], [`ContextRetriever`], and [`Summarizer`] for the
//! collaborators around a conversation. Implementations live in the outer
//! crates, so a scripted backend and a live HTTP one are interchangeable to
//! the orchestrator, and every crate depends inward on this one.

pub mod backend;
pub mod command;
pub mod confirm;
pub mod error;
pub mod event;
pub mod retrieval;
pub mod summarize;
pub mod turn;

// Re-export key types at crate root for ergonomics
pub use backend::{
    BackendCapabilities, ChatBackend, ChatCompletion, ChatDelta, ChatRequest, Usage,
};
pub use command::{
    CommandCall, CommandExecutor, CommandOutput, CommandResult, CommandState, ExecutorDescriptor,
    SideEffect, Span,
};
pub use confirm::{AllowAllPolicy, ConfirmationPolicy, ReadOnlyPolicy};
pub use error::{
    CommandError, Error, OrchestrationError, ParseError, ProviderError, Result,
};
pub use event::{AbortReason, EngineEvent};
pub use retrieval::{ContextRetriever, NoRetrieval, RetrievedChunk, StaticRetriever};
pub use summarize::{Summarizer, TruncateSummarizer};
pub use turn::{Attachment, Role, SessionId, Turn};
