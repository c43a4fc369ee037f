//! Turn orchestration for Colloquy.
//!
//! This crate owns the request loop: window the session, stream the
//! provider's answer through the command scanner, dispatch whatever calls
//! come out, feed the results back in, repeat until the model answers in
//! plain text. Everything a frontend needs arrives as [`EngineEvent`]s
//! over a channel; everything it configures goes through the
//! [`Orchestrator`] builder.
//!
//! [`EngineEvent`]: colloquy_core::event::EngineEvent

pub mod orchestrator;
pub mod prompt;

pub use orchestrator::{Orchestrator, RunSummary};
