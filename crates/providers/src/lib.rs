//! Chat backend implementations for colloquy.
//!
//! All backends implement the `colloquy_core::ChatBackend` trait.
//! The router selects the correct backend based on configuration, and
//! every configured backend is wrapped in bounded retry.

pub mod http;
pub mod retry;
pub mod router;
pub mod scripted;

pub use http::OpenAiChatBackend;
pub use retry::RetryBackend;
pub use router::{build_from_config, BackendRouter};
pub use scripted::{ScriptedBackend, ScriptedReply};
