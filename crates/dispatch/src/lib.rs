//! Command dispatch for colloquy.
//!
//! Owns the executor registry (snapshot map, single-writer swap) and the
//! dispatcher that drives a parsed [`CommandCall`] to a terminal
//! [`CommandResult`] under the executor's declared timeout, the caller's
//! cancellation token, and the active confirmation policy.
//!
//! [`CommandCall`]: colloquy_core::CommandCall
//! [`CommandResult`]: colloquy_core::CommandResult

pub mod dispatcher;
pub mod registry;

pub use dispatcher::Dispatcher;
pub use registry::ExecutorRegistry;
