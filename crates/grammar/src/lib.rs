//! Command grammar for colloquy assistants.
//!
//! Models ask for commands in-band: the call rides inside the answer text as
//! a fenced JSON object rather than through a vendor tool-call schema. This
//! crate owns that grammar and the incremental scanner that recognizes it
//! while the answer is still streaming.
//!
//! See [`scanner`] for the grammar itself and the delta-tolerant scanning
//! rules.

pub mod scanner;

pub use scanner::{scan_all, CommandScanner, ScanItem, FENCE, MAX_CALL_BYTES};
