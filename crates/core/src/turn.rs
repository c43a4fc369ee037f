//! Turn and session identity types.
//!
//! A `Turn` is the unit of conversation history: the user says something, the
//! assistant answers, a command reports back. Turns are immutable once
//! appended — the context store selects and marks them but never rewrites
//! their content.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a session (one conversation).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Who produced a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// The end user
    User,
    /// The model's answer
    Assistant,
    /// System instructions (persona, command catalog, retrieved context)
    System,
    /// Output of a dispatched command
    ToolResult,
}

/// A file or resource referenced by a turn, carried through windowing
/// untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub name: String,
    pub uri: String,
}

/// A single turn in a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    /// Unique turn ID
    pub id: String,

    /// Who produced this turn
    pub role: Role,

    /// The text content
    pub content: String,

    /// Attached resources (if any)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,

    /// If this is a tool result, which command call it responds to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_id: Option<String>,

    /// Timestamp
    pub timestamp: DateTime<Utc>,
}

impl Turn {
    /// Create a new user turn.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create a new assistant turn.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Create a new system turn.
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// Create a tool-result turn correlated to a command call.
    pub fn tool_result(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        let mut turn = Self::new(Role::ToolResult, content);
        turn.call_id = Some(call_id.into());
        turn
    }

    fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            attachments: Vec::new(),
            call_id: None,
            timestamp: Utc::now(),
        }
    }

    /// Attach a named resource to this turn.
    pub fn with_attachment(mut self, name: impl Into<String>, uri: impl Into<String>) -> Self {
        self.attachments.push(Attachment {
            name: name.into(),
            uri: uri.into(),
        });
        self
    }
}
