//! Engine events — what the presentation layer sees.
//!
//! The orchestrator emits these over a per-request mpsc channel. A consumer
//! (CLI, UI, test harness) renders them as they arrive; it never reads engine
//! state back.

use serde::{Deserialize, Serialize};

use crate::backend::Usage;
use crate::command::CommandResult;

/// Events emitted by the engine while a request runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    /// Partial answer text, safe to display immediately.
    AnswerDelta { text: String },

    /// A command call left the queue and is now running.
    CommandStarted {
        call_id: String,
        name: String,
        params: serde_json::Value,
    },

    /// A command reached a terminal state.
    CommandFinished { name: String, result: CommandResult },

    /// The request finished normally — final metadata.
    Completed {
        session_id: String,
        usage: Usage,
        rounds: usize,
        commands_run: usize,
    },

    /// The request terminated early.
    Aborted { reason: AbortReason, message: String },
}

/// Why a request was aborted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbortReason {
    RoundLimitExceeded,
    Cancelled,
    ProviderFailed,
}

impl EngineEvent {
    /// Stable event name, for logs and wire protocols.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::AnswerDelta { .. } => "answer_delta",
            Self::CommandStarted { .. } => "command_started",
            Self::CommandFinished { .. } => "command_finished",
            Self::Completed { .. } => "completed",
            Self::Aborted { .. } => "aborted",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{CommandCall, CommandOutput, Span};

    #[test]
    fn event_serialization_delta() {
        let event = EngineEvent::AnswerDelta {
            text: "Hello".into(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"answer_delta""#));
        assert!(json.contains(r#""text":"Hello""#));
    }

    #[test]
    fn event_serialization_command_finished() {
        let call = CommandCall::new("list_files", serde_json::json!({}), Span::new(0, 1));
        let event = EngineEvent::CommandFinished {
            name: "list_files".into(),
            result: CommandResult::succeeded(&call, CommandOutput::text("a.txt"), 3),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"command_finished""#));
        assert!(json.contains(r#""state":"succeeded""#));
    }

    #[test]
    fn event_serialization_aborted() {
        let event = EngineEvent::Aborted {
            reason: AbortReason::RoundLimitExceeded,
            message: "round limit of 8 exceeded".into(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""reason":"round_limit_exceeded""#));
    }

    #[test]
    fn event_type_names() {
        assert_eq!(
            EngineEvent::AnswerDelta { text: "x".into() }.event_type(),
            "answer_delta"
        );
        assert_eq!(
            EngineEvent::Completed {
                session_id: "s".into(),
                usage: Usage::default(),
                rounds: 1,
                commands_run: 0,
            }
            .event_type(),
            "completed"
        );
        assert_eq!(
            EngineEvent::Aborted {
                reason: AbortReason::Cancelled,
                message: "x".into(),
            }
            .event_type(),
            "aborted"
        );
    }

    #[test]
    fn event_deserialization() {
        let json = r#"{"type":"answer_delta","text":"hi"}"#;
        let event: EngineEvent = serde_json::from_str(json).unwrap();
        match event {
            EngineEvent::AnswerDelta { text } => assert_eq!(text, "hi"),
            _ => panic!("Wrong variant"),
        }
    }
}
