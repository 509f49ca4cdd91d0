//! Agent event union — the payload of `agent_event` server messages.
//!
//! Events arrive in socket order per session; the backend never resends or
//! reorders. Unrecognized event types decode as [`AgentEvent::Raw`] so one
//! exotic event from a newer backend cannot poison the whole frame.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::TokenUsage;

/// A single event emitted by an agent process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    // Turn lifecycle
    TurnStarted {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        turn_id: Option<String>,
    },
    TurnCompleted {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        turn_id: Option<String>,
    },
    TurnFailed {
        error: String,
    },

    // Streamed text
    AssistantMessage {
        text: String,
        #[serde(rename = "final", default)]
        is_final: bool,
    },
    Reasoning {
        text: String,
    },

    // Tool lifecycle
    ToolStarted {
        tool_id: String,
        tool_name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        input: Option<Value>,
    },
    ToolCompleted {
        tool_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        output: Option<String>,
        #[serde(default)]
        is_error: bool,
    },

    // Streamed command output
    CommandOutput {
        command: String,
        output: String,
        #[serde(default)]
        is_streaming: bool,
    },

    // Permission / control requests
    ControlRequest {
        request_id: String,
        kind: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        command: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        prompt: Option<String>,
    },

    // Telemetry (never rendered, raw-tap only)
    TokenUsage {
        usage: TokenUsage,
    },
    ContextCompaction {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        trigger: Option<String>,
    },

    FatalError {
        message: String,
    },

    /// Catch-all for event types this client does not know.
    Raw {
        payload: Value,
    },
}

impl AgentEvent {
    /// Decode an event value, falling back to [`AgentEvent::Raw`] when the
    /// type tag (or shape) is unknown.
    pub fn parse(value: Value) -> AgentEvent {
        match serde_json::from_value::<AgentEvent>(value.clone()) {
            Ok(event) => event,
            Err(_) => AgentEvent::Raw { payload: value },
        }
    }

    /// True for events that end a turn: completion, failure, fatal error,
    /// or an assistant message marked final.
    pub fn ends_turn(&self) -> bool {
        matches!(
            self,
            AgentEvent::TurnCompleted { .. }
                | AgentEvent::TurnFailed { .. }
                | AgentEvent::FatalError { .. }
                | AgentEvent::AssistantMessage { is_final: true, .. }
        )
    }
}
