//! Server → Client messages

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::event::AgentEvent;

/// Messages sent from server to client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Keepalive reply.
    Pong,

    // Subscription acknowledgments
    Subscribed {
        session_id: String,
    },
    Unsubscribed {
        session_id: String,
    },

    // Session lifecycle
    SessionStarted {
        session_id: String,
        agent_type: String,
        agent_session_id: String,
    },
    SessionMetadata {
        session_id: String,
        title: String,
        workspace_id: String,
        workspace_branch: String,
    },
    AgentEvent {
        session_id: String,
        #[serde(deserialize_with = "agent_event_or_raw")]
        event: AgentEvent,
    },
    SessionEnded {
        session_id: String,
        reason: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },

    // Errors
    Error {
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        session_id: Option<String>,
    },
}

/// Deserialize the nested event leniently: an unknown inner event must not
/// fail the surrounding `agent_event` frame.
fn agent_event_or_raw<'de, D>(deserializer: D) -> Result<AgentEvent, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(AgentEvent::parse(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn agent_event_roundtrip() {
        let msg = ServerMessage::AgentEvent {
            session_id: "sess-1".to_string(),
            event: AgentEvent::AssistantMessage {
                text: "Hello".to_string(),
                is_final: false,
            },
        };
        let json = serde_json::to_string(&msg).expect("serialize");
        let reparsed: ServerMessage = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(reparsed, msg);
    }

    #[test]
    fn unknown_inner_event_decodes_as_raw() {
        let frame = json!({
            "type": "agent_event",
            "session_id": "sess-2",
            "event": {"type": "holographic_diff", "blob": "xyz"}
        });
        let parsed: ServerMessage =
            serde_json::from_value(frame.clone()).expect("frame should still decode");
        match parsed {
            ServerMessage::AgentEvent { session_id, event } => {
                assert_eq!(session_id, "sess-2");
                assert_eq!(
                    event,
                    AgentEvent::Raw {
                        payload: frame["event"].clone()
                    }
                );
            }
            other => panic!("unexpected variant: {:?}", other),
        }
    }

    #[test]
    fn error_without_session_id() {
        let parsed: ServerMessage =
            serde_json::from_str(r#"{"type":"error","message":"bad frame"}"#).expect("deserialize");
        assert_eq!(
            parsed,
            ServerMessage::Error {
                message: "bad frame".to_string(),
                session_id: None,
            }
        );
    }

    #[test]
    fn session_ended_roundtrip() {
        let msg = ServerMessage::SessionEnded {
            session_id: "sess-3".to_string(),
            reason: "stopped".to_string(),
            error: Some("agent exited 1".to_string()),
        };
        let json = serde_json::to_string(&msg).expect("serialize");
        let reparsed: ServerMessage = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(reparsed, msg);
    }
}
