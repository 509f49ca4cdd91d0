//! Client → Server messages

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::ImageInput;

/// Messages sent from client to server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Keepalive probe; carries no application meaning.
    Ping,

    // Subscriptions
    Subscribe {
        session_id: String,
    },
    Unsubscribe {
        session_id: String,
    },

    // Turn control
    StartSession {
        session_id: String,
        prompt: String,
        working_dir: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        model: Option<String>,
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        hidden: bool,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        images: Vec<ImageInput>,
    },
    SendInput {
        session_id: String,
        input: String,
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        hidden: bool,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        images: Vec<ImageInput>,
    },
    RespondToControl {
        session_id: String,
        request_id: String,
        response: Value,
    },
    StopSession {
        session_id: String,
    },
}

impl ClientMessage {
    /// Session id this message targets, if any.
    pub fn session_id(&self) -> Option<&str> {
        match self {
            ClientMessage::Ping => None,
            ClientMessage::Subscribe { session_id }
            | ClientMessage::Unsubscribe { session_id }
            | ClientMessage::StartSession { session_id, .. }
            | ClientMessage::SendInput { session_id, .. }
            | ClientMessage::RespondToControl { session_id, .. }
            | ClientMessage::StopSession { session_id } => Some(session_id),
        }
    }
}
