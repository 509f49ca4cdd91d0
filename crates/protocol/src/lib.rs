//! Skiff Protocol
//!
//! Shared types for communication between a Skiff backend and its clients.
//! These types are serialized as JSON over WebSocket.

use uuid::Uuid;

// Re-exports
pub mod client;
pub mod event;
pub mod server;
pub mod types;

pub use client::ClientMessage;
pub use event::AgentEvent;
pub use server::ServerMessage;
pub use types::*;

/// Generate a new unique ID
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}
