//! Skiff stream client.
//!
//! Connects to a skiff backend over a single WebSocket and maintains, per
//! subscribed session, a coalesced display log, a derived working flag, and
//! the prompt start-vs-append state machine. One background task owns all
//! mutable state; consumers interact through the cloneable
//! [`SessionStreamClient`] handle, callback subscriptions, and lock-free
//! snapshots.
//!
//! ```no_run
//! use skiff_client::{ClientConfig, PromptOptions, SessionStreamClient};
//!
//! # async fn demo() {
//! let client = SessionStreamClient::new(ClientConfig::new("ws://127.0.0.1:4000/ws"));
//! client.connect();
//! let _sub = client.subscribe("sess-1", |event| {
//!     println!("{event:?}");
//! });
//! client.send_prompt("sess-1", "fix the failing tests", PromptOptions::new("/work/repo"));
//! # }
//! ```

mod client;
mod coalesce;
mod config;
mod dispatch;
mod error;
mod registry;
mod session;
mod transport;
mod turn;

pub use client::{SessionStreamClient, Subscription};
pub use coalesce::DisplayEntry;
pub use config::ClientConfig;
pub use dispatch::PromptOptions;
pub use error::ClientError;
pub use session::{AgentInfo, SessionEvent, SessionMetadata, SessionSnapshot};
pub use transport::ConnectionState;

pub use skiff_protocol as protocol;
