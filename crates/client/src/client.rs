//! Session stream client — the composition root.
//!
//! One background actor task owns the subscription registry and all
//! per-session state, fed by the transport's event channel and by commands
//! from [`SessionStreamClient`] handles. Every mutation happens on that one
//! loop, so there is no locking and no decide/commit gap for the next frame
//! to slip into. Observers get callback fan-out plus lock-free snapshots.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;
use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, warn};

use skiff_protocol::{AgentEvent, ClientMessage, ServerMessage};

use crate::coalesce::DisplayEntry;
use crate::config::ClientConfig;
use crate::dispatch::{is_already_running_error, PromptOptions};
use crate::error::ClientError;
use crate::registry::{Handler, SubscriptionRegistry};
use crate::session::{AgentInfo, SessionEvent, SessionMetadata, SessionSnapshot, SessionState};
use crate::transport::{
    spawn_transport, ConnectionState, TransportEvent, TransportHandle,
};

enum Command {
    Connect,
    Disconnect,
    Subscribe {
        session_id: String,
        handler_id: u64,
        handler: Handler,
    },
    Unsubscribe {
        session_id: String,
        handler_id: u64,
    },
    SendPrompt {
        session_id: String,
        prompt: String,
        options: PromptOptions,
    },
    RespondToControl {
        session_id: String,
        request_id: String,
        response: Value,
    },
    StopSession {
        session_id: String,
    },
    RawTap {
        session_id: String,
        reply: oneshot::Sender<Vec<AgentEvent>>,
    },
}

/// Guard for one registered handler. Dropping it (or calling
/// [`Subscription::unsubscribe`]) removes the handler; when the last handler
/// for a session goes, the client sends `unsubscribe` upstream.
pub struct Subscription {
    session_id: String,
    handler_id: u64,
    command_tx: mpsc::UnboundedSender<Command>,
    armed: bool,
}

impl Subscription {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn unsubscribe(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if self.armed {
            self.armed = false;
            let _ = self.command_tx.send(Command::Unsubscribe {
                session_id: self.session_id.clone(),
                handler_id: self.handler_id,
            });
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

/// Handle to the stream client (cheap to Clone).
#[derive(Clone)]
pub struct SessionStreamClient {
    command_tx: mpsc::UnboundedSender<Command>,
    state_rx: watch::Receiver<ConnectionState>,
    snapshots: Arc<DashMap<String, Arc<ArcSwap<SessionSnapshot>>>>,
    next_handler_id: Arc<AtomicU64>,
}

impl SessionStreamClient {
    /// Build a client over a real WebSocket transport. The connection is
    /// lazy: nothing dials until [`connect`](Self::connect).
    pub fn new(config: ClientConfig) -> Self {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let transport = spawn_transport(config.clone(), event_tx);
        Self::spawn_actor(config, transport, event_rx)
    }

    fn spawn_actor(
        config: ClientConfig,
        transport: TransportHandle,
        transport_rx: mpsc::UnboundedReceiver<TransportEvent>,
    ) -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let snapshots: Arc<DashMap<String, Arc<ArcSwap<SessionSnapshot>>>> =
            Arc::new(DashMap::new());
        let state_rx = transport.state_rx();

        let actor = ClientActor {
            config,
            transport,
            transport_rx,
            command_rx,
            registry: SubscriptionRegistry::new(),
            sessions: HashMap::new(),
            snapshots: snapshots.clone(),
        };
        tokio::spawn(actor.run());

        Self {
            command_tx,
            state_rx,
            snapshots,
            next_handler_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Idempotent; a no-op while already connecting or connected.
    pub fn connect(&self) {
        self.send_command(Command::Connect);
    }

    /// Hard stop: cancels reconnect/keepalive timers and disables
    /// auto-reconnect until the next [`connect`](Self::connect).
    pub fn disconnect(&self) {
        self.send_command(Command::Disconnect);
    }

    /// Register a handler for a session's events. The first handler for a
    /// session triggers a `subscribe` upstream and a fresh (empty) log.
    pub fn subscribe(
        &self,
        session_id: &str,
        handler: impl FnMut(&SessionEvent) + Send + 'static,
    ) -> Subscription {
        let handler_id = self.next_handler_id.fetch_add(1, Ordering::Relaxed);
        self.send_command(Command::Subscribe {
            session_id: session_id.to_string(),
            handler_id,
            handler: Box::new(handler),
        });
        Subscription {
            session_id: session_id.to_string(),
            handler_id,
            command_tx: self.command_tx.clone(),
            armed: true,
        }
    }

    /// Send a user prompt: starts a turn, or appends to the running one,
    /// with automatic repair if the optimistic guess was wrong.
    pub fn send_prompt(&self, session_id: &str, prompt: impl Into<String>, options: PromptOptions) {
        self.send_command(Command::SendPrompt {
            session_id: session_id.to_string(),
            prompt: prompt.into(),
            options,
        });
    }

    /// Answer a control/permission request.
    pub fn respond_to_control(&self, session_id: &str, request_id: &str, response: Value) {
        self.send_command(Command::RespondToControl {
            session_id: session_id.to_string(),
            request_id: request_id.to_string(),
            response,
        });
    }

    /// Ask the backend to stop the session. Local pending-prompt and
    /// running state reset immediately, ahead of the server's confirmation.
    pub fn stop_session(&self, session_id: &str) {
        self.send_command(Command::StopSession {
            session_id: session_id.to_string(),
        });
    }

    pub fn connection_state(&self) -> ConnectionState {
        *self.state_rx.borrow()
    }

    /// Watch channel for connection-state changes.
    pub fn connection_watch(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }

    /// Lock-free snapshot of a session's derived state.
    pub fn snapshot(&self, session_id: &str) -> Option<Arc<SessionSnapshot>> {
        self.snapshots.get(session_id).map(|slot| slot.load_full())
    }

    pub fn display_log(&self, session_id: &str) -> Vec<DisplayEntry> {
        self.snapshot(session_id)
            .map(|snap| snap.entries.clone())
            .unwrap_or_default()
    }

    pub fn is_working(&self, session_id: &str) -> bool {
        self.snapshot(session_id)
            .map(|snap| snap.working)
            .unwrap_or(false)
    }

    /// Unfiltered diagnostic tap: the telemetry events the display log
    /// drops, capped at its own smaller bound.
    pub async fn raw_tap(&self, session_id: &str) -> Result<Vec<AgentEvent>, ClientError> {
        let (tx, rx) = oneshot::channel();
        self.command_tx
            .send(Command::RawTap {
                session_id: session_id.to_string(),
                reply: tx,
            })
            .map_err(|_| ClientError::ClientGone)?;
        rx.await.map_err(|_| ClientError::ReplyDropped)
    }

    fn send_command(&self, command: Command) {
        if self.command_tx.send(command).is_err() {
            warn!(
                component = "client",
                event = "client.command.dropped",
                "Client task gone, command dropped"
            );
        }
    }
}

struct ClientActor {
    config: ClientConfig,
    transport: TransportHandle,
    transport_rx: mpsc::UnboundedReceiver<TransportEvent>,
    command_rx: mpsc::UnboundedReceiver<Command>,
    registry: SubscriptionRegistry,
    sessions: HashMap<String, SessionState>,
    snapshots: Arc<DashMap<String, Arc<ArcSwap<SessionSnapshot>>>>,
}

impl ClientActor {
    async fn run(mut self) {
        loop {
            tokio::select! {
                cmd = self.command_rx.recv() => match cmd {
                    Some(cmd) => self.handle_command(cmd),
                    // Every handle and subscription is gone.
                    None => break,
                },
                Some(event) = self.transport_rx.recv() => self.handle_transport_event(event),
            }
        }
        self.transport.disconnect();
    }

    fn session_entry(&mut self, session_id: &str) -> &mut SessionState {
        let config = &self.config;
        let snapshots = &self.snapshots;
        self.sessions
            .entry(session_id.to_string())
            .or_insert_with(|| {
                let state =
                    SessionState::new(session_id, config.display_log_cap, config.raw_tap_cap);
                snapshots.insert(session_id.to_string(), state.snapshot_arc());
                state
            })
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Connect => self.transport.connect(),
            Command::Disconnect => self.transport.disconnect(),
            Command::Subscribe {
                session_id,
                handler_id,
                handler,
            } => {
                let outcome = self.registry.add(&session_id, handler_id, handler);
                if outcome.first_handler {
                    // Zero→one observers: the log and turn flag are caches
                    // and rebuild from empty; history is the REST
                    // collaborator's job. The prompt phase is not a cache —
                    // a pending start must survive to stay repairable.
                    let mut state = SessionState::new(
                        &session_id,
                        self.config.display_log_cap,
                        self.config.raw_tap_cap,
                    );
                    if let Some(previous) = self.sessions.remove(&session_id) {
                        state.prompt = previous.prompt;
                    }
                    self.snapshots
                        .insert(session_id.clone(), state.snapshot_arc());
                    self.sessions.insert(session_id.clone(), state);
                }
                if outcome.needs_subscribe {
                    self.transport.send(ClientMessage::Subscribe { session_id });
                }
            }
            Command::Unsubscribe {
                session_id,
                handler_id,
            } => {
                if self.registry.remove(&session_id, handler_id) {
                    self.sessions.remove(&session_id);
                    self.snapshots.remove(&session_id);
                    self.transport
                        .send(ClientMessage::Unsubscribe { session_id });
                }
            }
            Command::SendPrompt {
                session_id,
                prompt,
                options,
            } => {
                let state = self.session_entry(&session_id);
                let message = state.prompt.dispatch(&session_id, prompt, options);
                self.transport.send(message);
            }
            Command::RespondToControl {
                session_id,
                request_id,
                response,
            } => self.transport.send(ClientMessage::RespondToControl {
                session_id,
                request_id,
                response,
            }),
            Command::StopSession { session_id } => {
                if let Some(state) = self.sessions.get_mut(&session_id) {
                    state.prompt.stop();
                    if state.turns.force_idle() {
                        state.refresh_snapshot();
                        self.registry
                            .dispatch(&session_id, &SessionEvent::Working(false));
                    }
                }
                self.transport
                    .send(ClientMessage::StopSession { session_id });
            }
            Command::RawTap { session_id, reply } => {
                let events = self
                    .sessions
                    .get(&session_id)
                    .map(|state| state.log.raw_snapshot())
                    .unwrap_or_default();
                let _ = reply.send(events);
            }
        }
    }

    fn handle_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Opened => {
                // The server's subscription state died with the old socket;
                // the stale active markers are not trusted.
                for session_id in self.registry.resubscribe_targets() {
                    self.transport.send(ClientMessage::Subscribe { session_id });
                }
            }
            TransportEvent::Closed => {
                debug!(
                    component = "client",
                    event = "client.connection.lost",
                    "Socket lost, awaiting reconnect"
                );
            }
            TransportEvent::Message(message) => self.handle_server_message(message),
        }
    }

    fn handle_server_message(&mut self, message: ServerMessage) {
        match message {
            ServerMessage::Pong => {}
            ServerMessage::Subscribed { session_id } => debug!(
                component = "client",
                event = "client.subscription.acked",
                session_id = %session_id,
                "Subscription acknowledged"
            ),
            ServerMessage::Unsubscribed { session_id } => debug!(
                component = "client",
                event = "client.subscription.released",
                session_id = %session_id,
                "Unsubscribe acknowledged"
            ),
            ServerMessage::SessionStarted {
                session_id,
                agent_type,
                agent_session_id,
            } => {
                let info = AgentInfo {
                    agent_type,
                    agent_session_id,
                };
                let state = self.session_entry(&session_id);
                state.prompt.confirm_started();
                state.agent = Some(info.clone());
                state.refresh_snapshot();
                self.registry
                    .dispatch(&session_id, &SessionEvent::Started(info));
            }
            ServerMessage::SessionMetadata {
                session_id,
                title,
                workspace_id,
                workspace_branch,
            } => {
                let metadata = SessionMetadata {
                    title,
                    workspace_id,
                    workspace_branch,
                };
                let state = self.session_entry(&session_id);
                state.metadata = Some(metadata.clone());
                state.refresh_snapshot();
                self.registry
                    .dispatch(&session_id, &SessionEvent::Metadata(metadata));
            }
            ServerMessage::AgentEvent { session_id, event } => {
                self.process_agent_event(session_id, event)
            }
            ServerMessage::SessionEnded {
                session_id,
                reason,
                error,
            } => {
                if let Some(state) = self.sessions.get_mut(&session_id) {
                    state.prompt.on_turn_ended();
                    let flipped = state.turns.force_idle();
                    state.refresh_snapshot();
                    if flipped {
                        self.registry
                            .dispatch(&session_id, &SessionEvent::Working(false));
                    }
                }
                self.registry
                    .dispatch(&session_id, &SessionEvent::Ended { reason, error });
            }
            ServerMessage::Error {
                message,
                session_id,
            } => match session_id {
                Some(session_id) => {
                    if is_already_running_error(&message) {
                        if let Some(state) = self.sessions.get_mut(&session_id) {
                            if let Some((input, hidden, images)) = state.prompt.repair() {
                                info!(
                                    component = "client",
                                    event = "client.prompt.repaired",
                                    session_id = %session_id,
                                    "Session was already running, re-issuing prompt as input"
                                );
                                self.transport.send(ClientMessage::SendInput {
                                    session_id,
                                    input,
                                    hidden,
                                    images,
                                });
                                return;
                            }
                        }
                    }
                    self.registry
                        .dispatch(&session_id, &SessionEvent::SessionError { message });
                }
                None => warn!(
                    component = "client",
                    event = "client.server_error",
                    error = %message,
                    "Server error without session scope"
                ),
            },
        }
    }

    fn process_agent_event(&mut self, session_id: String, event: AgentEvent) {
        if !self.registry.has_handlers(&session_id) && !self.sessions.contains_key(&session_id) {
            debug!(
                component = "client",
                event = "client.event.unobserved",
                session_id = %session_id,
                "Dropping event for unobserved session"
            );
            return;
        }

        let state = self.session_entry(&session_id);
        let mut notices: Vec<SessionEvent> = Vec::with_capacity(2);

        // The tracker folds every raw event, including the ones the
        // coalescer filters out.
        if let Some(working) = state.turns.observe(&event) {
            if working {
                state.prompt.on_turn_started();
            } else {
                state.prompt.on_turn_ended();
            }
            notices.push(SessionEvent::Working(working));
        }
        if let Some(entry) = state.log.push(event) {
            notices.push(SessionEvent::Entry(entry));
        }
        state.refresh_snapshot();

        for notice in &notices {
            self.registry.dispatch(&session_id, notice);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::TransportCommand;
    use std::sync::Mutex;
    use std::time::Duration;

    struct TestRig {
        client: SessionStreamClient,
        commands: mpsc::UnboundedReceiver<TransportCommand>,
        events: mpsc::UnboundedSender<TransportEvent>,
        _state_tx: watch::Sender<ConnectionState>,
    }

    fn rig() -> TestRig {
        let (command_tx, commands) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ConnectionState::Connected);
        let transport = TransportHandle::from_parts(command_tx, state_rx);
        let (events, event_rx) = mpsc::unbounded_channel();

        let client =
            SessionStreamClient::spawn_actor(ClientConfig::new("ws://test"), transport, event_rx);
        TestRig {
            client,
            commands,
            events,
            _state_tx: state_tx,
        }
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(25)).await;
    }

    fn drain(commands: &mut mpsc::UnboundedReceiver<TransportCommand>) -> Vec<ClientMessage> {
        let mut sent = Vec::new();
        while let Ok(cmd) = commands.try_recv() {
            if let TransportCommand::Send(msg) = cmd {
                sent.push(msg);
            }
        }
        sent
    }

    fn agent_event(session_id: &str, event: AgentEvent) -> TransportEvent {
        TransportEvent::Message(ServerMessage::AgentEvent {
            session_id: session_id.to_string(),
            event,
        })
    }

    #[tokio::test]
    async fn one_subscribe_per_session_regardless_of_handler_count() {
        let mut rig = rig();
        let _a = rig.client.subscribe("sess-1", |_| {});
        let _b = rig.client.subscribe("sess-1", |_| {});
        settle().await;

        let sent = drain(&mut rig.commands);
        let subs = sent
            .iter()
            .filter(|m| matches!(m, ClientMessage::Subscribe { .. }))
            .count();
        assert_eq!(subs, 1);
    }

    #[tokio::test]
    async fn unsubscribe_settles_and_resubscribe_is_fresh() {
        let mut rig = rig();
        let sub = rig.client.subscribe("sess-1", |_| {});
        settle().await;
        drain(&mut rig.commands);

        sub.unsubscribe();
        settle().await;
        let sent = drain(&mut rig.commands);
        assert_eq!(sent.len(), 1);
        assert!(matches!(
            &sent[0],
            ClientMessage::Unsubscribe { session_id } if session_id == "sess-1"
        ));

        let _again = rig.client.subscribe("sess-1", |_| {});
        settle().await;
        let sent = drain(&mut rig.commands);
        assert_eq!(sent.len(), 1);
        assert!(matches!(
            &sent[0],
            ClientMessage::Subscribe { session_id } if session_id == "sess-1"
        ));
    }

    #[tokio::test]
    async fn reconnect_resubscribes_every_observed_session_once() {
        let mut rig = rig();
        let _a = rig.client.subscribe("sess-1", |_| {});
        let _b = rig.client.subscribe("sess-2", |_| {});
        settle().await;
        drain(&mut rig.commands);

        rig.events.send(TransportEvent::Closed).unwrap();
        rig.events.send(TransportEvent::Opened).unwrap();
        settle().await;

        let mut resubscribed: Vec<String> = drain(&mut rig.commands)
            .into_iter()
            .filter_map(|m| match m {
                ClientMessage::Subscribe { session_id } => Some(session_id),
                _ => None,
            })
            .collect();
        resubscribed.sort();
        assert_eq!(resubscribed, vec!["sess-1".to_string(), "sess-2".to_string()]);
    }

    #[tokio::test]
    async fn prompt_repair_reissues_input_exactly_once() {
        let mut rig = rig();
        rig.client
            .send_prompt("sess-1", "fix the tests", PromptOptions::new("/work/repo"));
        settle().await;

        let sent = drain(&mut rig.commands);
        assert_eq!(sent.len(), 1);
        assert!(matches!(
            &sent[0],
            ClientMessage::StartSession { prompt, .. } if prompt == "fix the tests"
        ));

        rig.events
            .send(TransportEvent::Message(ServerMessage::Error {
                message: "session sess-1 is already running".to_string(),
                session_id: Some("sess-1".to_string()),
            }))
            .unwrap();
        settle().await;

        let sent = drain(&mut rig.commands);
        assert_eq!(sent.len(), 1);
        assert!(matches!(
            &sent[0],
            ClientMessage::SendInput { input, .. } if input == "fix the tests"
        ));

        // A second rejection must not re-issue anything.
        rig.events
            .send(TransportEvent::Message(ServerMessage::Error {
                message: "session sess-1 is already running".to_string(),
                session_id: Some("sess-1".to_string()),
            }))
            .unwrap();
        settle().await;
        assert!(drain(&mut rig.commands).is_empty());
    }

    #[tokio::test]
    async fn first_subscribe_keeps_the_pending_prompt_repairable() {
        let mut rig = rig();
        rig.client
            .send_prompt("sess-1", "fix the tests", PromptOptions::new("/work/repo"));
        settle().await;
        drain(&mut rig.commands);

        // Observing the session resets the cached log, not the prompt phase.
        let _sub = rig.client.subscribe("sess-1", |_| {});
        settle().await;
        drain(&mut rig.commands);

        rig.events
            .send(TransportEvent::Message(ServerMessage::Error {
                message: "session sess-1 is already running".to_string(),
                session_id: Some("sess-1".to_string()),
            }))
            .unwrap();
        settle().await;

        let sent = drain(&mut rig.commands);
        assert_eq!(sent.len(), 1);
        assert!(matches!(
            &sent[0],
            ClientMessage::SendInput { input, .. } if input == "fix the tests"
        ));
    }

    #[tokio::test]
    async fn session_started_confirms_pending_and_next_prompt_appends() {
        let mut rig = rig();
        rig.client
            .send_prompt("sess-1", "first", PromptOptions::new("/work/repo"));
        rig.events
            .send(TransportEvent::Message(ServerMessage::SessionStarted {
                session_id: "sess-1".to_string(),
                agent_type: "claude".to_string(),
                agent_session_id: "agent-9".to_string(),
            }))
            .unwrap();
        settle().await;
        drain(&mut rig.commands);

        rig.client
            .send_prompt("sess-1", "second", PromptOptions::new("/work/repo"));
        settle().await;

        let sent = drain(&mut rig.commands);
        assert_eq!(sent.len(), 1);
        assert!(matches!(
            &sent[0],
            ClientMessage::SendInput { input, .. } if input == "second"
        ));
    }

    #[tokio::test]
    async fn coalesced_entries_and_working_flag_reach_handlers() {
        let mut rig = rig();
        let seen: Arc<Mutex<Vec<SessionEvent>>> = Arc::default();
        let sink = seen.clone();
        let _sub = rig.client.subscribe("sess-1", move |event| {
            sink.lock().unwrap().push(event.clone());
        });
        settle().await;
        drain(&mut rig.commands);

        rig.events
            .send(agent_event("sess-1", AgentEvent::TurnStarted { turn_id: None }))
            .unwrap();
        rig.events
            .send(agent_event(
                "sess-1",
                AgentEvent::AssistantMessage {
                    text: "Hel".to_string(),
                    is_final: false,
                },
            ))
            .unwrap();
        rig.events
            .send(agent_event(
                "sess-1",
                AgentEvent::AssistantMessage {
                    text: "Hello".to_string(),
                    is_final: true,
                },
            ))
            .unwrap();
        settle().await;

        assert!(!rig.client.is_working("sess-1"));
        let log = rig.client.display_log("sess-1");
        assert_eq!(log.len(), 2);
        assert_eq!(
            log[1].event,
            AgentEvent::AssistantMessage {
                text: "Hello".to_string(),
                is_final: true,
            }
        );

        let events = seen.lock().unwrap();
        let workings: Vec<bool> = events
            .iter()
            .filter_map(|e| match e {
                SessionEvent::Working(w) => Some(*w),
                _ => None,
            })
            .collect();
        assert_eq!(workings, vec![true, false]);
    }

    #[tokio::test]
    async fn stop_session_resets_local_state_ahead_of_server() {
        let mut rig = rig();
        let _sub = rig.client.subscribe("sess-1", |_| {});
        settle().await;
        rig.events
            .send(agent_event("sess-1", AgentEvent::TurnStarted { turn_id: None }))
            .unwrap();
        settle().await;
        assert!(rig.client.is_working("sess-1"));
        drain(&mut rig.commands);

        rig.client.stop_session("sess-1");
        settle().await;

        assert!(!rig.client.is_working("sess-1"));
        let sent = drain(&mut rig.commands);
        assert_eq!(sent.len(), 1);
        assert!(matches!(&sent[0], ClientMessage::StopSession { .. }));
    }

    #[tokio::test]
    async fn telemetry_lands_on_raw_tap_not_display_log() {
        let mut rig = rig();
        let _sub = rig.client.subscribe("sess-1", |_| {});
        settle().await;

        rig.events
            .send(agent_event(
                "sess-1",
                AgentEvent::TokenUsage {
                    usage: Default::default(),
                },
            ))
            .unwrap();
        settle().await;

        assert!(rig.client.display_log("sess-1").is_empty());
        let tap = rig.client.raw_tap("sess-1").await.unwrap();
        assert_eq!(tap.len(), 1);
        assert!(matches!(tap[0], AgentEvent::TokenUsage { .. }));
    }

    #[tokio::test]
    async fn resubscribing_starts_with_an_empty_log() {
        let mut rig = rig();
        let sub = rig.client.subscribe("sess-1", |_| {});
        rig.events
            .send(agent_event(
                "sess-1",
                AgentEvent::AssistantMessage {
                    text: "old".to_string(),
                    is_final: true,
                },
            ))
            .unwrap();
        settle().await;
        assert_eq!(rig.client.display_log("sess-1").len(), 1);

        sub.unsubscribe();
        settle().await;
        let _again = rig.client.subscribe("sess-1", |_| {});
        settle().await;

        assert!(rig.client.display_log("sess-1").is_empty());
        drain(&mut rig.commands);
    }
}
