//! WebSocket transport — owns exactly one socket to the backend.
//!
//! The transport knows nothing about sessions. It runs as a background task
//! driven by fire-and-forget commands: `connect` is idempotent, `disconnect`
//! is a hard stop that disables auto-reconnect, and `send` drops (with a log
//! line) when the socket is not open. Unexpected closes trigger exponential
//! backoff reconnects up to a fixed attempt cap; while connected a `ping`
//! control message goes out on a fixed interval.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

use skiff_protocol::{ClientMessage, ServerMessage};

use crate::config::ClientConfig;

const DIAL_TIMEOUT: Duration = Duration::from_secs(10);

/// Externally observable connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Connected,
    Disconnected,
    /// The last connect attempt failed; a retry may still be scheduled.
    Error,
}

/// Commands accepted by the transport task.
pub(crate) enum TransportCommand {
    Connect,
    Disconnect,
    Send(ClientMessage),
}

/// Events the transport reports upward.
///
/// `Opened` is emitted before any decoded message from the new socket so the
/// subscription registry can replay `subscribe` frames first.
pub(crate) enum TransportEvent {
    Opened,
    Message(ServerMessage),
    Closed,
}

/// Cheap handle to the transport task.
#[derive(Clone)]
pub(crate) struct TransportHandle {
    command_tx: mpsc::UnboundedSender<TransportCommand>,
    state_rx: watch::Receiver<ConnectionState>,
}

impl TransportHandle {
    pub(crate) fn from_parts(
        command_tx: mpsc::UnboundedSender<TransportCommand>,
        state_rx: watch::Receiver<ConnectionState>,
    ) -> Self {
        Self {
            command_tx,
            state_rx,
        }
    }

    pub(crate) fn connect(&self) {
        let _ = self.command_tx.send(TransportCommand::Connect);
    }

    pub(crate) fn disconnect(&self) {
        let _ = self.command_tx.send(TransportCommand::Disconnect);
    }

    pub(crate) fn send(&self, message: ClientMessage) {
        let _ = self.command_tx.send(TransportCommand::Send(message));
    }

    pub(crate) fn state_rx(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }
}

/// Spawn the transport task. Decoded server messages and lifecycle events
/// arrive on `event_tx` in socket order.
pub(crate) fn spawn_transport(
    config: ClientConfig,
    event_tx: mpsc::UnboundedSender<TransportEvent>,
) -> TransportHandle {
    let (command_tx, command_rx) = mpsc::unbounded_channel();
    let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);

    let task = TransportTask {
        config,
        command_rx,
        event_tx,
        state_tx,
    };
    tokio::spawn(task.run());

    TransportHandle {
        command_tx,
        state_rx,
    }
}

enum Drive {
    /// Socket lost unexpectedly; auto-reconnect applies.
    Lost,
    /// Explicit disconnect; stay down until the next connect command.
    Disconnect,
    /// All handles dropped; exit the task.
    Shutdown,
}

struct TransportTask {
    config: ClientConfig,
    command_rx: mpsc::UnboundedReceiver<TransportCommand>,
    event_tx: mpsc::UnboundedSender<TransportEvent>,
    state_tx: watch::Sender<ConnectionState>,
}

impl TransportTask {
    fn set_state(&self, state: ConnectionState) {
        let _ = self.state_tx.send(state);
    }

    async fn run(mut self) {
        'idle: loop {
            // Down, auto-reconnect disabled. Wait for an explicit connect.
            match self.command_rx.recv().await {
                None => return,
                Some(TransportCommand::Connect) => {}
                Some(TransportCommand::Disconnect) => continue 'idle,
                Some(TransportCommand::Send(msg)) => {
                    warn_dropped(&msg);
                    continue 'idle;
                }
            }

            let mut attempt: u32 = 0;
            'connect: loop {
                self.set_state(ConnectionState::Connecting);
                // The dial future must own its url: pinned, it lives until
                // the end of the loop body, past the `&mut self` drive call.
                let url = self.config.url.clone();
                let dial = tokio::time::timeout(DIAL_TIMEOUT, connect_async(url));
                tokio::pin!(dial);

                let dialed = loop {
                    tokio::select! {
                        res = &mut dial => break res,
                        cmd = self.command_rx.recv() => match cmd {
                            None => return,
                            Some(TransportCommand::Disconnect) => {
                                self.set_state(ConnectionState::Disconnected);
                                continue 'idle;
                            }
                            // Already connecting; connect is idempotent.
                            Some(TransportCommand::Connect) => {}
                            Some(TransportCommand::Send(msg)) => warn_dropped(&msg),
                        }
                    }
                };

                match dialed {
                    Ok(Ok((stream, _response))) => {
                        attempt = 0;
                        self.set_state(ConnectionState::Connected);
                        info!(
                            component = "transport",
                            event = "transport.connection.opened",
                            url = %self.config.url,
                            "WebSocket connected"
                        );
                        let _ = self.event_tx.send(TransportEvent::Opened);

                        match self.drive(stream).await {
                            Drive::Shutdown => return,
                            Drive::Disconnect => {
                                self.set_state(ConnectionState::Disconnected);
                                continue 'idle;
                            }
                            Drive::Lost => {
                                self.set_state(ConnectionState::Disconnected);
                                let _ = self.event_tx.send(TransportEvent::Closed);
                            }
                        }
                    }
                    Ok(Err(e)) => {
                        warn!(
                            component = "transport",
                            event = "transport.connect.failed",
                            url = %self.config.url,
                            error = %e,
                            "WebSocket connect failed"
                        );
                        self.set_state(ConnectionState::Error);
                    }
                    Err(_) => {
                        warn!(
                            component = "transport",
                            event = "transport.connect.timeout",
                            url = %self.config.url,
                            "WebSocket connect timed out"
                        );
                        self.set_state(ConnectionState::Error);
                    }
                }

                // Backoff before the next attempt. Exhaustion is silent by
                // contract: only the state flag reflects it.
                attempt += 1;
                if attempt > self.config.max_reconnect_attempts {
                    warn!(
                        component = "transport",
                        event = "transport.reconnect.exhausted",
                        attempts = attempt - 1,
                        "Giving up until the next explicit connect"
                    );
                    self.set_state(ConnectionState::Disconnected);
                    continue 'idle;
                }
                let delay = self
                    .config
                    .reconnect_base_delay
                    .saturating_mul(2u32.saturating_pow(attempt - 1));
                debug!(
                    component = "transport",
                    event = "transport.reconnect.scheduled",
                    attempt = attempt,
                    delay_ms = delay.as_millis() as u64,
                    "Reconnecting after backoff"
                );

                let sleep = tokio::time::sleep(delay);
                tokio::pin!(sleep);
                loop {
                    tokio::select! {
                        _ = &mut sleep => break,
                        cmd = self.command_rx.recv() => match cmd {
                            None => return,
                            Some(TransportCommand::Disconnect) => {
                                self.set_state(ConnectionState::Disconnected);
                                continue 'idle;
                            }
                            // Explicit connect short-circuits the backoff.
                            Some(TransportCommand::Connect) => break,
                            Some(TransportCommand::Send(msg)) => warn_dropped(&msg),
                        }
                    }
                }
                continue 'connect;
            }
        }
    }

    /// Pump one open socket until it closes or a command ends it.
    async fn drive(&mut self, stream: WebSocketStream<MaybeTlsStream<TcpStream>>) -> Drive {
        let (mut sink, mut source) = stream.split();

        let mut keepalive = tokio::time::interval_at(
            tokio::time::Instant::now() + self.config.keepalive_interval,
            self.config.keepalive_interval,
        );
        keepalive.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                frame = source.next() => match frame {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<ServerMessage>(text.as_str()) {
                            Ok(msg) => {
                                let _ = self.event_tx.send(TransportEvent::Message(msg));
                            }
                            Err(e) => warn!(
                                component = "transport",
                                event = "transport.frame.malformed",
                                error = %e,
                                payload_bytes = text.len(),
                                "Dropping malformed frame"
                            ),
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        let _ = sink.send(Message::Pong(data)).await;
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        info!(
                            component = "transport",
                            event = "transport.connection.closed",
                            "Server closed the connection"
                        );
                        return Drive::Lost;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!(
                            component = "transport",
                            event = "transport.connection.error",
                            error = %e,
                            "WebSocket error"
                        );
                        return Drive::Lost;
                    }
                },
                cmd = self.command_rx.recv() => match cmd {
                    None => {
                        let _ = sink.send(Message::Close(None)).await;
                        return Drive::Shutdown;
                    }
                    // Already open; connect is idempotent.
                    Some(TransportCommand::Connect) => {}
                    Some(TransportCommand::Disconnect) => {
                        let _ = sink.close().await;
                        return Drive::Disconnect;
                    }
                    Some(TransportCommand::Send(msg)) => match serde_json::to_string(&msg) {
                        Ok(json) => {
                            if let Err(e) = sink.send(Message::Text(json.into())).await {
                                warn!(
                                    component = "transport",
                                    event = "transport.send.failed",
                                    error = %e,
                                    "Send failed, treating socket as lost"
                                );
                                return Drive::Lost;
                            }
                        }
                        Err(e) => error!(
                            component = "transport",
                            event = "transport.send.serialize_failed",
                            error = %e,
                            "Failed to serialize client message"
                        ),
                    },
                },
                _ = keepalive.tick() => {
                    if let Ok(json) = serde_json::to_string(&ClientMessage::Ping) {
                        if sink.send(Message::Text(json.into())).await.is_err() {
                            return Drive::Lost;
                        }
                    }
                }
            }
        }
    }
}

fn warn_dropped(msg: &ClientMessage) {
    warn!(
        component = "transport",
        event = "transport.send.dropped",
        session_id = msg.session_id().unwrap_or("-"),
        "Socket not open, dropping outbound message"
    );
}
