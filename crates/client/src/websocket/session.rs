//! Per-room WebSocket session using tokio-tungstenite.
//!
//! A `RoomSession` owns one socket for one room at a time. Its background task
//! drives `Connecting → Open → Closed`, feeds inbound frames through the codec
//! into the listener registry, announces `join`/`leave`, and consults the
//! reconnect policy whenever the socket goes away.

use std::sync::atomic::AtomicU8;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use rayy_shared::{encode, Message};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message as WsMessage};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::config::{ClientConfig, ConfigError};
use crate::messaging::{set_session_state, ListenerRegistry, SessionState, SessionStateObserver};
use crate::websocket::core::ReconnectPolicy;
use crate::websocket::message_builder::RoomMessageBuilder;
use crate::websocket::shared::{
    parse_room_message, rate_limit_retry_after, SHUTDOWN_FLUSH_TIMEOUT,
};

/// Work items for the socket writer.
#[derive(Debug)]
enum Outbound {
    Frame(Message),
    Close,
}

/// How one socket lifetime ended.
#[derive(Debug)]
enum SessionOutcome {
    /// Closed by the peer, by a transport error, or never opened
    Closed,
    /// Handshake refused with 429; wait before reconnecting
    RateLimited(std::time::Duration),
    /// Local shutdown requested
    Shutdown,
}

/// State shared between the session handle and its task.
struct SessionShared {
    room: String,
    client_id: String,
    state: Arc<AtomicU8>,
    outbound: Mutex<Option<mpsc::UnboundedSender<Outbound>>>,
}

impl SessionShared {
    fn outbound(&self) -> MutexGuard<'_, Option<mpsc::UnboundedSender<Outbound>>> {
        self.outbound.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn state(&self) -> SessionState {
        SessionStateObserver::new(Arc::clone(&self.state)).state()
    }

    /// Stamp and queue `payload` on the open socket. Dropped with a diagnostic otherwise.
    fn send(&self, payload: Message) {
        let tx = match self.state() {
            SessionState::Open => self.outbound().clone(),
            SessionState::Connecting | SessionState::Closed => None,
        };
        let Some(tx) = tx else {
            tracing::error!(
                room = %self.room,
                "WebSocket is not open. Unable to send message."
            );
            return;
        };

        let message = RoomMessageBuilder::stamp(payload, &self.client_id, Utc::now());
        if let Err(e) = tx.send(Outbound::Frame(message)) {
            tracing::error!(room = %self.room, error = %e, "Failed to queue outbound message");
        }
    }

    fn queue_close(&self) {
        if let Some(tx) = self.outbound().as_ref() {
            if let Err(e) = tx.send(Outbound::Close) {
                tracing::debug!(room = %self.room, error = %e, "Close frame not queued");
            }
        }
    }
}

/// Handle to a running room session.
///
/// Dropping the handle cancels the session task.
pub struct RoomSession {
    shared: Arc<SessionShared>,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl RoomSession {
    /// Start a session for `room`. Must be called inside a tokio runtime.
    pub fn spawn(
        room: &str,
        config: &ClientConfig,
        registry: ListenerRegistry,
    ) -> Result<Self, ConfigError> {
        let url = config.room_url(room)?;
        let shared = Arc::new(SessionShared {
            room: room.to_string(),
            client_id: config.client_id().to_string(),
            state: Arc::new(AtomicU8::new(SessionState::Connecting.to_u8())),
            outbound: Mutex::new(None),
        });
        let cancel = CancellationToken::new();

        let task = SessionTask {
            shared: Arc::clone(&shared),
            url,
            registry,
            auto_reconnect: config.auto_reconnect(),
            policy: ReconnectPolicy::new(config.auto_reconnect(), config.reconnect()),
            cancel: cancel.clone(),
        };
        let handle = tokio::spawn(task.run());

        Ok(Self {
            shared,
            cancel,
            task: Mutex::new(Some(handle)),
        })
    }

    pub fn room(&self) -> &str {
        &self.shared.room
    }

    /// Send a partial frame; `room`-scoped stamping is applied here.
    pub fn send(&self, payload: Message) {
        self.shared.send(payload);
    }

    pub fn state(&self) -> SessionState {
        self.shared.state()
    }

    pub fn observer(&self) -> SessionStateObserver {
        SessionStateObserver::new(Arc::clone(&self.shared.state))
    }

    /// True once the task has stopped for good (shutdown or reconnects exhausted).
    pub fn is_finished(&self) -> bool {
        self.task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map_or(true, JoinHandle::is_finished)
    }

    /// Announce `leave`, close the socket, and wait for the task to stop.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        let task = self
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                tracing::warn!(room = %self.shared.room, error = %e, "Session task ended abnormally");
            }
        }
    }
}

impl Drop for RoomSession {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

struct SessionTask {
    shared: Arc<SessionShared>,
    url: Url,
    registry: ListenerRegistry,
    auto_reconnect: bool,
    policy: ReconnectPolicy,
    cancel: CancellationToken,
}

impl SessionTask {
    async fn run(mut self) {
        loop {
            let wait = match self.connect_once().await {
                SessionOutcome::Shutdown => break,
                SessionOutcome::RateLimited(wait) => {
                    tracing::info!(
                        room = %self.shared.room,
                        retry_after_secs = wait.as_secs(),
                        "Rate limited. Retrying in {} seconds",
                        wait.as_secs()
                    );
                    wait
                }
                SessionOutcome::Closed => match self.policy.next_delay() {
                    Some(delay) => {
                        tracing::info!(
                            room = %self.shared.room,
                            attempt = self.policy.attempts(),
                            delay_ms = delay.as_millis() as u64,
                            "Reconnecting... attempt {}",
                            self.policy.attempts()
                        );
                        delay
                    }
                    None => {
                        if self.auto_reconnect {
                            tracing::error!(
                                room = %self.shared.room,
                                attempts = self.policy.attempts(),
                                "Max reconnection attempts reached, giving up"
                            );
                        } else {
                            tracing::debug!(room = %self.shared.room, "Session closed");
                        }
                        break;
                    }
                },
            };

            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = tokio::time::sleep(wait) => {}
            }
        }

        set_session_state(&self.shared.state, SessionState::Closed);
    }

    /// One socket lifetime: connect, pump frames until it ends, tear down.
    async fn connect_once(&mut self) -> SessionOutcome {
        set_session_state(&self.shared.state, SessionState::Connecting);
        tracing::debug!(room = %self.shared.room, url = %self.url, "Connecting to room");

        let connect = tokio::select! {
            _ = self.cancel.cancelled() => return SessionOutcome::Shutdown,
            result = connect_async(self.url.as_str()) => result,
        };

        let ws_stream = match connect {
            Ok((ws_stream, _response)) => ws_stream,
            Err(e) => {
                self.shared.send(RoomMessageBuilder::leave(&self.shared.room));
                self.close_out();
                if let Some(wait) = rate_limit_retry_after(&e) {
                    return SessionOutcome::RateLimited(wait);
                }
                tracing::warn!(room = %self.shared.room, error = %e, "Failed to connect to room");
                return SessionOutcome::Closed;
            }
        };

        let (mut write, mut read) = ws_stream.split();
        let (tx, mut rx) = mpsc::unbounded_channel::<Outbound>();
        *self.shared.outbound() = Some(tx);

        set_session_state(&self.shared.state, SessionState::Open);
        self.policy.reset();
        tracing::info!(room = %self.shared.room, "Connected to room");
        self.shared.send(RoomMessageBuilder::join(&self.shared.room));

        let room = self.shared.room.clone();
        let mut writer = tokio::spawn(async move {
            while let Some(outbound) = rx.recv().await {
                match outbound {
                    Outbound::Frame(message) => {
                        let json = match encode(&message) {
                            Ok(json) => json,
                            Err(e) => {
                                tracing::error!(room = %room, error = %e, "Failed to encode message");
                                continue;
                            }
                        };
                        if let Err(e) = write.send(WsMessage::Text(json)).await {
                            tracing::warn!(room = %room, error = %e, "Failed to send message");
                            break;
                        }
                    }
                    Outbound::Close => {
                        if let Err(e) = write.send(WsMessage::Close(None)).await {
                            tracing::debug!(room = %room, error = %e, "Close frame not delivered");
                        }
                        break;
                    }
                }
            }
        });

        let outcome = loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break SessionOutcome::Shutdown,
                frame = read.next() => match frame {
                    Some(Ok(WsMessage::Text(text))) => self.handle_text(&text),
                    Some(Ok(WsMessage::Close(frame))) => {
                        tracing::info!(room = %self.shared.room, ?frame, "Server closed connection");
                        break SessionOutcome::Closed;
                    }
                    // Ping/pong are answered by tungstenite; the protocol has no binary frames.
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::warn!(room = %self.shared.room, error = %e, "WebSocket error");
                        break SessionOutcome::Closed;
                    }
                    None => {
                        tracing::info!(room = %self.shared.room, "Connection ended");
                        break SessionOutcome::Closed;
                    }
                },
            }
        };

        // `leave` is queued while the socket still counts as open, ahead of any close frame.
        self.shared.send(RoomMessageBuilder::leave(&self.shared.room));
        if matches!(outcome, SessionOutcome::Shutdown) {
            self.shared.queue_close();
        }
        self.close_out();

        if tokio::time::timeout(SHUTDOWN_FLUSH_TIMEOUT, &mut writer)
            .await
            .is_err()
        {
            tracing::debug!(room = %self.shared.room, "Writer did not flush in time");
            writer.abort();
        }

        outcome
    }

    /// Detach the writer and mark the session closed.
    fn close_out(&self) {
        self.shared.outbound().take();
        set_session_state(&self.shared.state, SessionState::Closed);
    }

    fn handle_text(&self, text: &str) {
        match parse_room_message(text) {
            Ok(message) => {
                let invoked = self.registry.route(&message);
                tracing::debug!(
                    room = %self.shared.room,
                    action = message.action.as_str(),
                    event = message.event.as_deref().unwrap_or(""),
                    invoked,
                    "Dispatched frame"
                );
            }
            Err(e) => {
                tracing::warn!(room = %self.shared.room, error = %e, "Invalid message format");
            }
        }
    }
}
