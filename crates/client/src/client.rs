//! The public client: room operations over per-room sessions.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use futures_util::future::join_all;
use rayy_shared::{EventData, Message, CATCH_ALL_EVENT_KEY, MESSAGE_KEY};

use crate::config::{ClientConfig, ConfigError};
use crate::messaging::{Listener, ListenerRegistry, SessionState, SessionStateObserver};
use crate::presence::{query_presence, PresenceError};
use crate::websocket::{RoomMessageBuilder, RoomSession};

/// Client for the room messaging backend.
///
/// Each subscribed room gets its own socket. Listeners are global to the
/// client: a listener on `typing` fires for `typing` events from every
/// subscribed room. Filter on [`Message::room`] inside the listener when that
/// matters.
pub struct RayyClient {
    config: ClientConfig,
    registry: ListenerRegistry,
    sessions: Mutex<HashMap<String, RoomSession>>,
}

impl RayyClient {
    pub fn new(config: ClientConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            registry: ListenerRegistry::new(),
            sessions: Mutex::new(HashMap::new()),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn client_id(&self) -> &str {
        self.config.client_id()
    }

    /// The registry shared by all of this client's sessions.
    pub fn registry(&self) -> &ListenerRegistry {
        &self.registry
    }

    fn sessions(&self) -> MutexGuard<'_, HashMap<String, RoomSession>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn send_to(&self, room: &str, payload: Message) {
        match self.sessions().get(room) {
            Some(session) => session.send(payload),
            None => tracing::error!(
                room = %room,
                "WebSocket is not open. Unable to send message."
            ),
        }
    }

    /// Send a chat message. Dropped with a logged diagnostic if the room is not open.
    pub fn send(&self, room: &str, content: &str) {
        self.send_to(room, RoomMessageBuilder::chat(room, content));
    }

    /// Emit a named event with an optional payload.
    pub fn event(&self, room: &str, event: &str, data: Option<EventData>) {
        self.send_to(room, RoomMessageBuilder::event(room, event, data));
    }

    /// Open a session for `room` and register `listener` for chat messages
    /// and for every event.
    ///
    /// A room that already has a live session keeps it; only the listener is
    /// added. A session that gave up reconnecting is replaced by a fresh one.
    /// Must be called inside a tokio runtime.
    pub fn subscribe(&self, room: &str, listener: Listener) -> Result<(), ConfigError> {
        let mut sessions = self.sessions();
        let reusable = sessions
            .get(room)
            .is_some_and(|session| !session.is_finished());
        let fresh = if reusable {
            None
        } else {
            Some(RoomSession::spawn(room, &self.config, self.registry.clone())?)
        };

        self.registry.listen(MESSAGE_KEY, listener.clone());
        self.registry.listen(CATCH_ALL_EVENT_KEY, listener);

        if let Some(session) = fresh {
            tracing::info!(room = %room, client_id = %self.client_id(), "Subscribed to room");
            sessions.insert(room.to_string(), session);
        }
        Ok(())
    }

    /// Register `listener` under an event key (`message`, `event`, or an event name).
    pub fn listen(&self, key: &str, listener: Listener) {
        self.registry.listen(key, listener);
    }

    /// Remove every registration of `listener` under `key`.
    pub fn off(&self, key: &str, listener: &Listener) {
        self.registry.off(key, listener);
    }

    /// Ask the server who is currently in `room`.
    pub async fn presence(&self, room: &str) -> Result<Vec<String>, PresenceError> {
        query_presence(
            &self.registry,
            room,
            self.config.presence_timeout(),
            |query| self.send_to(room, query),
        )
        .await
    }

    /// Current state of the session for `room`, if one exists.
    pub fn state(&self, room: &str) -> Option<SessionState> {
        self.sessions().get(room).map(RoomSession::state)
    }

    pub fn observer(&self, room: &str) -> Option<SessionStateObserver> {
        self.sessions().get(room).map(RoomSession::observer)
    }

    /// Rooms with a session, live or not.
    pub fn rooms(&self) -> Vec<String> {
        self.sessions().keys().cloned().collect()
    }

    /// Announce `leave`, close the room's socket and stop reconnecting.
    ///
    /// Listeners stay registered.
    pub async fn leave(&self, room: &str) {
        let session = self.sessions().remove(room);
        if let Some(session) = session {
            session.shutdown().await;
            tracing::info!(room = %room, "Left room");
        }
    }

    /// Leave every room.
    pub async fn close(&self) {
        let sessions: Vec<RoomSession> = self.sessions().drain().map(|(_, s)| s).collect();
        join_all(sessions.iter().map(RoomSession::shutdown)).await;
    }
}
