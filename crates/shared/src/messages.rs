//! Message types for client-server room communication
//!
//! A single frame shape travels in both directions. The `action` field selects
//! between a plain chat message and a named event; everything except `action`
//! and `room` is optional on the wire.
//!
//! ## Versioning Policy
//!
//! - Unknown fields are ignored on decode (forward compatible)
//! - New `Action` variants are a breaking change for older clients

use serde::{Deserialize, Serialize};

/// Open key/value payload carried by events.
pub type EventData = serde_json::Map<String, serde_json::Value>;

/// Listener key that receives every `action = message` frame.
pub const MESSAGE_KEY: &str = "message";

/// Listener key that receives every `action = event` frame, whatever its name.
pub const CATCH_ALL_EVENT_KEY: &str = "event";

/// Well-known event names used by the room lifecycle.
pub mod events {
    pub const JOIN: &str = "join";
    pub const LEAVE: &str = "leave";
    pub const LIST_USERS: &str = "list_users";
}

/// Frame discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Message,
    Event,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Action::Message => "message",
            Action::Event => "event",
        }
    }
}

/// A room frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub action: Action,
    pub room: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    /// ISO-8601 timestamp set by the sender
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<EventData>,
}

impl Message {
    /// Build a chat message for `room`.
    pub fn chat(room: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            action: Action::Message,
            room: room.into(),
            content: Some(content.into()),
            from: None,
            timestamp: None,
            event: None,
            data: None,
        }
    }

    /// Build a named event for `room`.
    pub fn event(room: impl Into<String>, event: impl Into<String>, data: Option<EventData>) -> Self {
        Self {
            action: Action::Event,
            room: room.into(),
            content: None,
            from: None,
            timestamp: None,
            event: Some(event.into()),
            data,
        }
    }

    /// Event name, if this is an event frame with a name.
    pub fn event_name(&self) -> Option<&str> {
        match self.action {
            Action::Event => self.event.as_deref().filter(|e| !e.is_empty()),
            Action::Message => None,
        }
    }

    /// Look up a key in `data`.
    pub fn data_field(&self, key: &str) -> Option<&serde_json::Value> {
        self.data.as_ref().and_then(|d| d.get(key))
    }
}
