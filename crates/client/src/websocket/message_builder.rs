//! Outbound message construction.
//!
//! Centralizes the frames this client sends so the session, the public API and
//! the presence query build them the same way. Sender identity and time are
//! applied last by [`RoomMessageBuilder::stamp`].

use chrono::{DateTime, SecondsFormat, Utc};
use rayy_shared::messages::events;
use rayy_shared::{EventData, Message};

/// Key under which presence queries carry their correlation id.
pub const REQUEST_ID_KEY: &str = "request_id";

pub struct RoomMessageBuilder;

impl RoomMessageBuilder {
    /// Create a chat message
    pub fn chat(room: &str, content: &str) -> Message {
        Message::chat(room, content)
    }

    /// Create a named event with optional payload
    pub fn event(room: &str, event: &str, data: Option<EventData>) -> Message {
        Message::event(room, event, data)
    }

    pub fn join(room: &str) -> Message {
        Message::event(room, events::JOIN, None)
    }

    pub fn leave(room: &str) -> Message {
        Message::event(room, events::LEAVE, None)
    }

    /// Create a `list_users` presence query tagged with `request_id`
    pub fn list_users(room: &str, request_id: &str) -> Message {
        let mut data = EventData::new();
        data.insert(
            REQUEST_ID_KEY.to_string(),
            serde_json::Value::String(request_id.to_string()),
        );
        Message::event(room, events::LIST_USERS, Some(data))
    }

    /// Apply sender identity and send time.
    ///
    /// `from` is always this client. A timestamp already present on the payload wins.
    pub fn stamp(mut message: Message, client_id: &str, now: DateTime<Utc>) -> Message {
        message.from = Some(client_id.to_string());
        if message.timestamp.is_none() {
            message.timestamp = Some(iso_timestamp(now));
        }
        message
    }
}

/// RFC 3339 / ISO-8601 UTC timestamp with millisecond precision (`2024-01-01T00:00:00.000Z`).
pub fn iso_timestamp(now: DateTime<Utc>) -> String {
    now.to_rfc3339_opts(SecondsFormat::Millis, true)
}
