//! Presence query: a request/response exchange layered on the event channel.
//!
//! The query registers a temporary `list_users` listener, sends a `list_users`
//! event tagged with a fresh request id, and waits for a reply carrying
//! `data.users`. Replies that echo a different request id belong to another
//! query and are skipped; replies without any request id are accepted, so
//! servers that do not echo it still work.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use rayy_shared::messages::events;
use rayy_shared::Message;
use thiserror::Error;
use tokio::sync::oneshot;

use crate::messaging::{listener, ListenerRegistry};
use crate::websocket::{RoomMessageBuilder, REQUEST_ID_KEY};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PresenceError {
    #[error("Users list request timed out")]
    Timeout,

    #[error("users list reply is not a list of client ids")]
    InvalidReply,

    #[error("users list request was cancelled")]
    Cancelled,
}

/// Ask `room` for its member list.
///
/// `send` is handed the query frame; it is expected to go out through the
/// room's session (and may be dropped there if the session is not open, in
/// which case the query times out).
pub async fn query_presence<F>(
    registry: &ListenerRegistry,
    room: &str,
    timeout: Duration,
    send: F,
) -> Result<Vec<String>, PresenceError>
where
    F: FnOnce(Message),
{
    let request_id = uuid::Uuid::new_v4().to_string();
    let (tx, rx) = oneshot::channel::<Result<Vec<String>, PresenceError>>();
    let reply_slot = Mutex::new(Some(tx));

    let expected_room = room.to_string();
    let expected_id = request_id.clone();
    let temp = listener(move |msg: &Message| {
        if msg.room != expected_room || !is_reply_to(msg, &expected_id) {
            return;
        }
        let Some(users) = msg.data_field("users") else {
            return;
        };
        let reply = reply_slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(reply) = reply {
            let _ = reply.send(parse_users(users));
        }
    });

    registry.listen(events::LIST_USERS, temp.clone());
    send(RoomMessageBuilder::list_users(room, &request_id));

    let outcome = tokio::time::timeout(timeout, rx).await;
    registry.off(events::LIST_USERS, &temp);

    match outcome {
        Ok(Ok(result)) => result,
        Ok(Err(_)) => Err(PresenceError::Cancelled),
        Err(_) => {
            tracing::warn!(room = %room, request_id = %request_id, "Users list request timed out");
            Err(PresenceError::Timeout)
        }
    }
}

fn is_reply_to(msg: &Message, request_id: &str) -> bool {
    match msg.data_field(REQUEST_ID_KEY) {
        Some(serde_json::Value::String(id)) => id == request_id,
        Some(_) => false,
        None => true,
    }
}

fn parse_users(users: &serde_json::Value) -> Result<Vec<String>, PresenceError> {
    let list = users.as_array().ok_or(PresenceError::InvalidReply)?;
    list.iter()
        .map(|user| {
            user.as_str()
                .map(str::to_string)
                .ok_or(PresenceError::InvalidReply)
        })
        .collect()
}
