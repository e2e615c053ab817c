//! Inbound frame validation and outbound encoding.
//!
//! Decoding is all-or-nothing: a frame that is not a JSON object of the
//! `Message` shape is rejected as a whole. Optional fields may be absent but
//! may not be `null` or of the wrong type.

use thiserror::Error;

use crate::messages::{Action, Message};

const OPTIONAL_FIELDS: [&str; 5] = ["content", "from", "timestamp", "event", "data"];

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("frame is not valid JSON: {0}")]
    Json(#[source] serde_json::Error),

    #[error("frame is not a JSON object")]
    NotAnObject,

    #[error("field `{0}` must be omitted rather than null")]
    NullField(&'static str),

    #[error("frame does not match the message shape: {0}")]
    Shape(#[source] serde_json::Error),

    #[error("event frame is missing a non-empty `event` name")]
    MissingEventName,

    #[error("failed to encode message: {0}")]
    Encode(#[source] serde_json::Error),
}

/// Parse and validate an inbound text frame.
pub fn decode(text: &str) -> Result<Message, CodecError> {
    let value: serde_json::Value = serde_json::from_str(text).map_err(CodecError::Json)?;
    let object = value.as_object().ok_or(CodecError::NotAnObject)?;

    for field in OPTIONAL_FIELDS {
        if object.get(field).is_some_and(serde_json::Value::is_null) {
            return Err(CodecError::NullField(field));
        }
    }

    let message: Message = serde_json::from_value(value).map_err(CodecError::Shape)?;

    if message.action == Action::Event && message.event_name().is_none() {
        return Err(CodecError::MissingEventName);
    }

    Ok(message)
}

/// Serialize a message into its wire form.
pub fn encode(message: &Message) -> Result<String, CodecError> {
    serde_json::to_string(message).map_err(CodecError::Encode)
}
