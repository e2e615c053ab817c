//! Rayy Shared - wire types for room messaging
//!
//! This crate contains the types exchanged with the room backend:
//! - The `Message` frame and its `Action` discriminator
//! - The codec that validates inbound frames before they reach listeners
//!
//! # Design Principles
//!
//! 1. **Minimal dependencies** - Only serde, serde_json, and thiserror
//! 2. **No transport logic** - Pure data types and serialization
//! 3. **Strict on required fields** - invalid frames are rejected, never patched

pub mod codec;
pub mod messages;

pub use codec::{decode, encode, CodecError};
pub use messages::{Action, EventData, Message, CATCH_ALL_EVENT_KEY, MESSAGE_KEY};
