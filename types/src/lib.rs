//! Core domain types for kiln.
//!
//! This crate contains pure domain types with no IO, no async, and minimal
//! dependencies. Everything here can be used from any layer of the runtime.
//!
//! The central type is [`Message`], a sum type over the four conversation
//! roles. Message content is a [`Content`] value: either plain text or an
//! ordered list of typed [`ContentPart`]s. Content is never "null" - an
//! absent value deserializes to the empty string.

mod content;
mod message;

pub use content::{Content, ContentPart};
pub use message::{
    AssistantMessage, Message, SystemMessage, ToolCall, ToolResultMessage, UserMessage,
};
