//! Core message domain model.
//!
//! Contains the `Message` sum type and its role-specific structs. A
//! conversation is an ordered sequence of messages, optionally starting
//! with a single system message; the first non-system message must be a
//! user message.

use serde::{Deserialize, Serialize};

use crate::content::Content;

/// A tool invocation requested by an assistant message.
///
/// Contains the call id (for matching with results), the tool name, and the
/// arguments as a JSON value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Identifier for this call, matched by the answering tool result.
    pub id: String,
    /// The name of the tool being called.
    pub name: String,
    /// The arguments to pass to the tool, as parsed JSON.
    pub arguments: serde_json::Value,
}

impl ToolCall {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: serde_json::Value,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemMessage {
    #[serde(default)]
    content: Content,
}

impl SystemMessage {
    #[must_use]
    pub fn new(content: Content) -> Self {
        Self { content }
    }

    #[must_use]
    pub fn content(&self) -> &Content {
        &self.content
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserMessage {
    #[serde(default)]
    content: Content,
}

impl UserMessage {
    #[must_use]
    pub fn new(content: Content) -> Self {
        Self { content }
    }

    #[must_use]
    pub fn content(&self) -> &Content {
        &self.content
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssistantMessage {
    #[serde(default)]
    content: Content,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_call: Option<ToolCall>,
}

impl AssistantMessage {
    #[must_use]
    pub fn new(content: Content) -> Self {
        Self {
            content,
            tool_call: None,
        }
    }

    #[must_use]
    pub fn with_tool_call(content: Content, call: ToolCall) -> Self {
        Self {
            content,
            tool_call: Some(call),
        }
    }

    #[must_use]
    pub fn content(&self) -> &Content {
        &self.content
    }

    #[must_use]
    pub fn tool_call(&self) -> Option<&ToolCall> {
        self.tool_call.as_ref()
    }
}

/// The result of executing a tool call, as a conversation turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResultMessage {
    /// The name of the tool that was called.
    pub tool_name: String,
    #[serde(default)]
    content: Content,
}

impl ToolResultMessage {
    #[must_use]
    pub fn new(tool_name: impl Into<String>, content: Content) -> Self {
        Self {
            tool_name: tool_name.into(),
            content,
        }
    }

    #[must_use]
    pub fn content(&self) -> &Content {
        &self.content
    }
}

/// A complete message.
///
/// This is a real sum type (not a `Role` tag + "sometimes-meaningful"
/// fields): a tool call can only appear on an assistant message, and a tool
/// name only on a tool result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "kebab-case")]
pub enum Message {
    System(SystemMessage),
    User(UserMessage),
    Assistant(AssistantMessage),
    ToolResult(ToolResultMessage),
}

impl Message {
    #[must_use]
    pub fn system(content: impl Into<Content>) -> Self {
        Self::System(SystemMessage::new(content.into()))
    }

    #[must_use]
    pub fn user(content: impl Into<Content>) -> Self {
        Self::User(UserMessage::new(content.into()))
    }

    #[must_use]
    pub fn assistant(content: impl Into<Content>) -> Self {
        Self::Assistant(AssistantMessage::new(content.into()))
    }

    /// An assistant message requesting a tool invocation.
    #[must_use]
    pub fn assistant_tool_call(content: impl Into<Content>, call: ToolCall) -> Self {
        Self::Assistant(AssistantMessage::with_tool_call(content.into(), call))
    }

    /// The result of executing a tool call.
    #[must_use]
    pub fn tool_result(tool_name: impl Into<String>, content: impl Into<Content>) -> Self {
        Self::ToolResult(ToolResultMessage::new(tool_name, content.into()))
    }

    #[must_use]
    pub fn role_str(&self) -> &'static str {
        match self {
            Message::System(_) => "system",
            Message::User(_) => "user",
            Message::Assistant(_) => "assistant",
            Message::ToolResult(_) => "tool-result",
        }
    }

    #[must_use]
    pub fn content(&self) -> &Content {
        match self {
            Message::System(m) => m.content(),
            Message::User(m) => m.content(),
            Message::Assistant(m) => m.content(),
            Message::ToolResult(m) => m.content(),
        }
    }

    /// The plain text of this message's content.
    #[must_use]
    pub fn text(&self) -> String {
        self.content().text()
    }

    /// The tool call carried by this message, if it is an assistant message
    /// requesting one.
    #[must_use]
    pub fn tool_call(&self) -> Option<&ToolCall> {
        match self {
            Message::Assistant(m) => m.tool_call(),
            _ => None,
        }
    }

    /// A copy of this message with its content replaced.
    ///
    /// The variant and all role-specific metadata (an assistant's tool
    /// call, a tool result's tool name) are preserved.
    #[must_use]
    pub fn with_content(&self, content: impl Into<Content>) -> Self {
        let content = content.into();
        match self {
            Message::System(_) => Message::System(SystemMessage::new(content)),
            Message::User(_) => Message::User(UserMessage::new(content)),
            Message::Assistant(m) => Message::Assistant(AssistantMessage {
                content,
                tool_call: m.tool_call().cloned(),
            }),
            Message::ToolResult(m) => {
                Message::ToolResult(ToolResultMessage::new(m.tool_name.clone(), content))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::ContentPart;

    #[test]
    fn role_str_covers_all_variants() {
        assert_eq!(Message::system("s").role_str(), "system");
        assert_eq!(Message::user("u").role_str(), "user");
        assert_eq!(Message::assistant("a").role_str(), "assistant");
        assert_eq!(Message::tool_result("search", "r").role_str(), "tool-result");
    }

    #[test]
    fn tool_call_only_on_assistant() {
        let call = ToolCall::new("call_1", "search", serde_json::json!({"q": "rust"}));
        let msg = Message::assistant_tool_call("", call.clone());
        assert_eq!(msg.tool_call(), Some(&call));
        assert_eq!(Message::user("hi").tool_call(), None);
    }

    #[test]
    fn with_content_preserves_tool_call() {
        let call = ToolCall::new("call_1", "search", serde_json::json!({}));
        let msg = Message::assistant_tool_call("thinking...", call.clone());
        let replaced = msg.with_content("shorter");
        assert_eq!(replaced.tool_call(), Some(&call));
        assert_eq!(replaced.text(), "shorter");
    }

    #[test]
    fn with_content_preserves_tool_name() {
        let msg = Message::tool_result("search", "a very long result");
        let replaced = msg.with_content("omit");
        match replaced {
            Message::ToolResult(m) => assert_eq!(m.tool_name, "search"),
            other => panic!("expected tool result, got {other:?}"),
        }
    }

    #[test]
    fn text_of_list_content() {
        let msg = Message::user(Content::Parts(vec![
            ContentPart::text("one"),
            ContentPart::text("two"),
        ]));
        assert_eq!(msg.text(), "one\ntwo");
    }

    #[test]
    fn serde_round_trip_tags_by_role() {
        let msg = Message::tool_result("search", "found it");
        let json = serde_json::to_value(&msg).expect("serializable");
        assert_eq!(json["role"], "tool-result");
        assert_eq!(json["tool_name"], "search");
        let back: Message = serde_json::from_value(json).expect("deserializable");
        assert_eq!(back, msg);
    }

    #[test]
    fn absent_content_normalizes_to_empty_string() {
        let msg: Message = serde_json::from_str(r#"{"role": "user"}"#).expect("valid json");
        assert_eq!(msg.content(), &Content::Text(String::new()));
    }
}
