//! Message content: plain text or an ordered list of typed parts.

use serde::{Deserialize, Serialize};

/// One typed part of a list-valued message content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentPart {
    /// A plain text fragment.
    Text(String),
    /// A structured tool-call payload carried inside the content list.
    ToolPayload(serde_json::Value),
}

impl ContentPart {
    /// Create a text part.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    /// The text of this part, if it is a text part.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ContentPart::Text(text) => Some(text),
            ContentPart::ToolPayload(_) => None,
        }
    }
}

/// The content of a message.
///
/// Content is either a single string or an ordered sequence of
/// [`ContentPart`]s. The default is the empty string - an absent content
/// value normalizes to `Content::Text("")`, never to a null.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Content {
    Text(String),
    Parts(Vec<ContentPart>),
}

impl Default for Content {
    fn default() -> Self {
        Content::Text(String::new())
    }
}

impl From<&str> for Content {
    fn from(text: &str) -> Self {
        Content::Text(text.to_string())
    }
}

impl From<String> for Content {
    fn from(text: String) -> Self {
        Content::Text(text)
    }
}

impl Content {
    /// Extract the plain text of this content.
    ///
    /// List-valued content joins the text of its text parts with newlines;
    /// tool payload parts contribute nothing.
    #[must_use]
    pub fn text(&self) -> String {
        match self {
            Content::Text(text) => text.clone(),
            Content::Parts(parts) => {
                let texts: Vec<&str> = parts.iter().filter_map(ContentPart::as_text).collect();
                texts.join("\n")
            }
        }
    }

    /// The text of this content if every part of it can be shrunk.
    ///
    /// Plain string content is always eligible. List content is eligible
    /// only when every part is a non-empty text part; a tool payload or an
    /// empty text part makes the whole content non-truncatable and the
    /// caller falls back to omitting it outright.
    #[must_use]
    pub fn truncatable_text(&self) -> Option<String> {
        match self {
            Content::Text(text) => Some(text.clone()),
            Content::Parts(parts) => {
                let mut texts = Vec::with_capacity(parts.len());
                for part in parts {
                    match part.as_text() {
                        Some(text) if !text.is_empty() => texts.push(text),
                        _ => return None,
                    }
                }
                Some(texts.join("\n"))
            }
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Content::Text(text) => text.is_empty(),
            Content::Parts(parts) => parts.is_empty(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_content_is_empty_text() {
        assert_eq!(Content::default(), Content::Text(String::new()));
        assert!(Content::default().is_empty());
    }

    #[test]
    fn text_joins_parts_with_newlines() {
        let content = Content::Parts(vec![
            ContentPart::text("first"),
            ContentPart::text("second"),
        ]);
        assert_eq!(content.text(), "first\nsecond");
    }

    #[test]
    fn text_skips_tool_payload_parts() {
        let content = Content::Parts(vec![
            ContentPart::text("result"),
            ContentPart::ToolPayload(serde_json::json!({"name": "search"})),
        ]);
        assert_eq!(content.text(), "result");
    }

    #[test]
    fn truncatable_text_rejects_empty_text_part() {
        let content = Content::Parts(vec![ContentPart::text("ok"), ContentPart::text("")]);
        assert_eq!(content.truncatable_text(), None);
    }

    #[test]
    fn truncatable_text_rejects_tool_payload_part() {
        let content = Content::Parts(vec![
            ContentPart::text("ok"),
            ContentPart::ToolPayload(serde_json::json!(null)),
        ]);
        assert_eq!(content.truncatable_text(), None);
    }

    #[test]
    fn truncatable_text_accepts_plain_string() {
        let content = Content::from("anything");
        assert_eq!(content.truncatable_text().as_deref(), Some("anything"));
    }

    #[test]
    fn content_deserializes_from_bare_string() {
        let content: Content = serde_json::from_str("\"hello\"").expect("valid json");
        assert_eq!(content, Content::Text("hello".to_string()));
    }

    #[test]
    fn content_deserializes_from_part_list() {
        let content: Content =
            serde_json::from_str(r#"[{"text": "hi"}]"#).expect("valid json");
        assert_eq!(content, Content::Parts(vec![ContentPart::text("hi")]));
    }
}
