//! Token counting using tiktoken.
//!
//! This module provides **approximate** token counting using the
//! `o200k_base` encoding from tiktoken. The truncator treats the counter as
//! a pure function and only assumes monotonicity loosely: a longer text
//! never counts meaningfully fewer tokens than its prefix, but no exact
//! equality across calls is relied upon.
//!
//! Besides counting, the counter exposes the two tokenizer primitives the
//! rest of the crate needs: shrinking a string to a token target while
//! keeping both its head and its tail, and stripping the final token off a
//! string (used to detect half-emitted stop words).

use std::sync::OnceLock;
use tiktoken_rs::{CoreBPE, o200k_base};

use kiln_types::Message;

/// The ellipsis spliced between the head and tail slices of a
/// both-sides truncation.
const ELLIPSIS: &str = "...";

/// The tiktoken encoder is expensive to initialize (loads vocabulary data),
/// so we create it once and reuse it across all `TokenCounter` instances.
static ENCODER: OnceLock<Option<CoreBPE>> = OnceLock::new();

fn get_encoder() -> Option<&'static CoreBPE> {
    ENCODER.get_or_init(|| o200k_base().ok()).as_ref()
}

/// Thread-safe approximate token counter using tiktoken's `o200k_base`
/// encoding.
///
/// Uses a singleton encoder instance. If the encoder fails to initialize,
/// the counter degrades to byte-length estimates and character-based
/// truncation rather than failing.
///
/// # Example
///
/// ```
/// use kiln_context::TokenCounter;
///
/// let counter = TokenCounter::new();
/// let tokens = counter.count_str("Hello, world!");
/// assert!(tokens > 0);
/// ```
#[derive(Clone, Copy)]
pub struct TokenCounter {
    encoder: Option<&'static CoreBPE>,
}

impl std::fmt::Debug for TokenCounter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCounter")
            .field("encoder", &self.encoder.as_ref().map(|_| "<CoreBPE>"))
            .finish()
    }
}

impl TokenCounter {
    #[must_use]
    pub fn new() -> Self {
        let encoder = get_encoder();
        if encoder.is_none() {
            tracing::error!(
                "Failed to initialize tiktoken o200k_base encoder. Falling back to byte-length estimates."
            );
        }

        Self { encoder }
    }

    /// Counts the number of tokens in a string.
    #[must_use]
    pub fn count_str(&self, text: &str) -> u32 {
        let len = match self.encoder {
            Some(encoder) => encoder.encode_ordinary(text).len(),
            None => text.len(),
        };

        u32::try_from(len).unwrap_or(u32::MAX)
    }

    /// Counts tokens for a single message.
    ///
    /// An assistant message carrying a tool call is counted by its
    /// serialized call payload; any other message by its extracted text.
    /// This is the count the budget truncator budgets against, so it must
    /// track what actually changes when a message's content is shrunk.
    #[must_use]
    pub fn count_message(&self, msg: &Message) -> u32 {
        if let Some(call) = msg.tool_call() {
            let serialized = match serde_json::to_string(call) {
                Ok(s) => s,
                Err(_) => call.name.clone(),
            };
            return self.count_str(&serialized);
        }
        self.count_str(msg.text().trim())
    }

    /// Sums the token count of each message.
    #[must_use]
    pub fn count_messages(&self, messages: &[Message]) -> u32 {
        messages.iter().map(|msg| self.count_message(msg)).sum()
    }

    /// Shrinks `text` to at most `max_tokens` tokens.
    ///
    /// With `keep_both_sides`, a head slice and a tail slice of the
    /// original are kept, joined by an `"..."` bridge whose own token cost
    /// is charged against the target; otherwise only the head is kept.
    /// Text that already fits is returned unchanged. A target of zero
    /// yields the empty string.
    #[must_use]
    pub fn truncate_str(&self, text: &str, max_tokens: u32, keep_both_sides: bool) -> String {
        if max_tokens == 0 {
            return String::new();
        }

        let Some(encoder) = self.encoder else {
            return truncate_chars(text, max_tokens as usize, keep_both_sides);
        };

        let tokens = encoder.encode_ordinary(text);
        if tokens.len() <= max_tokens as usize {
            return text.to_string();
        }

        let slice = |budget: usize| {
            if keep_both_sides {
                let ellipsis = encoder.encode_ordinary(ELLIPSIS);
                match budget.checked_sub(ellipsis.len()) {
                    Some(kept_budget) if kept_budget > 0 => {
                        let head = kept_budget / 2;
                        let tail = kept_budget - head;
                        let mut kept = tokens[..head].to_vec();
                        kept.extend_from_slice(&ellipsis);
                        kept.extend_from_slice(&tokens[tokens.len() - tail..]);
                        return kept;
                    }
                    // Too small a target to fit the bridge; keep the head.
                    _ => {}
                }
            }
            tokens[..budget].to_vec()
        };

        // Re-encoding a decoded slice can merge tokens differently at the
        // splice points, so verify the count and shrink until it fits.
        let mut budget = max_tokens as usize;
        loop {
            let Ok(decoded) = encoder.decode(slice(budget)) else {
                // A token slice can end mid-codepoint; fall back to chars.
                return truncate_chars(text, max_tokens as usize, keep_both_sides);
            };
            if budget == 0 || self.count_str(&decoded) <= max_tokens {
                return decoded;
            }
            budget -= 1;
        }
    }

    /// Re-encodes `text` and drops its final token.
    ///
    /// This is the partial-stop-word primitive: the stop word
    /// `"Observation:"` tokenizing to `["Observ", "ation", ":"]` yields
    /// `"Observation"`. Returns `None` when the text encodes to nothing or
    /// the shortened token sequence cannot be decoded.
    #[must_use]
    pub fn strip_last_token(&self, text: &str) -> Option<String> {
        let Some(encoder) = self.encoder else {
            let (idx, _) = text.char_indices().last()?;
            return Some(text[..idx].to_string());
        };

        let tokens = encoder.encode_ordinary(text);
        let (_, head) = tokens.split_last()?;
        encoder.decode(head.to_vec()).ok()
    }
}

impl Default for TokenCounter {
    fn default() -> Self {
        Self::new()
    }
}

/// Character-based fallback with the same head/tail shape as the token
/// path, for when no encoder is available or a token slice fails to decode.
fn truncate_chars(text: &str, max_chars: usize, keep_both_sides: bool) -> String {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= max_chars {
        return text.to_string();
    }

    if keep_both_sides {
        match max_chars.checked_sub(ELLIPSIS.len()) {
            Some(budget) if budget > 0 => {
                let head = budget / 2;
                let tail = budget - head;
                let mut out: String = chars[..head].iter().collect();
                out.push_str(ELLIPSIS);
                out.extend(&chars[chars.len() - tail..]);
                return out;
            }
            _ => {}
        }
    }
    chars[..max_chars].iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_types::ToolCall;

    #[test]
    fn count_str_empty_string() {
        let counter = TokenCounter::new();
        assert_eq!(counter.count_str(""), 0);
    }

    #[test]
    fn count_str_simple_text() {
        let counter = TokenCounter::new();
        assert!(counter.count_str("Hello") >= 1);
        assert!(counter.count_str("Hello, world!") >= 1);
    }

    #[test]
    fn count_str_longer_text_counts_more() {
        let counter = TokenCounter::new();
        let short = counter.count_str("hi");
        let long = counter.count_str("the quick brown fox jumps over the lazy dog");
        assert!(long >= short);
    }

    #[test]
    fn consistent_token_counts() {
        let counter = TokenCounter::new();
        let text = "This is a test sentence for token counting.";
        assert_eq!(counter.count_str(text), counter.count_str(text));
    }

    #[test]
    fn count_message_uses_extracted_text() {
        let counter = TokenCounter::new();
        let msg = kiln_types::Message::user("Hello there");
        assert_eq!(counter.count_message(&msg), counter.count_str("Hello there"));
    }

    #[test]
    fn count_message_tool_call_counts_payload() {
        let counter = TokenCounter::new();
        let call = ToolCall::new(
            "call_1",
            "read_file",
            serde_json::json!({"path": "/some/very/long/path/to/a/file.rs"}),
        );
        let msg = kiln_types::Message::assistant_tool_call("", call);

        let tokens = counter.count_message(&msg);
        assert!(tokens > counter.count_str("read_file"));
    }

    #[test]
    fn truncate_short_text_unchanged() {
        let counter = TokenCounter::new();
        let text = "short";
        assert_eq!(counter.truncate_str(text, 100, false), text);
        assert_eq!(counter.truncate_str(text, 100, true), text);
    }

    #[test]
    fn truncate_head_only_fits_target() {
        let counter = TokenCounter::new();
        let text = "alpha beta gamma delta epsilon zeta eta theta iota kappa";
        let out = counter.truncate_str(text, 4, false);
        assert!(counter.count_str(&out) <= 4);
        assert!(text.starts_with(&out));
    }

    #[test]
    fn truncate_both_sides_keeps_head_and_tail() {
        let counter = TokenCounter::new();
        let words: Vec<String> = (0..200).map(|i| format!("word{i}")).collect();
        let text = words.join(" ");
        let out = counter.truncate_str(&text, 20, true);

        assert!(counter.count_str(&out) <= 20);
        assert!(out.contains("..."));
        assert!(out.starts_with("word0"));
        assert!(out.ends_with("word199"));
    }

    #[test]
    fn truncate_to_zero_is_empty() {
        let counter = TokenCounter::new();
        assert_eq!(counter.truncate_str("anything at all", 0, true), "");
    }

    #[test]
    fn strip_last_token_shortens_text() {
        let counter = TokenCounter::new();
        let stripped = counter.strip_last_token("Observation:").expect("non-empty");
        assert!(stripped.len() < "Observation:".len());
        assert!("Observation:".starts_with(&stripped));
    }

    #[test]
    fn strip_last_token_of_empty_is_none() {
        let counter = TokenCounter::new();
        assert_eq!(counter.strip_last_token(""), None);
    }

    #[test]
    fn truncate_chars_fallback_shapes() {
        assert_eq!(truncate_chars("abcdef", 10, false), "abcdef");
        assert_eq!(truncate_chars("abcdef", 3, false), "abc");
        let both = truncate_chars("abcdefghijklmnop", 9, true);
        assert_eq!(both.len(), 9);
        assert!(both.contains("..."));
    }
}
