//! Post-processing of raw model output: stop-word truncation and
//! reasoning-block stripping.

use kiln_types::{Content, ContentPart, Message};

use crate::TokenCounter;

/// Truncates output messages at stop words and removes a trailing partial
/// stop word.
///
/// Messages are scanned in order. The first text part containing any stop
/// word is cut at the earliest occurrence; every content part after that
/// point in that message and every message after it are dropped. Finally,
/// if the last surviving text part ends with a *partial* stop word - a stop
/// word with its final token removed - that suffix is stripped, so a stop
/// sequence that was being emitted token-by-token never appears half-formed
/// in the output.
///
/// The input is not mutated; a new sequence is returned. An empty message
/// list or an empty stop list passes through unchanged.
#[must_use]
pub fn postprocess_stop_words(
    messages: &[Message],
    stop: &[String],
    counter: &TokenCounter,
) -> Vec<Message> {
    if messages.is_empty() || stop.is_empty() {
        return messages.to_vec();
    }

    let mut out: Vec<Message> = Vec::with_capacity(messages.len());
    for msg in messages {
        let (msg, hit) = truncate_message_at_stop_word(msg, stop);
        out.push(msg);
        if hit {
            break;
        }
    }

    // Partial stop words: each stop word re-tokenized with its final token
    // removed (e.g. "Observation:" -> "Observation").
    let mut partial_stop: Vec<String> = stop
        .iter()
        .filter_map(|s| counter.strip_last_token(s))
        .filter(|p| !p.is_empty())
        .collect();
    partial_stop.sort();
    partial_stop.dedup();

    if let Some(last) = out.last_mut() {
        strip_trailing_partial(last, &partial_stop);
    }

    out
}

/// Cuts one message's content at the earliest stop-word occurrence.
/// Returns the (possibly shortened) message and whether a cut happened.
fn truncate_message_at_stop_word(msg: &Message, stop: &[String]) -> (Message, bool) {
    match msg.content() {
        Content::Text(text) => {
            let (hit, text) = truncate_at_stop_word(text, stop);
            (msg.with_content(text), hit)
        }
        Content::Parts(parts) => {
            let mut kept: Vec<ContentPart> = Vec::with_capacity(parts.len());
            let mut hit = false;
            for part in parts {
                match part.as_text() {
                    Some(text) => {
                        let (part_hit, text) = truncate_at_stop_word(text, stop);
                        kept.push(ContentPart::Text(text));
                        hit = part_hit;
                    }
                    None => kept.push(part.clone()),
                }
                if hit {
                    break;
                }
            }
            (msg.with_content(Content::Parts(kept)), hit)
        }
    }
}

/// Truncates `text` at the earliest occurrence of any stop word.
fn truncate_at_stop_word(text: &str, stop: &[String]) -> (bool, String) {
    let mut truncated = false;
    let mut text = text.to_string();
    for s in stop {
        if s.is_empty() {
            continue;
        }
        if let Some(k) = text.find(s.as_str()) {
            truncated = true;
            text.truncate(k);
        }
    }
    (truncated, text)
}

/// Strips a trailing partial stop word from the last text part of `msg`.
fn strip_trailing_partial(msg: &mut Message, partial_stop: &[String]) {
    let new_content = match msg.content() {
        Content::Text(text) => strip_suffix_of(text, partial_stop).map(Content::Text),
        Content::Parts(parts) => {
            // Only the final text part is eligible.
            let idx = parts
                .iter()
                .rposition(|part| matches!(part, ContentPart::Text(_)));
            idx.and_then(|i| {
                let text = parts[i].as_text().unwrap_or_default();
                strip_suffix_of(text, partial_stop).map(|stripped| {
                    let mut parts = parts.clone();
                    parts[i] = ContentPart::Text(stripped);
                    Content::Parts(parts)
                })
            })
        }
    };
    if let Some(content) = new_content {
        *msg = msg.with_content(content);
    }
}

/// The text with a matching partial-stop suffix removed, or `None` when no
/// partial matches. When several partials match, the lexicographically
/// greatest one wins (they are pre-sorted).
fn strip_suffix_of(text: &str, partial_stop: &[String]) -> Option<String> {
    let mut stripped = None;
    for partial in partial_stop {
        if let Some(head) = text.strip_suffix(partial.as_str()) {
            stripped = Some(head.to_string());
        }
    }
    stripped
}

/// Strips a leading `<think>...</think>` reasoning block from model output.
///
/// Everything up to and including the final `</think>` is removed, along
/// with the newlines that follow it. Text without a closing tag is returned
/// unchanged.
#[must_use]
pub fn strip_reasoning(text: &str) -> &str {
    const CLOSE_TAG: &str = "</think>";
    match text.rfind(CLOSE_TAG) {
        Some(idx) => text[idx + CLOSE_TAG.len()..].trim_start_matches('\n'),
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counter() -> TokenCounter {
        TokenCounter::new()
    }

    fn stops(words: &[&str]) -> Vec<String> {
        words.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn empty_messages_pass_through() {
        let out = postprocess_stop_words(&[], &stops(&["STOP"]), &counter());
        assert!(out.is_empty());
    }

    #[test]
    fn no_stop_words_is_identity() {
        let messages = vec![Message::assistant("anything goes STOP here")];
        let out = postprocess_stop_words(&messages, &[], &counter());
        assert_eq!(out, messages);
    }

    #[test]
    fn truncates_at_first_stop_word() {
        let messages = vec![Message::assistant("abc STOP rest")];
        let out = postprocess_stop_words(&messages, &stops(&["STOP"]), &counter());
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].text(), "abc ");
    }

    #[test]
    fn earliest_of_several_stop_words_wins() {
        let messages = vec![Message::assistant("alpha ONE beta TWO gamma")];
        let out = postprocess_stop_words(&messages, &stops(&["TWO", "ONE"]), &counter());
        assert_eq!(out[0].text(), "alpha ");
    }

    #[test]
    fn drops_messages_after_the_cut() {
        let messages = vec![
            Message::assistant("first part"),
            Message::assistant("second STOP tail"),
            Message::assistant("third, never seen"),
        ];
        let out = postprocess_stop_words(&messages, &stops(&["STOP"]), &counter());
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].text(), "first part");
        assert_eq!(out[1].text(), "second ");
    }

    #[test]
    fn drops_parts_after_the_cut_within_a_message() {
        let content = kiln_types::Content::Parts(vec![
            kiln_types::ContentPart::text("keep me"),
            kiln_types::ContentPart::text("cut STOP here"),
            kiln_types::ContentPart::text("gone"),
        ]);
        let messages = vec![Message::assistant(content)];
        let out = postprocess_stop_words(&messages, &stops(&["STOP"]), &counter());
        match out[0].content() {
            kiln_types::Content::Parts(parts) => {
                assert_eq!(parts.len(), 2);
                assert_eq!(parts[1].as_text(), Some("cut "));
            }
            other => panic!("expected parts, got {other:?}"),
        }
    }

    #[test]
    fn message_with_empty_part_list_passes_through() {
        let messages = vec![
            Message::assistant(kiln_types::Content::Parts(Vec::new())),
            Message::assistant("after STOP"),
        ];
        let out = postprocess_stop_words(&messages, &stops(&["STOP"]), &counter());
        assert_eq!(out.len(), 2);
        assert_eq!(out[1].text(), "after ");
    }

    #[test]
    fn strips_trailing_partial_stop_word() {
        let c = counter();
        let stop = "Observation:";
        let partial = c.strip_last_token(stop).expect("stop word tokenizes");
        assert!(!partial.is_empty(), "o200k splits the trailing colon");

        let messages = vec![Message::assistant(format!("Call tool now {partial}"))];
        let out = postprocess_stop_words(&messages, &stops(&[stop]), &counter());
        assert_eq!(out[0].text(), "Call tool now ");
    }

    #[test]
    fn partial_stripping_applies_after_a_cut() {
        let c = counter();
        let stop = "Observation:";
        let partial = c.strip_last_token(stop).expect("stop word tokenizes");

        let messages = vec![Message::assistant(format!(
            "answer Observation: tail {partial}"
        ))];
        let out = postprocess_stop_words(&messages, &stops(&[stop]), &counter());
        // The cut comes first; the surviving text has no trailing partial.
        assert_eq!(out[0].text(), "answer ");
    }

    #[test]
    fn unrelated_suffix_is_not_stripped() {
        let messages = vec![Message::assistant("final answer: 42")];
        let out = postprocess_stop_words(&messages, &stops(&["Observation:"]), &counter());
        assert_eq!(out[0].text(), "final answer: 42");
    }

    #[test]
    fn strip_reasoning_removes_think_block() {
        let text = "<think>step by step</think>\nThe answer is 4.";
        assert_eq!(strip_reasoning(text), "The answer is 4.");
    }

    #[test]
    fn strip_reasoning_uses_last_close_tag() {
        let text = "<think>a</think>mid<think>b</think>\n\ndone";
        assert_eq!(strip_reasoning(text), "done");
    }

    #[test]
    fn strip_reasoning_without_tag_is_identity() {
        assert_eq!(strip_reasoning("plain text"), "plain text");
    }
}
