//! Input message truncation to fit within a token budget.
//!
//! The entry point is [`truncate_input_messages`]. The strategy prioritizes
//! keeping the system message, the most recent turns, and human-authored
//! content intact: voluminous machine-generated tool output is sacrificed
//! first, whole intermediate exchanges next, and live content is only
//! shrunk as a last resort.

use std::ops::Range;

use thiserror::Error;

use kiln_types::Message;

use crate::TokenCounter;

/// Placeholder left in place of a fully minimized message body.
const OMITTED: &str = "omit";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TruncationError {
    /// The conversation shape is malformed. This is a caller bug, never
    /// repaired silently.
    #[error("invalid conversation shape: {reason}")]
    InvalidInput { reason: &'static str },
    /// The system message alone consumes the entire budget.
    #[error("the system message alone exceeds the input budget ({max_tokens} tokens)")]
    BudgetExceeded { max_tokens: u32 },
}

/// A message plus its running token bookkeeping inside one turn.
#[derive(Debug, Clone)]
struct Budgeted {
    message: Message,
    tokens: i64,
}

impl Budgeted {
    fn new(message: &Message, counter: &TokenCounter) -> Self {
        Self {
            message: message.clone(),
            tokens: i64::from(counter.count_message(message)),
        }
    }
}

/// Truncates `messages` so the total token count fits within `max_tokens`.
///
/// The input is treated as immutable; a new sequence is returned. Surviving
/// messages keep their original relative order, the system message (if any)
/// is always preserved verbatim, and tool calls stay paired with their
/// results.
///
/// Turns are processed oldest-first. A turn that must shrink goes through
/// four cascading strategies, each applied only to the extent needed:
///
/// 1. Minimize tool results (except those in the final step of the final
///    turn).
/// 2. Drop entire middle steps.
/// 3. Truncate tool results in the final step.
/// 4. Truncate user/assistant content.
///
/// A turn whose whole footprint fits inside the remaining exceedance is
/// dropped outright rather than kept partially.
///
/// # Errors
///
/// - [`TruncationError::InvalidInput`] for a conversation with more than
///   one system message, a system message that is not first, or a first
///   non-system message that is not a user message.
/// - [`TruncationError::BudgetExceeded`] when the system message alone
///   leaves no budget for the conversation.
pub fn truncate_input_messages(
    messages: &[Message],
    max_tokens: u32,
    counter: &TokenCounter,
) -> Result<Vec<Message>, TruncationError> {
    let system_count = messages
        .iter()
        .filter(|m| matches!(m, Message::System(_)))
        .count();
    if system_count > 1 {
        return Err(TruncationError::InvalidInput {
            reason: "the conversation must contain no more than one system message",
        });
    }
    if system_count == 1 && !matches!(messages.first(), Some(Message::System(_))) {
        return Err(TruncationError::InvalidInput {
            reason: "the system message must be the first message",
        });
    }

    if messages.is_empty() {
        return Ok(Vec::new());
    }

    // Partition the non-system messages into turns: one user message plus
    // everything up to the next user message.
    let mut system: Option<&Message> = None;
    let mut turns: Vec<Vec<Budgeted>> = Vec::new();
    for msg in messages {
        match msg {
            Message::System(_) => system = Some(msg),
            Message::User(_) => turns.push(vec![Budgeted::new(msg, counter)]),
            Message::Assistant(_) | Message::ToolResult(_) => match turns.last_mut() {
                Some(turn) => turn.push(Budgeted::new(msg, counter)),
                None => {
                    return Err(TruncationError::InvalidInput {
                        reason: "the first non-system message must be a user message",
                    });
                }
            },
        }
    }

    let system_tokens = system.map_or(0, |m| i64::from(counter.count_message(m)));
    let available = i64::from(max_tokens) - system_tokens;
    let total: i64 = turns.iter().flatten().map(|b| b.tokens).sum();
    tracing::info!(total, available, "fitting conversation to token budget");

    if total <= available {
        return Ok(messages.to_vec());
    }
    if available <= 0 {
        return Err(TruncationError::BudgetExceeded { max_tokens });
    }

    let mut result: Vec<Message> = Vec::with_capacity(messages.len());
    if let Some(sys) = system {
        result.push(sys.clone());
    }

    // exceedance < total and available > 0, so the newest turn always
    // retains at least one (possibly shrunken) message.
    let mut exceedance = total - available;
    let turn_count = turns.len();
    for (it, turn) in turns.into_iter().enumerate() {
        if exceedance <= 0 {
            result.extend(turn.into_iter().map(|b| b.message));
            continue;
        }
        let is_last_turn = it + 1 == turn_count;
        tracing::debug!(turn = it, exceedance, "reducing turn");
        result.extend(truncate_turn(turn, &mut exceedance, is_last_turn, counter));
    }

    Ok(result)
}

/// Reduces one turn's footprint by up to `exceedance` tokens, applying the
/// four cascading strategies in order. Returns the surviving messages.
fn truncate_turn(
    mut turn: Vec<Budgeted>,
    exceedance: &mut i64,
    is_last_turn: bool,
    counter: &TokenCounter,
) -> Vec<Message> {
    let turn_total: i64 = turn.iter().map(|b| b.tokens).sum();
    if turn_total <= *exceedance {
        *exceedance -= turn_total;
        return Vec::new();
    }

    if turn.len() == 1 {
        let target = (turn[0].tokens - *exceedance).max(0) as u32;
        let message = shrink_or_omit(&turn[0].message, target, counter);
        *exceedance = 0;
        return vec![message];
    }

    let omit_tokens = i64::from(counter.count_str(OMITTED));
    let steps = split_turn_into_steps(&turn);
    let last_step_start = steps.last().map_or(0, |s| s.start);

    // Stage 1: minimize tool results, oldest-first. Tool results in the
    // final step of the final turn are left for stage 3.
    tracing::debug!(exceedance = *exceedance, "stage 1: minimize tool results");
    for i in 0..turn.len() {
        if *exceedance <= 0 {
            break;
        }
        if !matches!(turn[i].message, Message::ToolResult(_)) {
            continue;
        }
        if is_last_turn && i >= last_step_start {
            continue;
        }
        minimize(&mut turn[i], exceedance, omit_tokens, counter);
    }
    if *exceedance <= 0 {
        return turn.into_iter().map(|b| b.message).collect();
    }

    // Stage 2: drop entire middle steps, oldest-first. The step that
    // closes the gap is dropped along with everything before the cutoff.
    tracing::debug!(exceedance = *exceedance, "stage 2: drop middle steps");
    let mut keep_from = last_step_start;
    for w in 1..steps.len().saturating_sub(1) {
        let step_tokens: i64 = turn[steps[w].clone()].iter().map(|b| b.tokens).sum();
        keep_from = steps[w + 1].start;
        if step_tokens >= *exceedance {
            *exceedance = 0;
            break;
        }
        *exceedance -= step_tokens;
    }

    let first = steps.first().cloned().unwrap_or(0..0);
    if *exceedance <= 0 {
        let mut kept: Vec<Message> =
            turn[first.clone()].iter().map(|b| b.message.clone()).collect();
        kept.extend(
            turn.iter()
                .skip(keep_from)
                .map(|b| b.message.clone()),
        );
        return kept;
    }

    // Past this point only the first and last steps remain in play; the
    // middle steps were consumed above without closing the gap.
    let last = steps.last().cloned().unwrap_or(0..0);

    // Stage 3: truncate tool results in the final step.
    tracing::debug!(
        exceedance = *exceedance,
        "stage 3: truncate final-step tool results"
    );
    for i in last.clone() {
        if *exceedance <= 0 {
            break;
        }
        if !matches!(turn[i].message, Message::ToolResult(_)) {
            continue;
        }
        minimize(&mut turn[i], exceedance, omit_tokens, counter);
    }

    let keep: Vec<usize> = if steps.len() == 1 {
        first.collect()
    } else {
        first.chain(last).collect()
    };
    if *exceedance <= 0 {
        return keep.iter().map(|&i| turn[i].message.clone()).collect();
    }

    // Stage 4: truncate user/assistant content as the last resort.
    tracing::debug!(
        exceedance = *exceedance,
        "stage 4: truncate user/assistant content"
    );
    for &i in &keep {
        let tokens = turn[i].tokens;
        if tokens > *exceedance {
            let target = (tokens - *exceedance) as u32;
            turn[i].message = shrink_or_omit(&turn[i].message, target, counter);
            turn[i].tokens = i64::from(target);
            *exceedance = 0;
            break;
        }
        turn[i].message = turn[i].message.with_content(OMITTED);
        turn[i].tokens = omit_tokens;
        *exceedance -= (tokens - omit_tokens).max(0);
    }

    *exceedance = 0;
    keep.iter().map(|&i| turn[i].message.clone()).collect()
}

/// Shrinks one tool result: either truncate its content to exactly close
/// the remaining gap, or replace the whole body with the `"omit"`
/// placeholder and charge its full footprint against the exceedance.
fn minimize(b: &mut Budgeted, exceedance: &mut i64, omit_tokens: i64, counter: &TokenCounter) {
    let tokens = b.tokens;
    if tokens > *exceedance {
        let target = (tokens - *exceedance) as u32;
        b.message = shrink_or_omit(&b.message, target, counter);
        b.tokens = i64::from(target);
        *exceedance = 0;
    } else {
        b.message = b.message.with_content(OMITTED);
        b.tokens = omit_tokens;
        *exceedance -= (tokens - omit_tokens).max(0);
    }
}

/// Shrinks a message's content to `target_tokens`, keeping both the head
/// and the tail of the text. Content that cannot be truncated (a list part
/// with empty text or a structured payload) is omitted outright instead.
fn shrink_or_omit(message: &Message, target_tokens: u32, counter: &TokenCounter) -> Message {
    match message.content().truncatable_text() {
        Some(text) => message.with_content(counter.truncate_str(&text, target_tokens, true)),
        None => message.with_content(OMITTED),
    }
}

/// Groups a turn's messages into steps: maximal runs of the user block or
/// an assistant block with its tool results.
fn split_turn_into_steps(turn: &[Budgeted]) -> Vec<Range<usize>> {
    let mut steps: Vec<Range<usize>> = Vec::new();
    for (i, b) in turn.iter().enumerate() {
        let prev = steps.last().map(|s| &turn[s.end - 1].message);
        let extends = matches!(
            (&b.message, prev),
            (Message::User(_), Some(Message::User(_)))
                | (Message::Assistant(_), Some(Message::Assistant(_)))
                | (Message::ToolResult(_), Some(_))
        );
        match steps.last_mut() {
            Some(step) if extends => step.end = i + 1,
            _ => steps.push(i..i + 1),
        }
    }
    steps
}
