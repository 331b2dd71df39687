//! Context window management for kiln.
//!
//! This crate fits conversations into a model's context window and cleans
//! up raw model output:
//!
//! - Model-specific context window limits ([`ModelLimits`], [`ModelRegistry`])
//! - Approximate token counting via tiktoken ([`TokenCounter`])
//! - Budget truncation of input conversations ([`truncate_input_messages`])
//! - Stop-word postprocessing of output messages ([`postprocess_stop_words`])
//!
//! # Architecture
//!
//! ```text
//! caller assembles a conversation
//! ├── ModelRegistry resolves the model's input budget
//! ├── truncate_input_messages fits the conversation to it
//! │   └── TokenCounter (tiktoken o200k_base)
//! └── postprocess_stop_words cleans the raw model output
//! ```
//!
//! Everything here is synchronous and value-semantic: inputs are borrowed,
//! outputs are new sequences, nothing is mutated in place.

mod model_limits;
mod postprocess;
mod token_counter;
mod truncation;

pub use model_limits::{ModelLimits, ModelLimitsSource, ModelRegistry, ResolvedModelLimits};
pub use postprocess::{postprocess_stop_words, strip_reasoning};
pub use token_counter::TokenCounter;
pub use truncation::{TruncationError, truncate_input_messages};
