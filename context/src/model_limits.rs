//! Model token limits and registry.
//!
//! A caller derives the `max_tokens` budget it hands to the truncator from
//! the serving model's context window. [`ModelRegistry`] resolves a model
//! name to [`ModelLimits`] by exact override, then longest-known-prefix
//! match, then an explicit default fallback.

use std::collections::HashMap;

/// Token constraints for one model: its input context window and the output
/// tokens it can generate. The effective input budget accounts for output
/// reservation and a safety margin for counting inaccuracies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelLimits {
    context_window: u32,
    max_output: u32,
}

impl ModelLimits {
    #[must_use]
    pub const fn new(context_window: u32, max_output: u32) -> Self {
        Self {
            context_window,
            max_output,
        }
    }

    /// The maximum number of tokens available for input messages:
    /// `context_window - max_output - 5% safety margin`.
    ///
    /// The margin absorbs tokenizer mismatch between the local counter and
    /// the serving model's own tokenizer.
    #[must_use]
    pub fn effective_input_budget(&self) -> u32 {
        self.effective_input_budget_with_reserved(self.max_output)
    }

    /// Effective input budget with a caller-configured output reservation,
    /// clamped to the model's `max_output`.
    #[must_use]
    pub fn effective_input_budget_with_reserved(&self, reserved_output: u32) -> u32 {
        let reserved = reserved_output.min(self.max_output);
        let available = self.context_window.saturating_sub(reserved);
        let safety_margin = available / 20;
        available.saturating_sub(safety_margin)
    }

    #[must_use]
    pub const fn context_window(&self) -> u32 {
        self.context_window
    }

    #[must_use]
    pub const fn max_output(&self) -> u32 {
        self.max_output
    }
}

/// Where resolved limits came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelLimitsSource {
    /// Exact match from a caller-set override.
    Override,
    /// Matched a known prefix (the matched prefix).
    Prefix(&'static str),
    /// No match; [`ModelRegistry`] fell back to the conservative default.
    DefaultFallback,
}

/// Result of a limits lookup.
///
/// Carrying the source makes the "fallback OR real data" decision explicit
/// at the call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedModelLimits {
    limits: ModelLimits,
    source: ModelLimitsSource,
}

impl ResolvedModelLimits {
    #[must_use]
    pub const fn new(limits: ModelLimits, source: ModelLimitsSource) -> Self {
        Self { limits, source }
    }

    #[must_use]
    pub const fn limits(self) -> ModelLimits {
        self.limits
    }

    #[must_use]
    pub const fn source(self) -> ModelLimitsSource {
        self.source
    }
}

/// Conservative fallback for unknown models.
const DEFAULT_LIMITS: ModelLimits = ModelLimits::new(32_768, 4_096);

/// Known model-name prefixes, most specific first.
const KNOWN_MODELS: &[(&str, ModelLimits)] = &[
    ("qwen-max", ModelLimits::new(131_072, 8_192)),
    ("qwen-plus", ModelLimits::new(131_072, 8_192)),
    ("qwen-turbo", ModelLimits::new(131_072, 8_192)),
    ("qwen", ModelLimits::new(131_072, 8_192)),
    ("gpt-5", ModelLimits::new(400_000, 128_000)),
    ("gpt-4o", ModelLimits::new(128_000, 16_384)),
    ("claude-", ModelLimits::new(200_000, 64_000)),
    ("gemini-", ModelLimits::new(1_048_576, 65_536)),
    ("llama", ModelLimits::new(131_072, 4_096)),
    ("deepseek", ModelLimits::new(131_072, 8_192)),
];

/// Registry of known model limits with caller-supplied overrides.
///
/// The registry is a plain value handed in at construction time, not a
/// process-wide table. Lookup order: exact override, then prefix match over
/// [`KNOWN_MODELS`], then [`DEFAULT_LIMITS`].
#[derive(Debug, Clone, Default)]
pub struct ModelRegistry {
    overrides: HashMap<String, ModelLimits>,
}

impl ModelRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves the limits for `model`.
    #[must_use]
    pub fn resolve(&self, model: &str) -> ResolvedModelLimits {
        if let Some(limits) = self.overrides.get(model) {
            return ResolvedModelLimits::new(*limits, ModelLimitsSource::Override);
        }

        for (prefix, limits) in KNOWN_MODELS {
            if model.starts_with(prefix) {
                return ResolvedModelLimits::new(*limits, ModelLimitsSource::Prefix(prefix));
            }
        }

        ResolvedModelLimits::new(DEFAULT_LIMITS, ModelLimitsSource::DefaultFallback)
    }

    /// The input budget for `model`, the number a caller passes to the
    /// truncator as `max_tokens`.
    #[must_use]
    pub fn input_budget(&self, model: &str) -> u32 {
        self.resolve(model).limits().effective_input_budget()
    }

    /// Sets an exact-name override that takes precedence over prefix
    /// matching.
    pub fn set_override(&mut self, model: impl Into<String>, limits: ModelLimits) {
        self.overrides.insert(model.into(), limits);
    }
}
