//! Retry with exponential backoff for model-service calls.
//!
//! # Retry Policy
//!
//! - Delay starts at the configured initial delay (1 second by default).
//! - Each retry multiplies the delay by the exponential base (2.0), caps
//!   it at the maximum delay (300 seconds), then multiplies by a jitter
//!   factor drawn uniformly from `[1.0, 2.0)`. The jittered value is
//!   carried into the next round.
//! - Fatal errors are re-raised immediately without consuming a retry.
//! - Once the retry budget is spent, a terminal
//!   [`RetryError::RetriesExhausted`] is raised.

use std::thread;
use std::time::Duration;

use thiserror::Error;

use crate::ServiceError;

/// Message fragment marking a content-policy rejection.
const INAPPROPRIATE_CONTENT: &str = "inappropriate content";
/// Message fragment marking a context-window overflow.
const CONTEXT_OVERFLOW: &str = "maximum context length";

/// Retry configuration.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retries (not counting the initial attempt).
    /// Zero disables retrying entirely: the first error of any class is
    /// re-raised.
    pub max_retries: u32,
    /// Backoff delay before the first retry.
    pub initial_delay: Duration,
    /// Ceiling applied to the delay before jitter.
    pub max_delay: Duration,
    /// Growth factor applied to the delay on each retry.
    pub exponential_base: f64,
    /// Whether to apply the uniform `[1.0, 2.0)` jitter factor. Disabled
    /// only in tests that need deterministic timing.
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 10,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(300),
            exponential_base: 2.0,
            jitter: true,
        }
    }
}

/// Terminal outcome of a retried call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RetryError {
    /// A fatal service error, re-raised without retrying.
    #[error(transparent)]
    Service(#[from] ServiceError),
    /// The retry budget is spent; the last error was still transient.
    #[error("maximum number of retries ({max_retries}) exceeded")]
    RetriesExhausted { max_retries: u32 },
}

/// Whether a service error must never be retried.
///
/// Bad requests and content-policy rejections cannot succeed on a second
/// attempt, and neither can a request that already exceeded the model's
/// context length.
#[must_use]
pub fn is_fatal(error: &ServiceError) -> bool {
    if matches!(error.code.as_deref(), Some("400" | "DataInspectionFailed")) {
        return true;
    }
    error.message.contains(INAPPROPRIATE_CONTENT) || error.message.contains(CONTEXT_OVERFLOW)
}

/// Calls `f`, retrying transient service errors with exponential backoff.
///
/// Attempts are strictly sequential; the backoff sleep blocks the calling
/// thread. Fatal errors short-circuit after a single invocation.
pub fn call_with_retry<T, F>(mut f: F, config: &RetryConfig) -> Result<T, RetryError>
where
    F: FnMut() -> Result<T, ServiceError>,
{
    let mut state = BackoffState::new(config);
    loop {
        match f() {
            Ok(value) => return Ok(value),
            Err(error) => state.raise_or_delay(error)?,
        }
    }
}

/// Wraps an iterator-producing call with the same retry behavior as
/// [`call_with_retry`].
///
/// Partial results are forwarded to the caller as they arrive. A retryable
/// error restarts the inner iterator from scratch after the backoff sleep -
/// there is no partial-result resumption, so already-forwarded items may be
/// produced again by the restarted sequence. A fatal or terminal error is
/// yielded once, after which the stream is fused.
pub fn retry_stream<T, I, F>(make_iter: F, config: &RetryConfig) -> RetryStream<F, I>
where
    F: FnMut() -> I,
    I: Iterator<Item = Result<T, ServiceError>>,
{
    RetryStream {
        make_iter,
        current: None,
        state: BackoffState::new(config),
        done: false,
    }
}

/// Streaming counterpart of [`call_with_retry`]; see [`retry_stream`].
#[derive(Debug)]
pub struct RetryStream<F, I> {
    make_iter: F,
    current: Option<I>,
    state: BackoffState,
    done: bool,
}

impl<T, I, F> Iterator for RetryStream<F, I>
where
    F: FnMut() -> I,
    I: Iterator<Item = Result<T, ServiceError>>,
{
    type Item = Result<T, RetryError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        loop {
            if self.current.is_none() {
                self.current = Some((self.make_iter)());
            }
            match self.current.as_mut().and_then(Iterator::next) {
                Some(Ok(value)) => return Some(Ok(value)),
                Some(Err(error)) => {
                    self.current = None;
                    if let Err(terminal) = self.state.raise_or_delay(error) {
                        self.done = true;
                        return Some(Err(terminal));
                    }
                }
                None => {
                    self.done = true;
                    return None;
                }
            }
        }
    }
}

/// Retry bookkeeping shared by the blocking and streaming wrappers.
#[derive(Debug)]
struct BackoffState {
    config: RetryConfig,
    num_retries: u32,
    delay_secs: f64,
}

impl BackoffState {
    fn new(config: &RetryConfig) -> Self {
        Self {
            config: config.clone(),
            num_retries: 0,
            delay_secs: config.initial_delay.as_secs_f64(),
        }
    }

    /// Re-raises fatal errors, converts an exhausted budget into a
    /// terminal error, and otherwise sleeps for the next backoff delay.
    fn raise_or_delay(&mut self, error: ServiceError) -> Result<(), RetryError> {
        if self.config.max_retries == 0 {
            return Err(RetryError::Service(error));
        }
        if is_fatal(&error) {
            return Err(RetryError::Service(error));
        }

        tracing::warn!("service error: {error}");

        if self.num_retries >= self.config.max_retries {
            return Err(RetryError::RetriesExhausted {
                max_retries: self.config.max_retries,
            });
        }

        let jitter = if self.config.jitter {
            1.0 + rand::random::<f64>()
        } else {
            1.0
        };
        self.delay_secs = (self.delay_secs * self.config.exponential_base)
            .min(self.config.max_delay.as_secs_f64())
            * jitter;
        self.num_retries += 1;
        tracing::debug!(
            retry = self.num_retries,
            delay_secs = self.delay_secs,
            "backing off before retry"
        );
        thread::sleep(Duration::from_secs_f64(self.delay_secs));
        Ok(())
    }
}
