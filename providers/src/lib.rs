//! Model service call plumbing for kiln.
//!
//! Backend adapters (out of scope here) expose a model call as a plain
//! fallible closure or as an iterator of partial results. This crate wraps
//! either shape with retry behavior:
//!
//! - [`ServiceError`] - the error a wrapped call raises, with an optional
//!   backend error code.
//! - [`call_with_retry`] - retries a blocking call with exponential
//!   backoff and jitter, re-raising fatal errors immediately.
//! - [`retry_stream`] - the streaming variant: partial results are
//!   forwarded as they arrive and a retryable mid-stream failure restarts
//!   the sequence from scratch.
//!
//! # Error Classification
//!
//! A [`ServiceError`] is **fatal** (never retried) when retrying cannot
//! help: a malformed request (code `"400"`), a content-policy rejection
//! (code `"DataInspectionFailed"` or an "inappropriate content" message),
//! or a request that exceeded the model's maximum context length. Every
//! other service error is transient and retried up to the configured
//! bound, after which a terminal [`RetryError::RetriesExhausted`] is
//! raised.
//!
//! Everything here is synchronous: the backoff sleep blocks the calling
//! thread, attempts are strictly sequential, and cancellation (if any) is
//! the caller's concern.

mod error;
mod retry;

pub use error::ServiceError;
pub use retry::{RetryConfig, RetryError, RetryStream, call_with_retry, is_fatal, retry_stream};
