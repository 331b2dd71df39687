//! The error raised by a wrapped model service call.

/// An error returned by the remote model service.
///
/// `code` is the backend's error code when one was provided (HTTP-ish
/// status strings and vendor codes both occur in the wild); `message` is
/// the human-readable description. Classification into fatal vs. retryable
/// lives in [`crate::is_fatal`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceError {
    pub code: Option<String>,
    pub message: String,
}

impl ServiceError {
    #[must_use]
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            message: message.into(),
        }
    }

    /// An error with no backend code (transport failures, unexpected
    /// payloads).
    #[must_use]
    pub fn from_message(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.code {
            Some(code) => write!(f, "Error code: {code}. Error message: {}", self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for ServiceError {}
