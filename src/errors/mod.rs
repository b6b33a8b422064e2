use thiserror::Error;

use crate::model::OutgoingContent;

/// Typed error hierarchy for cloudinbox.
///
/// Use at module boundaries (API calls, send results, config validation).
/// Internal/leaf functions can keep using `anyhow::Result`; the `Internal`
/// variant converts via the `?` operator.
#[derive(Debug, Error)]
pub enum InboxError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {message}")]
    Network { message: String, retryable: bool },

    #[error("Rejected by backend: {message}")]
    Validation {
        message: String,
        code: Option<String>,
        details: Option<serde_json::Value>,
    },

    #[error("Rate limit exceeded")]
    RateLimit { retry_after: Option<u64> },

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Conversation {actual} is no longer active (active: {expected})")]
    StaleConversation { expected: String, actual: String },

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Convenience alias for results using `InboxError`.
pub type InboxResult<T> = std::result::Result<T, InboxError>;

impl InboxError {
    /// Whether this error is transient and the operation may succeed later.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network { retryable, .. } => *retryable,
            Self::RateLimit { .. } => true,
            Self::Validation { .. }
            | Self::Auth(_)
            | Self::Config(_)
            | Self::StaleConversation { .. }
            | Self::Internal(_) => false,
        }
    }

    /// Whether the backend rejected the content itself (bad template parameters,
    /// unsupported media, closed window) rather than failing to deliver it.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
            retryable: true,
        }
    }
}

/// A send that did not go through. The optimistic entry has been removed and
/// `draft` is what was handed back to the compose area.
#[derive(Debug, Error)]
#[error("message could not be sent: {error}")]
pub struct SendFailure {
    /// Absent when the send was rejected before anything was placed.
    pub client_temp_id: Option<String>,
    pub draft: OutgoingContent,
    #[source]
    pub error: InboxError,
}

impl From<SendFailure> for InboxError {
    fn from(failure: SendFailure) -> Self {
        failure.error
    }
}

impl From<reqwest::Error> for InboxError {
    fn from(err: reqwest::Error) -> Self {
        // Decode failures mean the backend answered with something we cannot
        // read; retrying will not change that.
        let retryable = !err.is_decode();
        Self::Network {
            message: err.to_string(),
            retryable,
        }
    }
}
