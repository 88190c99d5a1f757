//! Mail fetch error types.

use thiserror::Error;

/// Errors that can occur while listing, fetching, or marking messages.
#[derive(Error, Debug)]
pub enum MailError {
    /// Transient failure (network, timeout, 5xx). Safe to retry on the
    /// next poll cycle; no marker is written.
    #[error("Transient mail error: {0}")]
    Transient(String),

    /// The message was deleted or moved between list and fetch.
    /// Treated as already handled: skip silently, no marker.
    #[error("Message '{0}' is gone")]
    MessageGone(String),

    /// The token provider could not supply an access token.
    #[error("Access token unavailable for '{mailbox}': {reason}")]
    TokenUnavailable { mailbox: String, reason: String },

    /// The API returned a response we could not parse.
    #[error("Failed to parse mail API response: {0}")]
    ParseError(String),
}

impl MailError {
    /// Whether the pipeline may retry this message on a later cycle.
    pub fn is_transient(&self) -> bool {
        !matches!(self, MailError::MessageGone(_))
    }
}

/// Result type for mail operations.
pub type Result<T> = std::result::Result<T, MailError>;
