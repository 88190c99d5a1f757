//! Email summarization behind the [`Summarizer`] trait, with a durable
//! summary cache keyed by message content fingerprint.

pub mod ollama;

use async_trait::async_trait;
use thiserror::Error;

pub use ollama::OllamaClient;

/// Errors from the summarization service.
#[derive(Error, Debug)]
pub enum SummarizerError {
    /// The service could not be reached or answered with an error.
    #[error("Summarizer unavailable: {0}")]
    Unavailable(String),

    /// The request exceeded its deadline.
    #[error("Summarizer timed out after {0} seconds")]
    Timeout(u64),

    /// The service answered but the response could not be used.
    #[error("Bad summarizer response: {0}")]
    BadResponse(String),
}

/// A summary ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Summary {
    /// Provider message id this summary covers.
    pub message_id: String,
    /// Sender of the original message.
    pub sender: String,
    /// Subject of the original message, used as the headline.
    pub headline: String,
    /// The summary text produced by the model.
    pub text: String,
}

impl Summary {
    /// Renders the summary for delivery: headline, blank line, text.
    pub fn rendered(&self) -> String {
        format!("📧 {}\n\n{}", self.headline, self.text)
    }
}

/// Produces a summary of one email.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(
        &self,
        sender: &str,
        subject: &str,
        body: &str,
    ) -> Result<String, SummarizerError>;
}
