//! Mail fetching: unread message listing, full-message retrieval, and
//! read-marker updates, abstracted behind the [`MailFetcher`] trait.

pub mod client;
pub mod error;
pub mod parser;
pub mod token;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::registry::Account;

pub use client::GmailClient;
pub use error::{MailError, Result};
pub use parser::NO_READABLE_CONTENT;
pub use token::EnvTokenProvider;

/// One unread message ready for summarization.
#[derive(Debug, Clone)]
pub struct UnreadMessage {
    /// Provider-assigned message id, stable for the life of the message.
    pub id: String,
    /// Value of the From header.
    pub sender: String,
    /// Value of the Subject header.
    pub subject: String,
    /// Extracted readable body text.
    pub body: String,
    /// When the mailbox received the message.
    pub received_at: DateTime<Utc>,
}

/// Supplies short-lived access tokens for a mailbox.
#[async_trait]
pub trait AccessTokenProvider: Send + Sync {
    async fn access_token(&self, mailbox: &str) -> Result<String>;
}

/// Read-side mail operations for one account's mailbox.
#[async_trait]
pub trait MailFetcher: Send + Sync {
    /// Lists unread message ids, oldest first, up to `max_results`.
    async fn list_unread_ids(&self, account: &Account, max_results: u32) -> Result<Vec<String>>;

    /// Fetches a full message by id.
    async fn fetch_message(&self, account: &Account, message_id: &str) -> Result<UnreadMessage>;

    /// Removes the unread marker from a message. Advisory only: failure
    /// here never rolls back delivery.
    async fn mark_read(&self, account: &Account, message_id: &str) -> Result<()>;
}
