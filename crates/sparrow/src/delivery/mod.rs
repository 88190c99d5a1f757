//! Summary delivery behind the [`DeliverySink`] trait.

pub mod telegram;

use async_trait::async_trait;
use thiserror::Error;

use crate::summarizer::Summary;

pub use telegram::TelegramSink;

/// Errors from the delivery channel.
#[derive(Error, Debug)]
pub enum DeliveryError {
    /// The request never reached the service or timed out.
    #[error("Delivery network error: {0}")]
    Network(String),

    /// The service rejected the message.
    #[error("Delivery API error: {0}")]
    Api(String),
}

/// Sends a rendered summary to a chat. `Ok(())` means confirmed
/// delivery; only then may a ledger marker be written.
#[async_trait]
pub trait DeliverySink: Send + Sync {
    async fn deliver(
        &self,
        chat_id: i64,
        summary: &Summary,
        protect: bool,
    ) -> Result<(), DeliveryError>;
}
