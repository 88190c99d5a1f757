//! Per-account mail pipeline.
//!
//! One cycle runs list → ledger filter → fetch → summarize → deliver →
//! mark processed → mark read, strictly sequentially and oldest first.
//! The ledger marker is written only after confirmed delivery, so a
//! failure at any earlier step leaves the message eligible for retry on
//! the next cycle. A failed mark-read is logged and left to the ledger
//! to shield against re-delivery.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{info, warn};

use crate::db::error::DatabaseError;
use crate::db::{cache_repo, Database};
use crate::delivery::DeliverySink;
use crate::ledger::DedupLedger;
use crate::mail::{MailError, MailFetcher, UnreadMessage};
use crate::registry::Account;
use crate::summarizer::{Summarizer, Summary};

/// Account-wide cycle failures. These drive scheduler backoff; they
/// never mean an individual message was lost.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Listing unread messages failed, so the whole cycle was skipped.
    #[error("Failed to list unread messages: {0}")]
    List(#[from] MailError),

    /// The ledger or cache could not be read or written.
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

/// Outcome of one completed poll cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Unread ids returned by the mail provider.
    pub listed: usize,
    /// Ids without a ledger marker, i.e. actual work.
    pub new: usize,
    /// Summaries confirmed delivered and marked this cycle.
    pub delivered: usize,
    /// Messages that vanished between list and fetch.
    pub gone: usize,
    /// Messages received before the account was linked, left alone.
    pub pre_link: usize,
    /// Summaries served from the cache instead of the model.
    pub cache_hits: usize,
    /// Why the cycle stopped before exhausting its messages, if it did.
    pub halted: Option<String>,
}

/// The summarize-and-deliver pipeline for linked accounts. Cheap to
/// clone; one instance is shared by all scheduler tasks.
#[derive(Clone)]
pub struct MailPipeline {
    fetcher: Arc<dyn MailFetcher>,
    summarizer: Arc<dyn Summarizer>,
    sink: Arc<dyn DeliverySink>,
    ledger: DedupLedger,
    db: Database,
    /// Global cap on in-flight summarize calls across all accounts.
    summarize_permits: Arc<Semaphore>,
    shutdown: Arc<AtomicBool>,
    max_messages_per_cycle: u32,
}

impl MailPipeline {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        fetcher: Arc<dyn MailFetcher>,
        summarizer: Arc<dyn Summarizer>,
        sink: Arc<dyn DeliverySink>,
        ledger: DedupLedger,
        db: Database,
        max_concurrent_summaries: usize,
        max_messages_per_cycle: u32,
        shutdown: Arc<AtomicBool>,
    ) -> Self {
        Self {
            fetcher,
            summarizer,
            sink,
            ledger,
            db,
            summarize_permits: Arc::new(Semaphore::new(max_concurrent_summaries)),
            shutdown,
            max_messages_per_cycle,
        }
    }

    pub fn shutdown_requested(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    /// Asks in-flight cycles to stop after their current message.
    pub fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    /// Runs one poll cycle for an account.
    pub async fn run_cycle(&self, account: &Account) -> Result<CycleReport, PipelineError> {
        let mut report = CycleReport::default();

        let ids = self
            .fetcher
            .list_unread_ids(account, self.max_messages_per_cycle)
            .await?;
        report.listed = ids.len();

        let unprocessed = self.ledger.filter_unprocessed(account, &ids)?;
        report.new = unprocessed.len();
        if unprocessed.is_empty() {
            return Ok(report);
        }

        // Fetch full messages up front so ordering is by received time,
        // not by whatever order the provider listed them in.
        let mut messages: Vec<UnreadMessage> = Vec::with_capacity(unprocessed.len());
        for id in &unprocessed {
            match self.fetcher.fetch_message(account, id).await {
                Ok(message) => messages.push(message),
                Err(MailError::MessageGone(_)) => {
                    report.gone += 1;
                }
                Err(e) => {
                    // Leave this and later messages for the next cycle
                    // rather than delivering newer mail first.
                    report.halted = Some(format!("fetch of '{}' failed: {}", id, e));
                    break;
                }
            }
        }
        // Only mail received after the link is summarized; the user
        // linked the account to follow new mail, not the backlog.
        if let Some(linked) = account.linked_at_utc() {
            let before = messages.len();
            messages.retain(|m| m.received_at >= linked);
            report.pre_link = before - messages.len();
        }
        messages.sort_by_key(|m| m.received_at);

        if report.halted.is_none() {
            for message in &messages {
                if self.shutdown_requested() {
                    report.halted = Some("shutdown requested".to_string());
                    break;
                }
                if let Some(reason) = self.process_message(account, message, &mut report).await? {
                    report.halted = Some(reason);
                    break;
                }
                report.delivered += 1;
            }
        }

        if report.delivered > 0 || report.halted.is_some() {
            info!(
                account = %account.key(),
                delivered = report.delivered,
                new = report.new,
                gone = report.gone,
                halted = report.halted.as_deref().unwrap_or("no"),
                "Poll cycle finished"
            );
        }
        Ok(report)
    }

    /// Summarizes and delivers one message, writing the ledger marker
    /// only after delivery succeeds. Returns `Some(reason)` when the
    /// cycle must stop to preserve delivery order.
    async fn process_message(
        &self,
        account: &Account,
        message: &UnreadMessage,
        report: &mut CycleReport,
    ) -> Result<Option<String>, PipelineError> {
        let text = match self.summarize_with_cache(account, message, report).await? {
            Ok(text) => text,
            Err(reason) => return Ok(Some(reason)),
        };

        let summary = Summary {
            message_id: message.id.clone(),
            sender: message.sender.clone(),
            headline: message.subject.clone(),
            text,
        };

        if let Err(e) = self
            .sink
            .deliver(account.chat_id, &summary, account.privacy)
            .await
        {
            warn!(
                account = %account.key(),
                message_id = %message.id,
                error = %e,
                "Delivery failed; message stays eligible for retry"
            );
            return Ok(Some(format!("delivery of '{}' failed: {}", message.id, e)));
        }

        // Delivery is confirmed. From here on the message counts as
        // handled no matter what else fails.
        self.ledger.mark_processed(account, &message.id)?;

        if let Err(e) = self.fetcher.mark_read(account, &message.id).await {
            warn!(
                account = %account.key(),
                message_id = %message.id,
                error = %e,
                "Failed to mark message read; ledger prevents re-delivery"
            );
        }

        Ok(None)
    }

    /// Returns the summary text, from the cache when the exact same
    /// content was summarized before. On summarizer failure returns the
    /// halt reason; no marker is written.
    async fn summarize_with_cache(
        &self,
        account: &Account,
        message: &UnreadMessage,
        report: &mut CycleReport,
    ) -> Result<Result<String, String>, PipelineError> {
        let fingerprint =
            cache_repo::make_fingerprint(&message.sender, &message.subject, &message.body);
        if let Some(cached) = cache_repo::find(&self.db, &fingerprint)? {
            report.cache_hits += 1;
            return Ok(Ok(cached));
        }

        let permit = match self.summarize_permits.acquire().await {
            Ok(permit) => permit,
            Err(_) => return Ok(Err("summarizer pool closed".to_string())),
        };
        let result = self
            .summarizer
            .summarize(&message.sender, &message.subject, &message.body)
            .await;
        drop(permit);

        match result {
            Ok(text) => {
                cache_repo::upsert(&self.db, &fingerprint, &text)?;
                Ok(Ok(text))
            }
            Err(e) => {
                if account.privacy {
                    warn!(
                        account = %account.key(),
                        message_id = %message.id,
                        error = %e,
                        "Summarization failed"
                    );
                } else {
                    warn!(
                        account = %account.key(),
                        message_id = %message.id,
                        subject = %message.subject,
                        error = %e,
                        "Summarization failed"
                    );
                }
                Ok(Err(format!(
                    "summarization of '{}' failed: {}",
                    message.id, e
                )))
            }
        }
    }
}
