//! Gmail REST API client.
//!
//! Implements `MailFetcher` over the Gmail v1 HTTP API using an
//! `AccessTokenProvider` for per-mailbox credentials. All failures map
//! into the `MailError` taxonomy; nothing here is fatal to the pipeline.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::debug;

use crate::registry::Account;

use super::error::{MailError, Result};
use super::parser::{extract_body, MessagePayload};
use super::{AccessTokenProvider, MailFetcher, UnreadMessage};

/// Default connect timeout for HTTP requests (10 seconds).
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Response of `users.messages.list`.
#[derive(Debug, Deserialize)]
struct ListResponse {
    #[serde(default)]
    messages: Vec<MessageRef>,
}

#[derive(Debug, Deserialize)]
struct MessageRef {
    id: String,
}

/// Response of `users.messages.get` with `format=full`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessageDetail {
    id: String,
    /// Epoch milliseconds as a decimal string.
    #[serde(default)]
    internal_date: Option<String>,
    #[serde(default)]
    payload: MessagePayload,
}

/// Gmail API client scoped by an access token provider.
pub struct GmailClient {
    client: Client,
    api_base: String,
    tokens: Arc<dyn AccessTokenProvider>,
}

impl GmailClient {
    /// Creates a Gmail client against the given API base URL.
    pub fn new(
        api_base: String,
        timeout_secs: u64,
        tokens: Arc<dyn AccessTokenProvider>,
    ) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| MailError::Transient(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_base,
            tokens,
        })
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/gmail/v1/users/me/{}",
            self.api_base.trim_end_matches('/'),
            path
        )
    }

    async fn token(&self, account: &Account) -> Result<String> {
        self.tokens.access_token(&account.mailbox).await
    }
}

/// Maps a non-success HTTP status into a `MailError`.
fn map_error_status(status: StatusCode, body: &str, message_id: Option<&str>) -> MailError {
    match (status, message_id) {
        (StatusCode::NOT_FOUND, Some(id)) => MailError::MessageGone(id.to_string()),
        _ => MailError::Transient(format!("Gmail API returned {}: {}", status, body)),
    }
}

fn map_request_error(e: reqwest::Error) -> MailError {
    MailError::Transient(format!("Gmail request failed: {}", e))
}

/// Builds the list query. Mail that predates the account link is
/// excluded at the source with `after:`, matching the pipeline's own
/// received-time filter.
fn unread_query(account: &Account) -> String {
    match account.linked_at_utc() {
        Some(linked) => format!("is:unread after:{}", linked.timestamp()),
        None => "is:unread".to_string(),
    }
}

/// Converts Gmail's `internalDate` (epoch milliseconds as string) into
/// a timestamp, falling back to now for unparseable values.
fn parse_internal_date(internal_date: Option<&str>) -> DateTime<Utc> {
    internal_date
        .and_then(|s| s.parse::<i64>().ok())
        .and_then(DateTime::from_timestamp_millis)
        .unwrap_or_else(Utc::now)
}

#[async_trait]
impl MailFetcher for GmailClient {
    async fn list_unread_ids(&self, account: &Account, max_results: u32) -> Result<Vec<String>> {
        let token = self.token(account).await?;

        let response = self
            .client
            .get(self.url("messages"))
            .query(&[
                ("q", unread_query(account)),
                ("maxResults", max_results.to_string()),
            ])
            .bearer_auth(&token)
            .send()
            .await
            .map_err(map_request_error)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(map_error_status(status, &body, None));
        }

        let list: ListResponse = response
            .json()
            .await
            .map_err(|e| MailError::ParseError(e.to_string()))?;

        // Gmail lists newest-first; the pipeline wants oldest-first.
        // With a backlog larger than `maxResults` the newest page is
        // returned, so older beyond-page mail waits for a later cycle
        // once this page drains (the `after:` bound in the query keeps
        // that backlog finite).
        let mut ids: Vec<String> = list.messages.into_iter().map(|m| m.id).collect();
        ids.reverse();

        debug!(mailbox = %account.mailbox, count = ids.len(), "Listed unread messages");
        Ok(ids)
    }

    async fn fetch_message(&self, account: &Account, message_id: &str) -> Result<UnreadMessage> {
        let token = self.token(account).await?;

        let response = self
            .client
            .get(self.url(&format!("messages/{}", message_id)))
            .query(&[("format", "full")])
            .bearer_auth(&token)
            .send()
            .await
            .map_err(map_request_error)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(map_error_status(status, &body, Some(message_id)));
        }

        let detail: MessageDetail = response
            .json()
            .await
            .map_err(|e| MailError::ParseError(e.to_string()))?;

        let subject = detail
            .payload
            .header("Subject")
            .unwrap_or("No Subject")
            .to_string();
        let sender = detail
            .payload
            .header("From")
            .unwrap_or("Unknown Sender")
            .to_string();
        let body = extract_body(&detail.payload);
        let received_at = parse_internal_date(detail.internal_date.as_deref());

        Ok(UnreadMessage {
            id: detail.id,
            sender,
            subject,
            body,
            received_at,
        })
    }

    async fn mark_read(&self, account: &Account, message_id: &str) -> Result<()> {
        let token = self.token(account).await?;

        let response = self
            .client
            .post(self.url(&format!("messages/{}/modify", message_id)))
            .bearer_auth(&token)
            .json(&serde_json::json!({ "removeLabelIds": ["UNREAD"] }))
            .send()
            .await
            .map_err(map_request_error)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(map_error_status(status, &body, Some(message_id)));
        }

        Ok(())
    }
}
