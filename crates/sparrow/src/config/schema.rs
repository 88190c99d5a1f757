//! Configuration schema types.

use serde::{Deserialize, Serialize};

/// Top-level service configuration, loaded from JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Config format version. Only "1.0" is supported.
    pub version: String,

    /// Path to the SQLite database. Defaults to `~/.sparrow/data/sparrow.db`.
    #[serde(default)]
    pub database_path: Option<String>,

    /// Seconds between poll cycles for each account.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Upper bound on unread messages fetched per cycle.
    #[serde(default = "default_max_messages")]
    pub max_messages_per_cycle: u32,

    /// Global cap on concurrently in-flight summarization calls.
    #[serde(default = "default_max_concurrent_summaries")]
    pub max_concurrent_summaries: usize,

    #[serde(default)]
    pub backoff: BackoffConfig,

    pub telegram: TelegramConfig,

    #[serde(default)]
    pub summarizer: SummarizerConfig,

    #[serde(default)]
    pub gmail: GmailConfig,
}

fn default_poll_interval() -> u64 {
    60
}

fn default_max_messages() -> u32 {
    10
}

fn default_max_concurrent_summaries() -> usize {
    1
}

/// Per-account backoff applied after failed cycles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackoffConfig {
    /// First backoff delay in seconds. Doubles per consecutive failure.
    #[serde(default = "default_backoff_base")]
    pub base_secs: u64,

    /// Cap on the backoff delay in seconds.
    #[serde(default = "default_backoff_max")]
    pub max_secs: u64,
}

fn default_backoff_base() -> u64 {
    30
}

fn default_backoff_max() -> u64 {
    900
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base_secs: default_backoff_base(),
            max_secs: default_backoff_max(),
        }
    }
}

/// Telegram Bot API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    /// Name of the environment variable holding the bot token.
    pub bot_token_env: String,

    /// Base URL of the Bot API. Override for local servers or testing.
    #[serde(default = "default_telegram_api_base")]
    pub api_base: String,

    /// Request timeout in seconds.
    #[serde(default = "default_http_timeout")]
    pub timeout_secs: u64,
}

fn default_telegram_api_base() -> String {
    "https://api.telegram.org".to_string()
}

fn default_http_timeout() -> u64 {
    30
}

/// Local inference service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummarizerConfig {
    /// Chat endpoint of the local Ollama instance.
    #[serde(default = "default_summarizer_endpoint")]
    pub endpoint: String,

    /// Model name to request.
    #[serde(default = "default_summarizer_model")]
    pub model: String,

    /// Per-request timeout in seconds. A timeout is a transient failure.
    #[serde(default = "default_summarizer_timeout")]
    pub timeout_secs: u64,

    /// Email bodies are truncated to this many characters before
    /// being sent to the model.
    #[serde(default = "default_max_body_chars")]
    pub max_body_chars: usize,

    /// Cached summaries older than this are pruned at startup.
    #[serde(default = "default_cache_retention")]
    pub cache_retention_days: u32,
}

fn default_summarizer_endpoint() -> String {
    "http://localhost:11434/api/chat".to_string()
}

fn default_summarizer_model() -> String {
    "sum".to_string()
}

fn default_summarizer_timeout() -> u64 {
    120
}

fn default_max_body_chars() -> usize {
    3000
}

fn default_cache_retention() -> u32 {
    365
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            endpoint: default_summarizer_endpoint(),
            model: default_summarizer_model(),
            timeout_secs: default_summarizer_timeout(),
            max_body_chars: default_max_body_chars(),
            cache_retention_days: default_cache_retention(),
        }
    }
}

/// Gmail REST API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GmailConfig {
    /// Base URL of the Gmail API. Override for testing.
    #[serde(default = "default_gmail_api_base")]
    pub api_base: String,

    /// Request timeout in seconds.
    #[serde(default = "default_http_timeout")]
    pub timeout_secs: u64,
}

fn default_gmail_api_base() -> String {
    "https://gmail.googleapis.com".to_string()
}

impl Default for GmailConfig {
    fn default() -> Self {
        Self {
            api_base: default_gmail_api_base(),
            timeout_secs: default_http_timeout(),
        }
    }
}
