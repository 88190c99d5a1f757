//! Ollama-backed summarizer using the `/api/chat` endpoint.

use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{Summarizer, SummarizerError};

const SYSTEM_PROMPT: &str = "You summarize emails. Reply with a short plain-text \
summary of the email, two to four sentences, no preamble and no markdown.";

#[derive(Debug, Serialize)]
struct OllamaChatRequest {
    model: String,
    messages: Vec<OllamaMessage>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct OllamaMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    message: OllamaResponseMessage,
}

#[derive(Debug, Deserialize)]
struct OllamaResponseMessage {
    #[serde(default)]
    content: String,
}

/// Client for a local Ollama instance.
pub struct OllamaClient {
    client: Client,
    endpoint: String,
    model: String,
    timeout_secs: u64,
    max_body_chars: usize,
}

impl OllamaClient {
    pub fn new(
        endpoint: String,
        model: String,
        timeout_secs: u64,
        max_body_chars: usize,
    ) -> Result<Self, SummarizerError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| {
                SummarizerError::Unavailable(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            client,
            endpoint,
            model,
            timeout_secs,
            max_body_chars,
        })
    }

    fn build_prompt(&self, sender: &str, subject: &str, body: &str) -> String {
        let truncated = truncate_chars(body, self.max_body_chars);
        format!(
            "EMAIL TO SUMMARIZE:\n\nFrom: {}\nSubject: {}\n\n{}",
            sender, subject, truncated
        )
    }
}

/// Truncates to at most `max` characters on a char boundary.
fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

fn think_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<think>.*?</think>").expect("static regex"))
}

/// Removes reasoning blocks some models emit before the answer.
fn strip_think_blocks(text: &str) -> String {
    think_re().replace_all(text, "").trim().to_string()
}

#[async_trait]
impl Summarizer for OllamaClient {
    async fn summarize(
        &self,
        sender: &str,
        subject: &str,
        body: &str,
    ) -> Result<String, SummarizerError> {
        let request = OllamaChatRequest {
            model: self.model.clone(),
            messages: vec![
                OllamaMessage {
                    role: "system".to_string(),
                    content: SYSTEM_PROMPT.to_string(),
                },
                OllamaMessage {
                    role: "user".to_string(),
                    content: self.build_prompt(sender, subject, body),
                },
            ],
            stream: false,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SummarizerError::Timeout(self.timeout_secs)
                } else {
                    SummarizerError::Unavailable(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SummarizerError::Unavailable(format!(
                "Ollama returned {}: {}",
                status, body
            )));
        }

        let parsed: OllamaChatResponse = response
            .json()
            .await
            .map_err(|e| SummarizerError::BadResponse(e.to_string()))?;

        let text = strip_think_blocks(&parsed.message.content);
        if text.is_empty() {
            return Err(SummarizerError::BadResponse(
                "Model returned an empty summary".to_string(),
            ));
        }

        debug!(model = %self.model, chars = text.len(), "Received summary");
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_client() -> OllamaClient {
        OllamaClient::new(
            "http://localhost:11434/api/chat".to_string(),
            "sum".to_string(),
            120,
            3000,
        )
        .unwrap()
    }

    #[test]
    fn test_prompt_includes_headers_and_body() {
        let client = test_client();
        let prompt = client.build_prompt("a@x.com", "Hello", "body text");
        assert!(prompt.starts_with("EMAIL TO SUMMARIZE:"));
        assert!(prompt.contains("From: a@x.com"));
        assert!(prompt.contains("Subject: Hello"));
        assert!(prompt.ends_with("body text"));
    }

    #[test]
    fn test_prompt_truncates_body() {
        let client = OllamaClient::new(
            "http://localhost:11434/api/chat".to_string(),
            "sum".to_string(),
            120,
            10,
        )
        .unwrap();
        let prompt = client.build_prompt("a@x.com", "S", &"x".repeat(100));
        assert!(prompt.ends_with(&"x".repeat(10)));
        assert!(!prompt.ends_with(&"x".repeat(11)));
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("hi", 10), "hi");
    }

    #[test]
    fn test_strip_think_blocks() {
        let raw = "<think>\nlet me reason about this\n</think>\n\nThe actual summary.";
        assert_eq!(strip_think_blocks(raw), "The actual summary.");
    }

    #[test]
    fn test_strip_think_blocks_no_block() {
        assert_eq!(strip_think_blocks("  plain summary  "), "plain summary");
    }

    #[test]
    fn test_response_parses() {
        let json = r#"{"model": "sum", "message": {"role": "assistant", "content": "A summary."}, "done": true}"#;
        let parsed: OllamaChatResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.message.content, "A summary.");
    }
}
