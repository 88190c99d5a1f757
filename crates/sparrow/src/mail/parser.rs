//! Gmail message payload parsing and body extraction.
//!
//! Extracts readable text from the recursive MIME payload the Gmail API
//! returns: prefer `text/plain`, fall back to stripped `text/html`,
//! recurse into nested multiparts.

use std::sync::OnceLock;

use base64::engine::general_purpose::{URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine;
use regex::Regex;
use serde::Deserialize;

/// Placeholder body when no readable part is found.
pub const NO_READABLE_CONTENT: &str = "(No readable content found)";

/// One message header as returned by the Gmail API.
#[derive(Debug, Clone, Deserialize)]
pub struct Header {
    pub name: String,
    pub value: String,
}

/// Body of one MIME part. `data` is base64url-encoded.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PartBody {
    #[serde(default)]
    pub data: Option<String>,
}

/// A MIME part of a Gmail message, possibly nested.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePayload {
    #[serde(default)]
    pub mime_type: String,
    #[serde(default)]
    pub headers: Vec<Header>,
    #[serde(default)]
    pub body: PartBody,
    #[serde(default)]
    pub parts: Vec<MessagePayload>,
}

impl MessagePayload {
    /// Returns the value of the named header, if present.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.as_str())
    }
}

/// Extracts the readable body text from a message payload.
pub fn extract_body(payload: &MessagePayload) -> String {
    extract_body_inner(payload).unwrap_or_else(|| NO_READABLE_CONTENT.to_string())
}

fn extract_body_inner(payload: &MessagePayload) -> Option<String> {
    if !payload.parts.is_empty() {
        // 1. Look for text/plain
        for part in &payload.parts {
            if part.mime_type == "text/plain" {
                if let Some(text) = decode_part(&part.body) {
                    if is_usable(&text) {
                        return Some(text);
                    }
                }
            }
        }
        // 2. Look for text/html
        for part in &payload.parts {
            if part.mime_type == "text/html" {
                if let Some(html) = decode_part(&part.body) {
                    return Some(strip_html_tags(&html));
                }
            }
        }
        // 3. Recurse into nested parts
        for part in &payload.parts {
            if !part.parts.is_empty() {
                if let Some(text) = extract_body_inner(part) {
                    if is_usable(&text) {
                        return Some(text);
                    }
                }
            }
        }
        return None;
    }

    // Non-multipart message
    let content = decode_part(&payload.body)?;
    if payload.mime_type == "text/html" {
        return Some(strip_html_tags(&content));
    }
    Some(content)
}

/// Some senders emit a literal "null" text part; treat it as empty.
fn is_usable(text: &str) -> bool {
    let trimmed = text.trim();
    !trimmed.is_empty() && !trimmed.eq_ignore_ascii_case("null")
}

/// Decodes a base64url part body to text. Gmail emits both padded and
/// unpadded encodings.
fn decode_part(body: &PartBody) -> Option<String> {
    let data = body.data.as_deref()?;
    let bytes = URL_SAFE
        .decode(data)
        .or_else(|_| URL_SAFE_NO_PAD.decode(data))
        .ok()?;
    Some(String::from_utf8_lossy(&bytes).into_owned())
}

fn html_tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<[^>]*>").expect("static regex"))
}

/// Strips HTML tags from body text.
pub fn strip_html_tags(text: &str) -> String {
    html_tag_re().replace_all(text, "").into_owned()
}
