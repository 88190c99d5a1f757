//! Access tokens from the process environment.
//!
//! OAuth consent and refresh live outside this service; an external
//! helper keeps a fresh access token in an environment variable per
//! mailbox and this provider reads it on demand.

use async_trait::async_trait;

use super::error::{MailError, Result};
use super::AccessTokenProvider;

/// Reads access tokens from `{prefix}_{MAILBOX}` environment variables,
/// where the mailbox is uppercased with `@` and `.` mapped to `_`
/// (e.g. `GMAIL_ACCESS_TOKEN_ALICE_GMAIL_COM`).
pub struct EnvTokenProvider {
    prefix: String,
}

impl EnvTokenProvider {
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
        }
    }

    fn var_name(&self, mailbox: &str) -> String {
        let suffix: String = mailbox
            .to_ascii_uppercase()
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        format!("{}_{}", self.prefix, suffix)
    }
}

impl Default for EnvTokenProvider {
    fn default() -> Self {
        Self::new("GMAIL_ACCESS_TOKEN")
    }
}

#[async_trait]
impl AccessTokenProvider for EnvTokenProvider {
    async fn access_token(&self, mailbox: &str) -> Result<String> {
        let var = self.var_name(mailbox);
        match std::env::var(&var) {
            Ok(token) if !token.trim().is_empty() => Ok(token),
            _ => Err(MailError::TokenUnavailable {
                mailbox: mailbox.to_string(),
                reason: format!("Environment variable '{}' is not set", var),
            }),
        }
    }
}
