//! Account registry — linked Gmail accounts per Telegram chat.
//!
//! Backed by the `accounts` table so links survive restart. Many
//! accounts may map to one chat; no two accounts for the same chat may
//! reference the same mailbox.

use chrono::{DateTime, Utc};
use log::info;
use thiserror::Error;

use crate::db::{account_repo, ledger_repo, Database, DatabaseError};

/// Errors from registry operations.
#[derive(Error, Debug)]
pub enum RegistryError {
    /// The mailbox is already linked to this chat.
    #[error("Mailbox '{mailbox}' is already linked to chat {chat_id}")]
    AlreadyLinked { chat_id: i64, mailbox: String },

    /// No such account for this chat.
    #[error("Mailbox '{mailbox}' is not linked to chat {chat_id}")]
    NotFound { chat_id: i64, mailbox: String },

    /// Underlying storage error.
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

/// One linked mailbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    /// Telegram chat that owns the link.
    pub chat_id: i64,
    /// Gmail address of the mailbox.
    pub mailbox: String,
    /// When enabled, body content is redacted from logs and summaries
    /// are sent with Telegram forward protection.
    pub privacy: bool,
    /// Optional display descriptor shown in account listings.
    pub label: Option<String>,
    /// When the account was linked (RFC 3339).
    pub linked_at: String,
}

impl Account {
    /// The key identifying this account in the dedup ledger.
    pub fn key(&self) -> String {
        ledger_repo::make_account_key(self.chat_id, &self.mailbox)
    }

    /// The link time as a timestamp. Mail received before this moment
    /// is outside the account's summarization window. `None` only if
    /// the stored value is not RFC 3339.
    pub fn linked_at_utc(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.linked_at)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }
}

impl From<account_repo::AccountRow> for Account {
    fn from(row: account_repo::AccountRow) -> Self {
        Self {
            chat_id: row.chat_id,
            mailbox: row.mailbox,
            privacy: row.privacy,
            label: row.label,
            linked_at: row.linked_at,
        }
    }
}

/// Registry of linked accounts.
#[derive(Clone)]
pub struct AccountRegistry {
    db: Database,
}

impl AccountRegistry {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Links a mailbox to a chat. Fails if the pair already exists.
    pub fn add_account(&self, chat_id: i64, mailbox: &str) -> Result<Account, RegistryError> {
        let row = account_repo::AccountRow {
            chat_id,
            mailbox: mailbox.to_string(),
            privacy: false,
            label: None,
            linked_at: Utc::now().to_rfc3339(),
        };

        if !account_repo::insert(&self.db, &row)? {
            return Err(RegistryError::AlreadyLinked {
                chat_id,
                mailbox: mailbox.to_string(),
            });
        }

        info!("Linked mailbox '{}' to chat {}", mailbox, chat_id);
        Ok(row.into())
    }

    /// Lists the accounts linked to a chat, ordered by mailbox.
    pub fn list_accounts(&self, chat_id: i64) -> Result<Vec<Account>, RegistryError> {
        let rows = account_repo::list_by_chat(&self.db, chat_id)?;
        Ok(rows.into_iter().map(Account::from).collect())
    }

    /// Lists every linked account across all chats.
    pub fn all_accounts(&self) -> Result<Vec<Account>, RegistryError> {
        let rows = account_repo::list_all(&self.db)?;
        Ok(rows.into_iter().map(Account::from).collect())
    }

    /// Unlinks a mailbox and clears its ledger markers.
    pub fn remove_account(&self, chat_id: i64, mailbox: &str) -> Result<(), RegistryError> {
        if account_repo::delete(&self.db, chat_id, mailbox)? == 0 {
            return Err(RegistryError::NotFound {
                chat_id,
                mailbox: mailbox.to_string(),
            });
        }

        let key = ledger_repo::make_account_key(chat_id, mailbox);
        let cleared = ledger_repo::delete_by_account(&self.db, &key)?;
        info!(
            "Unlinked mailbox '{}' from chat {} ({} ledger markers cleared)",
            mailbox, chat_id, cleared
        );
        Ok(())
    }

    /// Sets the privacy flag for an account.
    pub fn set_privacy(
        &self,
        chat_id: i64,
        mailbox: &str,
        enabled: bool,
    ) -> Result<(), RegistryError> {
        if account_repo::set_privacy(&self.db, chat_id, mailbox, enabled)? == 0 {
            return Err(RegistryError::NotFound {
                chat_id,
                mailbox: mailbox.to_string(),
            });
        }
        Ok(())
    }

    /// Sets the display label for an account.
    pub fn set_label(
        &self,
        chat_id: i64,
        mailbox: &str,
        label: Option<&str>,
    ) -> Result<(), RegistryError> {
        if account_repo::set_label(&self.db, chat_id, mailbox, label)? == 0 {
            return Err(RegistryError::NotFound {
                chat_id,
                mailbox: mailbox.to_string(),
            });
        }
        Ok(())
    }
}
