//! Dedup ledger — durable record of messages already delivered.
//!
//! A marker (account key, message id) means the summary for that message
//! was confirmed delivered. Markers are written only after delivery
//! succeeds and are never removed by polling, so a message is summarized
//! and delivered at most once per account across restarts.

use log::debug;

use crate::db::error::DatabaseError;
use crate::db::{ledger_repo, Database};
use crate::registry::Account;

/// Per-account dedup statistics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerStats {
    pub processed_count: u64,
    pub last_processed_at: Option<String>,
}

/// Durable exactly-once ledger backed by the `processed_messages` table.
#[derive(Clone)]
pub struct DedupLedger {
    db: Database,
}

impl DedupLedger {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Whether this message was already delivered for this account.
    pub fn is_processed(&self, account: &Account, message_id: &str) -> Result<bool, DatabaseError> {
        ledger_repo::exists(&self.db, &account.key(), message_id)
    }

    /// Records a confirmed delivery. Idempotent: re-marking an already
    /// marked message is a no-op.
    pub fn mark_processed(
        &self,
        account: &Account,
        message_id: &str,
    ) -> Result<(), DatabaseError> {
        let row = ledger_repo::ProcessedMessageRow {
            account_key: account.key(),
            message_id: message_id.to_string(),
            processed_at: chrono::Utc::now().to_rfc3339(),
        };
        if ledger_repo::insert(&self.db, &row)? {
            debug!(
                "Marked message '{}' processed for account '{}'",
                message_id, row.account_key
            );
        }
        Ok(())
    }

    /// Filters `message_ids` down to those without a marker, preserving
    /// input order. One query regardless of batch size.
    pub fn filter_unprocessed(
        &self,
        account: &Account,
        message_ids: &[String],
    ) -> Result<Vec<String>, DatabaseError> {
        if message_ids.is_empty() {
            return Ok(Vec::new());
        }

        let processed = ledger_repo::find_processed(&self.db, &account.key(), message_ids)?;
        Ok(message_ids
            .iter()
            .filter(|id| !processed.contains(*id))
            .cloned()
            .collect())
    }

    /// Returns dedup statistics for one account.
    pub fn stats(&self, account: &Account) -> Result<LedgerStats, DatabaseError> {
        let key = account.key();
        Ok(LedgerStats {
            processed_count: ledger_repo::count_by_account(&self.db, &key)?,
            last_processed_at: ledger_repo::find_last_processed_at(&self.db, &key)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_account() -> Account {
        Account {
            chat_id: 1,
            mailbox: "a@gmail.com".to_string(),
            privacy: false,
            label: None,
            linked_at: "2026-01-01T00:00:00Z".to_string(),
        }
    }

    fn test_ledger() -> DedupLedger {
        DedupLedger::new(Database::open_in_memory().expect("Failed to create test database"))
    }

    #[test]
    fn test_mark_and_check() {
        let ledger = test_ledger();
        let account = test_account();

        assert!(!ledger.is_processed(&account, "m1").unwrap());
        ledger.mark_processed(&account, "m1").unwrap();
        assert!(ledger.is_processed(&account, "m1").unwrap());
    }

    #[test]
    fn test_mark_is_idempotent() {
        let ledger = test_ledger();
        let account = test_account();

        ledger.mark_processed(&account, "m1").unwrap();
        ledger.mark_processed(&account, "m1").unwrap();

        let stats = ledger.stats(&account).unwrap();
        assert_eq!(stats.processed_count, 1);
    }

    #[test]
    fn test_filter_preserves_order() {
        let ledger = test_ledger();
        let account = test_account();

        ledger.mark_processed(&account, "m2").unwrap();

        let ids: Vec<String> = ["m1", "m2", "m3"].iter().map(|s| s.to_string()).collect();
        let unprocessed = ledger.filter_unprocessed(&account, &ids).unwrap();
        assert_eq!(unprocessed, vec!["m1".to_string(), "m3".to_string()]);
    }

    #[test]
    fn test_filter_empty_input() {
        let ledger = test_ledger();
        let account = test_account();
        assert!(ledger.filter_unprocessed(&account, &[]).unwrap().is_empty());
    }

    #[test]
    fn test_accounts_are_isolated() {
        let ledger = test_ledger();
        let a = test_account();
        let b = Account {
            chat_id: 2,
            ..test_account()
        };

        ledger.mark_processed(&a, "m1").unwrap();
        assert!(ledger.is_processed(&a, "m1").unwrap());
        assert!(!ledger.is_processed(&b, "m1").unwrap());
    }

    #[test]
    fn test_stats() {
        let ledger = test_ledger();
        let account = test_account();

        let empty = ledger.stats(&account).unwrap();
        assert_eq!(empty.processed_count, 0);
        assert!(empty.last_processed_at.is_none());

        ledger.mark_processed(&account, "m1").unwrap();
        ledger.mark_processed(&account, "m2").unwrap();

        let stats = ledger.stats(&account).unwrap();
        assert_eq!(stats.processed_count, 2);
        assert!(stats.last_processed_at.is_some());
    }
}
