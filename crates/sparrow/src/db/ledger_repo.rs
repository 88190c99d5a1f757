//! Processed message repository — CRUD operations for the
//! `processed_messages` table.

use rusqlite::params;

use super::{Database, DatabaseError};

/// A raw processed message row from the database.
#[derive(Debug, Clone)]
pub struct ProcessedMessageRow {
    pub account_key: String,
    pub message_id: String,
    pub processed_at: String,
}

/// Creates the ledger key for one linked account.
pub fn make_account_key(chat_id: i64, mailbox: &str) -> String {
    format!("{}:{}", chat_id, mailbox)
}

/// Inserts a processed marker. Idempotent: a duplicate insert is a
/// no-op and returns `false`.
pub fn insert(db: &Database, row: &ProcessedMessageRow) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let count = conn.execute(
            "INSERT OR IGNORE INTO processed_messages (account_key, message_id, processed_at)
             VALUES (?1, ?2, ?3)",
            params![row.account_key, row.message_id, row.processed_at],
        )?;
        Ok(count > 0)
    })
}

/// Checks whether a single message has been processed.
pub fn exists(db: &Database, account_key: &str, message_id: &str) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let count: u32 = conn.query_row(
            "SELECT COUNT(*) FROM processed_messages WHERE account_key = ?1 AND message_id = ?2",
            params![account_key, message_id],
            |r| r.get(0),
        )?;
        Ok(count > 0)
    })
}

/// Returns all ids from `message_ids` that have already been processed.
pub fn find_processed(
    db: &Database,
    account_key: &str,
    message_ids: &[String],
) -> Result<Vec<String>, DatabaseError> {
    if message_ids.is_empty() {
        return Ok(Vec::new());
    }

    db.with_conn(|conn| {
        // Build IN clause with positional params.
        let placeholders: Vec<String> = (0..message_ids.len())
            .map(|i| format!("?{}", i + 2))
            .collect();
        let sql = format!(
            "SELECT message_id FROM processed_messages
             WHERE account_key = ?1 AND message_id IN ({})",
            placeholders.join(", ")
        );

        let mut param_values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();
        param_values.push(Box::new(account_key.to_string()));
        for id in message_ids {
            param_values.push(Box::new(id.clone()));
        }

        let params_ref: Vec<&dyn rusqlite::types::ToSql> =
            param_values.iter().map(|p| p.as_ref()).collect();
        let mut stmt = conn.prepare(&sql)?;
        let result: Vec<String> = stmt
            .query_map(params_ref.as_slice(), |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(result)
    })
}

/// Counts total processed messages for an account.
pub fn count_by_account(db: &Database, account_key: &str) -> Result<u64, DatabaseError> {
    db.with_conn(|conn| {
        let count: u64 = conn.query_row(
            "SELECT COUNT(*) FROM processed_messages WHERE account_key = ?1",
            params![account_key],
            |r| r.get(0),
        )?;
        Ok(count)
    })
}

/// Finds the timestamp of the last processed message for an account.
pub fn find_last_processed_at(
    db: &Database,
    account_key: &str,
) -> Result<Option<String>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT processed_at FROM processed_messages WHERE account_key = ?1
             ORDER BY processed_at DESC LIMIT 1",
        )?;
        let mut rows = stmt.query_map(params![account_key], |row| row.get::<_, String>(0))?;
        match rows.next() {
            Some(Ok(val)) => Ok(Some(val)),
            Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
            None => Ok(None),
        }
    })
}

/// Deletes all markers for an account (used on unlink). Returns the
/// number of rows deleted.
pub fn delete_by_account(db: &Database, account_key: &str) -> Result<u64, DatabaseError> {
    db.with_conn(|conn| {
        let count = conn.execute(
            "DELETE FROM processed_messages WHERE account_key = ?1",
            params![account_key],
        )?;
        Ok(count as u64)
    })
}
