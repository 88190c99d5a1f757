//! Linked account repository — CRUD operations for the `accounts` table.

use rusqlite::params;

use super::{Database, DatabaseError};

/// A raw linked account row from the database.
#[derive(Debug, Clone)]
pub struct AccountRow {
    pub chat_id: i64,
    pub mailbox: String,
    pub privacy: bool,
    pub label: Option<String>,
    pub linked_at: String,
}

/// Inserts a linked account. Returns `false` if the (chat, mailbox)
/// pair already exists.
pub fn insert(db: &Database, row: &AccountRow) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO accounts (chat_id, mailbox, privacy, label, linked_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                row.chat_id,
                row.mailbox,
                row.privacy,
                row.label,
                row.linked_at,
            ],
        )?;
        Ok(inserted > 0)
    })
}

/// Finds one account by (chat, mailbox).
pub fn find(
    db: &Database,
    chat_id: i64,
    mailbox: &str,
) -> Result<Option<AccountRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT chat_id, mailbox, privacy, label, linked_at
             FROM accounts WHERE chat_id = ?1 AND mailbox = ?2",
        )?;
        let mut rows = stmt.query_map(params![chat_id, mailbox], row_from_sql)?;
        match rows.next() {
            Some(Ok(row)) => Ok(Some(row)),
            Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
            None => Ok(None),
        }
    })
}

/// Lists all accounts for a chat, ordered by mailbox.
pub fn list_by_chat(db: &Database, chat_id: i64) -> Result<Vec<AccountRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT chat_id, mailbox, privacy, label, linked_at
             FROM accounts WHERE chat_id = ?1 ORDER BY mailbox",
        )?;
        let rows = stmt
            .query_map(params![chat_id], row_from_sql)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Lists all linked accounts across every chat, ordered by chat then mailbox.
pub fn list_all(db: &Database) -> Result<Vec<AccountRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT chat_id, mailbox, privacy, label, linked_at
             FROM accounts ORDER BY chat_id, mailbox",
        )?;
        let rows = stmt
            .query_map([], row_from_sql)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Deletes an account. Returns the number of rows removed.
pub fn delete(db: &Database, chat_id: i64, mailbox: &str) -> Result<u64, DatabaseError> {
    db.with_conn(|conn| {
        let count = conn.execute(
            "DELETE FROM accounts WHERE chat_id = ?1 AND mailbox = ?2",
            params![chat_id, mailbox],
        )?;
        Ok(count as u64)
    })
}

/// Updates the privacy flag. Returns the number of rows changed.
pub fn set_privacy(
    db: &Database,
    chat_id: i64,
    mailbox: &str,
    enabled: bool,
) -> Result<u64, DatabaseError> {
    db.with_conn(|conn| {
        let count = conn.execute(
            "UPDATE accounts SET privacy = ?3 WHERE chat_id = ?1 AND mailbox = ?2",
            params![chat_id, mailbox, enabled],
        )?;
        Ok(count as u64)
    })
}

/// Updates the display label. Returns the number of rows changed.
pub fn set_label(
    db: &Database,
    chat_id: i64,
    mailbox: &str,
    label: Option<&str>,
) -> Result<u64, DatabaseError> {
    db.with_conn(|conn| {
        let count = conn.execute(
            "UPDATE accounts SET label = ?3 WHERE chat_id = ?1 AND mailbox = ?2",
            params![chat_id, mailbox, label],
        )?;
        Ok(count as u64)
    })
}

fn row_from_sql(row: &rusqlite::Row<'_>) -> rusqlite::Result<AccountRow> {
    Ok(AccountRow {
        chat_id: row.get(0)?,
        mailbox: row.get(1)?,
        privacy: row.get(2)?,
        label: row.get(3)?,
        linked_at: row.get(4)?,
    })
}
