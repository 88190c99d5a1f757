//! Summary cache repository — CRUD operations for the `summary_cache` table.
//!
//! Caches model output keyed by a content fingerprint so that identical
//! email content is never summarized twice.

use rusqlite::params;
use sha2::{Digest, Sha256};

use super::{Database, DatabaseError};

/// Computes the content fingerprint for an email: SHA-256 over
/// `sender|subject|body`.
pub fn make_fingerprint(sender: &str, subject: &str, body: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{}|{}|{}", sender, subject, body).as_bytes());
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

/// Retrieves a cached summary by fingerprint.
pub fn find(db: &Database, fingerprint: &str) -> Result<Option<String>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt =
            conn.prepare("SELECT summary FROM summary_cache WHERE fingerprint = ?1")?;
        let mut rows = stmt.query_map(params![fingerprint], |row| row.get::<_, String>(0))?;
        match rows.next() {
            Some(Ok(val)) => Ok(Some(val)),
            Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
            None => Ok(None),
        }
    })
}

/// Stores a summary, replacing any existing entry for the fingerprint.
pub fn upsert(db: &Database, fingerprint: &str, summary: &str) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT OR REPLACE INTO summary_cache (fingerprint, summary, created_at)
             VALUES (?1, ?2, ?3)",
            params![fingerprint, summary, chrono::Utc::now().to_rfc3339()],
        )?;
        Ok(())
    })
}

/// Deletes entries older than `retention_days`. Returns the number of
/// rows removed.
pub fn prune(db: &Database, retention_days: u32) -> Result<u64, DatabaseError> {
    let cutoff = chrono::Utc::now() - chrono::Duration::days(retention_days as i64);
    db.with_conn(|conn| {
        let count = conn.execute(
            "DELETE FROM summary_cache WHERE created_at < ?1",
            params![cutoff.to_rfc3339()],
        )?;
        Ok(count as u64)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> Database {
        Database::open_in_memory().expect("Failed to create test database")
    }

    #[test]
    fn test_fingerprint_is_stable() {
        let a = make_fingerprint("s@x.com", "Hello", "body");
        let b = make_fingerprint("s@x.com", "Hello", "body");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_fingerprint_differs_on_content() {
        let a = make_fingerprint("s@x.com", "Hello", "body");
        let b = make_fingerprint("s@x.com", "Hello", "other body");
        assert_ne!(a, b);
    }

    #[test]
    fn test_find_and_upsert() {
        let db = test_db();
        let fp = make_fingerprint("s@x.com", "Hello", "body");

        assert_eq!(find(&db, &fp).unwrap(), None);

        upsert(&db, &fp, "summary one").unwrap();
        assert_eq!(find(&db, &fp).unwrap(), Some("summary one".to_string()));

        upsert(&db, &fp, "summary two").unwrap();
        assert_eq!(find(&db, &fp).unwrap(), Some("summary two".to_string()));
    }

    #[test]
    fn test_prune_keeps_recent_entries() {
        let db = test_db();
        upsert(&db, "fp-recent", "summary").unwrap();

        let deleted = prune(&db, 365).unwrap();
        assert_eq!(deleted, 0);
        assert!(find(&db, "fp-recent").unwrap().is_some());
    }

    #[test]
    fn test_prune_removes_old_entries() {
        let db = test_db();
        let old = (chrono::Utc::now() - chrono::Duration::days(400)).to_rfc3339();
        db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO summary_cache (fingerprint, summary, created_at) VALUES ('fp-old', 's', ?1)",
                params![old],
            )?;
            Ok(())
        })
        .unwrap();

        let deleted = prune(&db, 365).unwrap();
        assert_eq!(deleted, 1);
        assert!(find(&db, "fp-old").unwrap().is_none());
    }
}
