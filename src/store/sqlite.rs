use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};
use std::fs;
use std::path::Path;

use crate::error::StorageError;
use crate::store::repo::SeenLedger;

/// Seen-item ledger in a single SQLite file. Assumes one writer at a time.
pub struct SqliteLedger {
    conn: Connection,
}

impl SqliteLedger {
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| StorageError::io(parent, e))?;
        }
        let conn = Connection::open(path)?;
        let ledger = Self { conn };
        ledger.migrate()?;
        Ok(ledger)
    }

    fn migrate(&self) -> Result<(), StorageError> {
        self.conn.execute_batch(
            r#"
            PRAGMA journal_mode=WAL;
            PRAGMA synchronous=FULL;

            CREATE TABLE IF NOT EXISTS seen (
                id          TEXT PRIMARY KEY,
                text        TEXT NOT NULL,
                seen_epoch  INTEGER NOT NULL
            );
            "#,
        )?;
        Ok(())
    }
}

impl SeenLedger for SqliteLedger {
    fn has(&self, id: &str) -> Result<bool, StorageError> {
        let found = self
            .conn
            .query_row(r#"SELECT 1 FROM seen WHERE id=?1"#, params![id], |_| Ok(()))
            .optional()?;
        Ok(found.is_some())
    }

    fn put(&self, id: &str, text: &str) -> Result<(), StorageError> {
        // First write wins; an existing record is never rewritten.
        self.conn.execute(
            r#"
            INSERT INTO seen (id, text, seen_epoch) VALUES (?1, ?2, ?3)
            ON CONFLICT(id) DO NOTHING
            "#,
            params![id, text, Utc::now().timestamp()],
        )?;
        Ok(())
    }

    fn entries(&self) -> Result<Vec<(String, String)>, StorageError> {
        let mut stmt = self
            .conn
            .prepare(r#"SELECT id, text FROM seen ORDER BY id"#)?;
        let mut rows = stmt.query([])?;
        let mut out = Vec::new();
        while let Some(r) = rows.next()? {
            out.push((r.get(0)?, r.get(1)?));
        }
        Ok(out)
    }
}
