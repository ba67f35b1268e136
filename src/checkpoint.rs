//! Long-term checkpoint store: a process-owned, opaque-to-the-core record of pre-image bytes
//! captured before a risky staging write, keyed by `(path, name)`.
//!
//! Grounded on the teacher's `database/migrations.rs` for the `rusqlite` connection and
//! schema-versioning idiom (here a single table, so there is exactly one migration), and on
//! `flux_mcp/core/transaction_manager.py`'s `original_states` for what a checkpoint actually
//! needs to hold: just enough bytes to restore a file to a point in time, nothing interpreted.

use std::path::Path;
use std::sync::Mutex;

use rusqlite::{params, Connection};
use tracing::debug;

use crate::error::EngineResult;

const LATEST_SCHEMA_VERSION: i32 = 1;

pub struct CheckpointStore {
    conn: Mutex<Connection>,
}

impl CheckpointStore {
    pub fn open(db_path: &Path) -> EngineResult<Self> {
        let conn = Connection::open(db_path)?;
        let store = Self { conn: Mutex::new(conn) };
        store.run_migrations()?;
        Ok(store)
    }

    /// An in-memory store, useful for tests and for a process that was not given a checkpoint
    /// directory.
    pub fn open_in_memory() -> EngineResult<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn: Mutex::new(conn) };
        store.run_migrations()?;
        Ok(store)
    }

    fn run_migrations(&self) -> EngineResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY
            )",
            [],
        )?;
        let current: i32 = conn
            .query_row(
                "SELECT COALESCE(MAX(version), 0) FROM schema_version",
                [],
                |row| row.get(0),
            )
            .unwrap_or(0);

        if current >= LATEST_SCHEMA_VERSION {
            return Ok(());
        }

        conn.execute(
            "CREATE TABLE IF NOT EXISTS checkpoints (
                path TEXT NOT NULL,
                name TEXT NOT NULL,
                transaction_id TEXT NOT NULL,
                captured_at INTEGER NOT NULL,
                content BLOB NOT NULL,
                PRIMARY KEY (path, name)
            )",
            [],
        )?;
        conn.execute(
            "INSERT INTO schema_version (version) VALUES (?1)",
            params![LATEST_SCHEMA_VERSION],
        )?;
        debug!("checkpoint store schema at version {}", LATEST_SCHEMA_VERSION);
        Ok(())
    }

    /// Capture `content` under `(path, name)`, overwriting any checkpoint already held there.
    /// `captured_at` is a caller-supplied Unix timestamp — the store never reads the clock
    /// itself, so it stays a pure function of its inputs.
    pub fn create_checkpoint(
        &self,
        transaction_id: &str,
        path: &str,
        name: &str,
        content: &[u8],
        captured_at: i64,
    ) -> EngineResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO checkpoints (path, name, transaction_id, captured_at, content)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(path, name) DO UPDATE SET
                transaction_id = excluded.transaction_id,
                captured_at = excluded.captured_at,
                content = excluded.content",
            params![path, name, transaction_id, captured_at, content],
        )?;
        Ok(())
    }

    /// Look up the bytes captured under `(path, name)`, if any.
    pub fn lookup(&self, path: &str, name: &str) -> EngineResult<Option<Vec<u8>>> {
        let conn = self.conn.lock().unwrap();
        let result = conn.query_row(
            "SELECT content FROM checkpoints WHERE path = ?1 AND name = ?2",
            params![path, name],
            |row| row.get::<_, Vec<u8>>(0),
        );
        match result {
            Ok(bytes) => Ok(Some(bytes)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// List every checkpoint name recorded for `path`, most recent first.
    pub fn list_for_path(&self, path: &str) -> EngineResult<Vec<String>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT name FROM checkpoints WHERE path = ?1 ORDER BY captured_at DESC",
        )?;
        let names = stmt
            .query_map(params![path], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checkpoint_round_trips() {
        let store = CheckpointStore::open_in_memory().unwrap();
        store
            .create_checkpoint("tx1", "/a.rs", "before-rename", b"fn old() {}", 1000)
            .unwrap();
        let found = store.lookup("/a.rs", "before-rename").unwrap();
        assert_eq!(found, Some(b"fn old() {}".to_vec()));
    }

    #[test]
    fn missing_checkpoint_is_none() {
        let store = CheckpointStore::open_in_memory().unwrap();
        assert_eq!(store.lookup("/nope.rs", "x").unwrap(), None);
    }

    #[test]
    fn same_name_overwrites_previous_capture() {
        let store = CheckpointStore::open_in_memory().unwrap();
        store.create_checkpoint("tx1", "/a.rs", "cp", b"first", 1).unwrap();
        store.create_checkpoint("tx2", "/a.rs", "cp", b"second", 2).unwrap();
        assert_eq!(store.lookup("/a.rs", "cp").unwrap(), Some(b"second".to_vec()));
    }

    #[test]
    fn list_for_path_orders_most_recent_first() {
        let store = CheckpointStore::open_in_memory().unwrap();
        store.create_checkpoint("tx1", "/a.rs", "one", b"1", 1).unwrap();
        store.create_checkpoint("tx1", "/a.rs", "two", b"2", 2).unwrap();
        assert_eq!(store.list_for_path("/a.rs").unwrap(), vec!["two", "one"]);
    }
}
