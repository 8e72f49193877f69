//! Clip store schema: the `clips` row table, its FTS5 index and the
//! triggers that keep the index in step with the rows.

use crate::{Error, Result};
use rusqlite::Connection;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS clips (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    captured_at INTEGER NOT NULL,
    hash TEXT NOT NULL UNIQUE,
    mime TEXT NOT NULL,
    text TEXT,
    metadata TEXT,
    url TEXT,
    blob_hash TEXT,
    blob_path TEXT,
    CHECK ((text IS NULL) <> (blob_hash IS NULL))
);

CREATE INDEX IF NOT EXISTS idx_clips_blob_path ON clips(blob_path);

CREATE VIRTUAL TABLE IF NOT EXISTS clip_index USING fts5(
    text,
    url,
    metadata,
    content = 'clips',
    content_rowid = 'id'
);

CREATE TRIGGER IF NOT EXISTS clips_after_insert AFTER INSERT ON clips BEGIN
    INSERT INTO clip_index (rowid, text, url, metadata)
    VALUES (new.id, new.text, new.url, new.metadata);
END;

CREATE TRIGGER IF NOT EXISTS clips_after_delete AFTER DELETE ON clips BEGIN
    INSERT INTO clip_index (clip_index, rowid, text, url, metadata)
    VALUES ('delete', old.id, old.text, old.url, old.metadata);
END;

CREATE TRIGGER IF NOT EXISTS clips_after_update AFTER UPDATE ON clips BEGIN
    INSERT INTO clip_index (clip_index, rowid, text, url, metadata)
    VALUES ('delete', old.id, old.text, old.url, old.metadata);
    INSERT INTO clip_index (rowid, text, url, metadata)
    VALUES (new.id, new.text, new.url, new.metadata);
END;
";

/// Creates tables, indexes and triggers if they do not exist.
///
/// # Errors
///
/// Returns [`Error::Storage`] if any statement fails (for example when the
/// bundled `SQLite` lacks FTS5).
pub fn initialize(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)
        .map_err(|e| Error::storage("initialize_schema", e))
}

/// Rebuilds the full-text index from the `clips` table.
///
/// # Errors
///
/// Returns [`Error::Storage`] if the rebuild command fails.
pub fn rebuild_index(conn: &Connection) -> Result<()> {
    conn.execute("INSERT INTO clip_index (clip_index) VALUES ('rebuild')", [])
        .map(|_| ())
        .map_err(|e| Error::storage("rebuild_index", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();
        conn
    }

    fn matches(conn: &Connection, query: &str) -> i64 {
        conn.query_row(
            "SELECT COUNT(*) FROM clip_index WHERE clip_index MATCH ?1",
            [query],
            |row| row.get(0),
        )
        .unwrap()
    }

    #[test]
    fn test_initialize_is_idempotent() {
        let conn = conn();
        initialize(&conn).unwrap();
    }

    #[test]
    fn test_triggers_track_insert_and_delete() {
        let conn = conn();
        conn.execute(
            "INSERT INTO clips (captured_at, hash, mime, text) VALUES (0, 'a', 'text/plain', 'kestrel')",
            [],
        )
        .unwrap();
        assert_eq!(matches(&conn, "kestrel"), 1);

        conn.execute("DELETE FROM clips", []).unwrap();
        assert_eq!(matches(&conn, "kestrel"), 0);
    }

    #[test]
    fn test_exactly_one_payload_enforced() {
        let conn = conn();
        let both = conn.execute(
            "INSERT INTO clips (captured_at, hash, mime, text, blob_hash, blob_path)
             VALUES (0, 'b', 'image/png', 'x', 'ff', '/tmp/ff')",
            [],
        );
        assert!(both.is_err());
        let neither = conn.execute(
            "INSERT INTO clips (captured_at, hash, mime) VALUES (0, 'c', 'image/png')",
            [],
        );
        assert!(neither.is_err());
    }

    #[test]
    fn test_rebuild_index() {
        let conn = conn();
        conn.execute(
            "INSERT INTO clips (captured_at, hash, mime, text, url)
             VALUES (0, 'd', 'text/plain', 'body', 'https://example.org/heron')",
            [],
        )
        .unwrap();
        rebuild_index(&conn).unwrap();
        assert_eq!(matches(&conn, "url:heron"), 1);
    }
}
