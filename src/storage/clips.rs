//! The clip store: deduplicated rows in `SQLite` plus blob files on disk.

use super::blob::BlobStore;
use super::sqlite::{
    CLIP_COLUMNS, ClipRow, acquire_lock, collect_clips, configure_connection,
    fetch_clip_by_hash, fetch_clip_by_id, in_transaction, initialize, placeholders,
    rebuild_index, timed,
};
use crate::config::{BLOB_DIR, DB_FILE, StashConfig};
use crate::models::{Clip, ClipBody, ClipId, NewClip};
use crate::{Error, Result};
use rusqlite::{Connection, params, params_from_iter};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;
use tracing::instrument;

const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_millis(5000);

/// Outcome of [`ClipStore::insert`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inserted {
    /// The stored clip; the pre-existing row for duplicates.
    pub clip: Clip,
    /// False when an identical clip was already stored.
    pub created: bool,
}

/// A blob file that could not be removed during [`ClipStore::delete`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobFailure {
    /// The blob file.
    pub path: PathBuf,
    /// Why removal failed.
    pub cause: String,
}

/// Outcome of [`ClipStore::delete`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeleteReport {
    /// Number of rows removed.
    pub removed: usize,
    /// Blob files that could not be removed. Row deletion is unaffected.
    pub blob_failures: Vec<BlobFailure>,
}

impl DeleteReport {
    /// True if every referenced blob was removed.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.blob_failures.is_empty()
    }
}

/// Persistent clip history.
///
/// Construct once per process and pass by reference to every consumer.
/// Writers tolerate other processes holding the database lock for up to the
/// configured busy timeout.
pub struct ClipStore {
    conn: Mutex<Connection>,
    blobs: BlobStore,
    root: PathBuf,
    busy_timeout: Duration,
}

impl ClipStore {
    /// Opens (creating if needed) the store under `root`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if the directory, database or schema
    /// cannot be created.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        Self::open_with_timeout(root, DEFAULT_BUSY_TIMEOUT)
    }

    /// Opens the store described by `config`.
    ///
    /// # Errors
    ///
    /// See [`ClipStore::open`].
    pub fn from_config(config: &StashConfig) -> Result<Self> {
        Self::open_at(
            config.database.clone(),
            &config.db_path(),
            config.blob_dir(),
            Duration::from_millis(config.busy_timeout_ms),
        )
    }

    /// Opens the store with an explicit lock-wait budget.
    ///
    /// # Errors
    ///
    /// See [`ClipStore::open`].
    pub fn open_with_timeout(root: impl Into<PathBuf>, busy_timeout: Duration) -> Result<Self> {
        let root = root.into();
        let db_path = root.join(DB_FILE);
        let blob_dir = root.join(BLOB_DIR);
        Self::open_at(root, &db_path, blob_dir, busy_timeout)
    }

    fn open_at(
        root: PathBuf,
        db_path: &Path,
        blob_dir: PathBuf,
        busy_timeout: Duration,
    ) -> Result<Self> {
        std::fs::create_dir_all(&root).map_err(|e| {
            Error::storage("create_storage_root", format!("{}: {e}", root.display()))
        })?;

        let conn = Connection::open(db_path).map_err(|e| Error::storage("open_sqlite", e))?;
        configure_connection(&conn, busy_timeout)?;
        in_transaction(&conn, busy_timeout, initialize)?;

        tracing::debug!(db = %db_path.display(), blobs = %blob_dir.display(), "clip store opened");
        Ok(Self {
            conn: Mutex::new(conn),
            blobs: BlobStore::new(blob_dir),
            root,
            busy_timeout,
        })
    }

    /// The storage root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The blob store.
    #[must_use]
    pub const fn blobs(&self) -> &BlobStore {
        &self.blobs
    }

    /// Runs `f` with the locked connection.
    pub(super) fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let conn = acquire_lock(&self.conn);
        f(&conn)
    }

    /// Runs `f` in a write transaction.
    pub(super) fn write<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let conn = acquire_lock(&self.conn);
        in_transaction(&conn, self.busy_timeout, f)
    }

    /// Persists a clip unless an identical one exists.
    ///
    /// The content hash is recomputed here. Binary payloads are written to the
    /// blob store first; an existing row with the same hash is returned
    /// unchanged, without touching the blob store.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if the row or blob cannot be written.
    #[instrument(skip(self, clip), fields(operation = "insert", backend = "sqlite", mime = %clip.mime))]
    pub fn insert(&self, clip: &NewClip) -> Result<Inserted> {
        timed("insert", || {
            let hash = clip.content_hash();
            self.write(|conn| {
                if let Some(existing) = fetch_clip_by_hash(conn, hash)? {
                    tracing::debug!(clip.id = %existing.id, %hash, "duplicate clip");
                    return Ok(Inserted {
                        clip: existing,
                        created: false,
                    });
                }

                let (text, blob) = match &clip.body {
                    ClipBody::Text(text) => (Some(text.as_str()), None),
                    ClipBody::Binary(bytes) => (None, Some(self.blobs.write(bytes)?.blob)),
                };

                conn.execute(
                    "INSERT INTO clips (captured_at, hash, mime, text, metadata, url, blob_hash, blob_path)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                    params![
                        clip.captured_at.timestamp_millis(),
                        hash.to_string(),
                        clip.mime,
                        text,
                        clip.metadata,
                        clip.url,
                        blob.as_ref().map(|b| b.hash.to_string()),
                        blob.as_ref().map(|b| b.path.to_string_lossy().into_owned()),
                    ],
                )
                .map_err(|e| Error::storage("insert_clip", e))?;

                let id = ClipId::new(conn.last_insert_rowid());
                let stored = fetch_clip_by_id(conn, id)?
                    .ok_or_else(|| Error::storage("insert_clip", "inserted row vanished"))?;
                tracing::info!(clip.id = %id, %hash, "clip stored");
                Ok(Inserted {
                    clip: stored,
                    created: true,
                })
            })
        })
    }

    /// Fetches one clip.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if no clip has this id.
    #[instrument(skip(self), fields(operation = "get", backend = "sqlite", clip.id = %id))]
    pub fn get(&self, id: ClipId) -> Result<Clip> {
        timed("get", || {
            self.with_conn(|conn| fetch_clip_by_id(conn, id))?
                .ok_or(Error::NotFound(id))
        })
    }

    /// Deletes every clip whose id is in `ids`; unknown ids are ignored.
    ///
    /// Blob files no longer referenced by any remaining row are removed after
    /// the rows are gone. Each file is re-checked and removed under the write
    /// lock, so a clip inserted meanwhile by another process keeps its blob.
    /// Removal failures are collected in the report. The full-text index is
    /// rebuilt afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if the rows cannot be deleted.
    #[instrument(skip(self, ids), fields(operation = "delete", backend = "sqlite", count = ids.len()))]
    pub fn delete(&self, ids: &[ClipId]) -> Result<DeleteReport> {
        timed("delete", || {
            if ids.is_empty() {
                return Ok(DeleteReport::default());
            }
            let raw_ids: Vec<i64> = ids.iter().map(|id| id.value()).collect();
            let in_list = placeholders(raw_ids.len());

            let (removed, candidates) = self.write(|conn| {
                let blob_paths: Vec<String> = {
                    let mut stmt = conn
                        .prepare(&format!(
                            "SELECT DISTINCT blob_path FROM clips
                             WHERE id IN ({in_list}) AND blob_path IS NOT NULL"
                        ))
                        .map_err(|e| Error::storage("prepare_delete", e))?;
                    stmt.query_map(params_from_iter(&raw_ids), |row| row.get(0))
                        .map_err(|e| Error::storage("select_blobs", e))?
                        .collect::<rusqlite::Result<_>>()
                        .map_err(|e| Error::storage("select_blobs", e))?
                };

                let removed = conn
                    .execute(
                        &format!("DELETE FROM clips WHERE id IN ({in_list})"),
                        params_from_iter(&raw_ids),
                    )
                    .map_err(|e| Error::storage("delete_clips", e))?;

                Ok((removed, blob_paths))
            })?;

            let blob_failures = self.remove_orphaned_blobs(candidates)?;

            self.write(rebuild_index)?;
            tracing::info!(removed, "clips deleted");
            Ok(DeleteReport {
                removed,
                blob_failures,
            })
        })
    }

    /// Removes each blob in `candidates` that no row references.
    ///
    /// Runs in one write transaction so no other writer can insert a row
    /// pointing at a file between the check and the removal.
    fn remove_orphaned_blobs(&self, candidates: Vec<String>) -> Result<Vec<BlobFailure>> {
        if candidates.is_empty() {
            return Ok(Vec::new());
        }
        self.write(|conn| {
            let mut failures = Vec::new();
            for path in candidates {
                let still_used: bool = conn
                    .query_row(
                        "SELECT EXISTS(SELECT 1 FROM clips WHERE blob_path = ?1)",
                        params![path],
                        |row| row.get(0),
                    )
                    .map_err(|e| Error::storage("check_blob_refs", e))?;
                if still_used {
                    tracing::debug!(%path, "blob still referenced");
                    continue;
                }
                let path = PathBuf::from(path);
                if let Err(e) = BlobStore::remove(&path) {
                    tracing::warn!(path = %path.display(), error = %e, "failed to remove blob");
                    failures.push(BlobFailure {
                        path,
                        cause: e.to_string(),
                    });
                }
            }
            Ok(failures)
        })
    }

    /// Deletes every clip, rebuilds the empty index and removes the blob
    /// directory. Returns the number of rows removed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if the rows or blob directory cannot be removed.
    #[instrument(skip(self), fields(operation = "wipe", backend = "sqlite"))]
    pub fn wipe(&self) -> Result<usize> {
        timed("wipe", || {
            let removed = self.write(|conn| {
                let removed = conn
                    .execute("DELETE FROM clips", [])
                    .map_err(|e| Error::storage("wipe_clips", e))?;
                rebuild_index(conn)?;
                Ok(removed)
            })?;
            self.blobs.wipe()?;
            tracing::info!(removed, "history wiped");
            Ok(removed)
        })
    }

    /// Number of stored clips.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if the query fails.
    pub fn count(&self) -> Result<usize> {
        timed("count", || {
            self.with_conn(|conn| {
                conn.query_row("SELECT COUNT(*) FROM clips", [], |row| row.get::<_, i64>(0))
                    .map(|n| usize::try_from(n).unwrap_or_default())
                    .map_err(|e| Error::storage("count_clips", e))
            })
        })
    }

    /// The newest `limit` clips, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if the query fails.
    #[instrument(skip(self), fields(operation = "list_recent", backend = "sqlite"))]
    pub fn list_recent(&self, limit: usize) -> Result<Vec<Clip>> {
        timed("list_recent", || {
            self.with_conn(|conn| {
                let mut stmt = conn
                    .prepare(&format!(
                        "SELECT {CLIP_COLUMNS} FROM clips ORDER BY id DESC LIMIT ?1"
                    ))
                    .map_err(|e| Error::storage("prepare_list_recent", e))?;
                let rows = stmt
                    .query_map(params![sql_limit(limit)], ClipRow::from_row)
                    .map_err(|e| Error::storage("list_recent", e))?;
                collect_clips(rows, "list_recent")
            })
        })
    }
}

/// Converts a result cap to an `SQLite` integer.
pub(super) fn sql_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store() -> (TempDir, ClipStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = ClipStore::open(dir.path()).unwrap();
        (dir, store)
    }

    fn png(bytes: &[u8]) -> NewClip {
        NewClip::binary("image/png", bytes.to_vec())
    }

    #[test]
    fn test_open_creates_layout() {
        let (dir, _store) = store();
        assert!(dir.path().join("history.db").exists());
    }

    #[test]
    fn test_insert_text_and_get() {
        let (_dir, store) = store();
        let inserted = store
            .insert(&NewClip::text("text/plain", "hello").with_url("https://example.org"))
            .unwrap();
        assert!(inserted.created);

        let clip = store.get(inserted.clip.id).unwrap();
        assert_eq!(clip.text(), Some("hello"));
        assert_eq!(clip.url.as_deref(), Some("https://example.org"));
        assert_eq!(clip.mime, "text/plain");
    }

    #[test]
    fn test_duplicate_returns_existing() {
        let (_dir, store) = store();
        let first = store.insert(&NewClip::text("text/plain", "same")).unwrap();
        let second = store.insert(&NewClip::text("text/plain", "same")).unwrap();

        assert!(!second.created);
        assert_eq!(second.clip, first.clip);
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn test_binary_goes_to_blob() {
        let (dir, store) = store();
        let inserted = store.insert(&png(b"img").with_metadata("caption")).unwrap();

        let blob = inserted.clip.blob().unwrap();
        assert!(blob.path.starts_with(dir.path().join("blob")));
        assert_eq!(std::fs::read(&blob.path).unwrap(), b"img");
        assert_eq!(inserted.clip.text(), None);
        assert_eq!(inserted.clip.metadata.as_deref(), Some("caption"));
    }

    #[test]
    fn test_get_missing_is_not_found() {
        let (_dir, store) = store();
        let err = store.get(ClipId::new(99)).unwrap_err();
        assert!(matches!(err, Error::NotFound(id) if id == ClipId::new(99)));
    }

    #[test]
    fn test_delete_ignores_missing_ids() {
        let (_dir, store) = store();
        let kept = store.insert(&NewClip::text("text/plain", "keep")).unwrap().clip;
        let gone = store.insert(&png(b"gone")).unwrap().clip;
        let blob_path = gone.blob().unwrap().path.clone();

        let report = store.delete(&[gone.id, ClipId::new(1000)]).unwrap();
        assert_eq!(report.removed, 1);
        assert!(report.is_clean());
        assert!(!blob_path.exists());
        assert!(store.get(kept.id).is_ok());
    }

    #[test]
    fn test_shared_blob_survives_until_last_reference() {
        let (_dir, store) = store();
        let a = store.insert(&png(b"shared").with_metadata("one")).unwrap().clip;
        let b = store.insert(&png(b"shared").with_metadata("two")).unwrap().clip;
        let path = a.blob().unwrap().path.clone();
        assert_eq!(b.blob().unwrap().path, path);

        store.delete(&[a.id]).unwrap();
        assert!(path.exists());
        store.delete(&[b.id]).unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_already_missing_blob_counts_as_removed() {
        let (_dir, store) = store();
        let clip = store.insert(&png(b"vanishing")).unwrap().clip;
        std::fs::remove_file(&clip.blob().unwrap().path).unwrap();

        let report = store.delete(&[clip.id]).unwrap();
        assert_eq!(report.removed, 1);
        assert!(report.is_clean());
    }

    #[test]
    fn test_delete_empty_set() {
        let (_dir, store) = store();
        assert_eq!(store.delete(&[]).unwrap(), DeleteReport::default());
    }

    #[test]
    fn test_wipe_removes_everything() {
        let (dir, store) = store();
        store.insert(&NewClip::text("text/plain", "a")).unwrap();
        store.insert(&png(b"b")).unwrap();

        assert_eq!(store.wipe().unwrap(), 2);
        assert_eq!(store.count().unwrap(), 0);
        assert!(!dir.path().join("blob").exists());
    }

    #[test]
    fn test_list_recent_newest_first() {
        let (_dir, store) = store();
        for text in ["one", "two", "three"] {
            store.insert(&NewClip::text("text/plain", text)).unwrap();
        }
        let recent = store.list_recent(2).unwrap();
        let texts: Vec<_> = recent.iter().filter_map(Clip::text).collect();
        assert_eq!(texts, ["three", "two"]);
    }

    #[test]
    fn test_reopen_preserves_rows() {
        let dir = tempfile::tempdir().unwrap();
        let id = {
            let store = ClipStore::open(dir.path()).unwrap();
            store.insert(&NewClip::text("text/plain", "durable")).unwrap().clip.id
        };
        let store = ClipStore::open(dir.path()).unwrap();
        assert_eq!(store.get(id).unwrap().text(), Some("durable"));
    }

    #[test]
    fn test_orphan_sweep_keeps_blob_referenced_again() {
        let (_dir, store) = store();
        let clip = store.insert(&png(b"again")).unwrap().clip;
        let path = clip.blob().unwrap().path.clone();

        let failures = store
            .remove_orphaned_blobs(vec![path.to_string_lossy().into_owned()])
            .unwrap();
        assert!(failures.is_empty());
        assert!(path.exists());

        store.with_conn(|conn| {
            conn.execute("DELETE FROM clips", [])
                .map_err(|e| Error::storage("test_delete", e))
        })
        .unwrap();
        store
            .remove_orphaned_blobs(vec![path.to_string_lossy().into_owned()])
            .unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_from_config_uses_configured_paths() {
        let dir = tempfile::tempdir().unwrap();
        let config = StashConfig::default().with_database(dir.path().join("nested"));
        let store = ClipStore::from_config(&config).unwrap();

        assert!(config.db_path().exists());
        assert_eq!(store.blobs().dir(), config.blob_dir());
        assert_eq!(store.root(), config.database);

        let blob = store.insert(&png(b"cfg")).unwrap().clip;
        assert!(blob.blob().unwrap().path.starts_with(config.blob_dir()));
    }
}
