//! Row conversion between the `clips` table and [`Clip`].

use crate::models::{BlobRef, Clip, ClipId, ClipPayload, ContentHash};
use crate::{Error, Result};
use chrono::DateTime;
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::path::PathBuf;

/// Column list shared by every clip `SELECT`, in [`ClipRow::from_row`] order.
pub const CLIP_COLUMNS: &str =
    "clips.id, clips.captured_at, clips.hash, clips.mime, clips.text, clips.metadata, \
     clips.url, clips.blob_hash, clips.blob_path";

/// A `clips` row with primitive column types.
#[derive(Debug)]
pub struct ClipRow {
    /// Row identifier.
    pub id: i64,
    /// Unix milliseconds.
    pub captured_at: i64,
    /// Hex dedup key.
    pub hash: String,
    /// Primary mime type.
    pub mime: String,
    /// Inline text for text clips.
    pub text: Option<String>,
    /// Caption for binary clips.
    pub metadata: Option<String>,
    /// Source URL.
    pub url: Option<String>,
    /// Hex hash of the blob bytes.
    pub blob_hash: Option<String>,
    /// Absolute blob file path.
    pub blob_path: Option<String>,
}

impl ClipRow {
    /// Reads a row selected with [`CLIP_COLUMNS`].
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            captured_at: row.get(1)?,
            hash: row.get(2)?,
            mime: row.get(3)?,
            text: row.get(4)?,
            metadata: row.get(5)?,
            url: row.get(6)?,
            blob_hash: row.get(7)?,
            blob_path: row.get(8)?,
        })
    }

    /// Converts to a [`Clip`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if a stored hash or timestamp is corrupt.
    pub fn into_clip(self) -> Result<Clip> {
        let captured_at = DateTime::from_timestamp_millis(self.captured_at).ok_or_else(|| {
            Error::storage("decode_clip", format!("bad timestamp {}", self.captured_at))
        })?;
        let hash = ContentHash::parse(&self.hash).map_err(|e| Error::storage("decode_clip", e))?;

        let payload = match (self.blob_hash, self.blob_path) {
            (Some(blob_hash), Some(blob_path)) => ClipPayload::Blob(BlobRef {
                hash: ContentHash::parse(&blob_hash).map_err(|e| Error::storage("decode_clip", e))?,
                path: PathBuf::from(blob_path),
            }),
            _ => ClipPayload::Text(self.text.unwrap_or_default()),
        };

        Ok(Clip {
            id: ClipId::new(self.id),
            captured_at,
            hash,
            mime: self.mime,
            payload,
            metadata: self.metadata,
            url: self.url,
        })
    }
}

/// Collects and converts every row of a prepared clip query.
pub fn collect_clips(
    rows: impl Iterator<Item = rusqlite::Result<ClipRow>>,
    operation: &str,
) -> Result<Vec<Clip>> {
    rows.map(|row| row.map_err(|e| Error::storage(operation, e))?.into_clip())
        .collect()
}

/// Fetches a clip row by id.
///
/// # Errors
///
/// Returns [`Error::Storage`] if the query fails.
pub fn fetch_clip_by_id(conn: &Connection, id: ClipId) -> Result<Option<Clip>> {
    conn.query_row(
        &format!("SELECT {CLIP_COLUMNS} FROM clips WHERE id = ?1"),
        params![id.value()],
        ClipRow::from_row,
    )
    .optional()
    .map_err(|e| Error::storage("get_clip", e))?
    .map(ClipRow::into_clip)
    .transpose()
}

/// Fetches a clip row by content hash.
///
/// # Errors
///
/// Returns [`Error::Storage`] if the query fails.
pub fn fetch_clip_by_hash(conn: &Connection, hash: ContentHash) -> Result<Option<Clip>> {
    conn.query_row(
        &format!("SELECT {CLIP_COLUMNS} FROM clips WHERE hash = ?1"),
        params![hash.to_string()],
        ClipRow::from_row,
    )
    .optional()
    .map_err(|e| Error::storage("find_by_hash", e))?
    .map(ClipRow::into_clip)
    .transpose()
}
