//! Full-text search over the clip store with a substring fallback.

use super::clips::{ClipStore, sql_limit};
use super::sqlite::{
    CLIP_COLUMNS, ClipRow, build_fts_query, collect_clips, contains_pattern, rebuild_index, timed,
};
use crate::models::Clip;
use crate::{Error, Result};
use rusqlite::{Connection, params};
use tracing::instrument;

impl ClipStore {
    /// Searches text, metadata and url.
    ///
    /// Runs an FTS5 prefix query ranked by relevance. If it fails or finds
    /// nothing, falls back to a literal substring match, which has no
    /// relevance order. An empty query lists the newest clips. With
    /// `force_sync` the index is rebuilt first.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] only if the fallback itself fails.
    #[instrument(
        skip(self, query),
        fields(operation = "search", backend = "sqlite", query_length = query.len(), limit)
    )]
    pub fn search(&self, query: &str, limit: usize, force_sync: bool) -> Result<Vec<Clip>> {
        if force_sync {
            self.rebuild_index()?;
        }
        let Some(fts_query) = build_fts_query(query) else {
            return self.list_recent(limit);
        };

        timed("search", || {
            self.with_conn(|conn| {
                match fts_search(conn, &fts_query, limit) {
                    Ok(clips) if !clips.is_empty() => return Ok(clips),
                    Ok(_) => tracing::debug!("full-text search found nothing, using substring match"),
                    Err(e) => {
                        metrics::counter!("search_fallback_total", "reason" => "error").increment(1);
                        tracing::warn!(error = %e, "full-text search failed, using substring match");
                    },
                }
                substring_search(conn, query.trim(), limit)
            })
        })
    }

    /// Rebuilds the full-text index from the stored rows.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if the rebuild fails.
    #[instrument(skip(self), fields(operation = "rebuild_index", backend = "sqlite"))]
    pub fn rebuild_index(&self) -> Result<()> {
        timed("rebuild_index", || self.write(rebuild_index))
    }
}

fn fts_search(conn: &Connection, fts_query: &str, limit: usize) -> Result<Vec<Clip>> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {CLIP_COLUMNS}
             FROM clip_index
             JOIN clips ON clips.id = clip_index.rowid
             WHERE clip_index MATCH ?1
             ORDER BY rank
             LIMIT ?2"
        ))
        .map_err(|e| Error::storage("prepare_search", e))?;
    let rows = stmt
        .query_map(params![fts_query, sql_limit(limit)], ClipRow::from_row)
        .map_err(|e| Error::storage("execute_search", e))?;
    collect_clips(rows, "read_search_row")
}

fn substring_search(conn: &Connection, query: &str, limit: usize) -> Result<Vec<Clip>> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {CLIP_COLUMNS}
             FROM clips
             WHERE text LIKE ?1 ESCAPE '\\'
                OR metadata LIKE ?1 ESCAPE '\\'
                OR url LIKE ?1 ESCAPE '\\'
             ORDER BY id DESC
             LIMIT ?2"
        ))
        .map_err(|e| Error::storage("prepare_fallback_search", e))?;
    let rows = stmt
        .query_map(params![contains_pattern(query), sql_limit(limit)], ClipRow::from_row)
        .map_err(|e| Error::storage("execute_fallback_search", e))?;
    collect_clips(rows, "read_fallback_row")
}
