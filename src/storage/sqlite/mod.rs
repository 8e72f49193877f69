//! `SQLite` infrastructure for the clip store.
//!
//! ## Module Structure
//!
//! - [`connection`]: lock acquisition, pragma configuration, busy retry and transactions
//! - [`sql`]: LIKE escaping, FTS5 query building
//! - [`schema`]: tables, FTS5 index and triggers
//! - [`clip_row`]: row conversion for [`Clip`](crate::models::Clip)
//! - [`metrics`]: operation counters and latency histograms

mod clip_row;
mod connection;
mod metrics;
mod schema;
mod sql;

pub use clip_row::{
    CLIP_COLUMNS, ClipRow, collect_clips, fetch_clip_by_hash, fetch_clip_by_id,
};
pub use connection::{
    acquire_lock, configure_connection, in_transaction, is_busy, with_busy_retry,
};
pub use metrics::{record_operation_metrics, timed};
pub use schema::{initialize, rebuild_index};
pub use sql::{build_fts_query, contains_pattern, escape_like_wildcards, placeholders};
