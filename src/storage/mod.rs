//! Storage layer.
//!
//! - **Rows**: `SQLite` table of deduplicated clips (`history.db`)
//! - **Index**: FTS5 external-content table kept current by triggers
//! - **Blobs**: content-addressed files under `blob/`

// Connection guards are held for the whole closure.
#![allow(clippy::significant_drop_tightening)]

mod blob;
mod clips;
mod search;
pub mod sqlite;

pub use blob::{BlobStore, StoredBlob};
pub use clips::{BlobFailure, ClipStore, DeleteReport, Inserted};
