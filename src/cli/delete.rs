//! Delete command.
//!
//! Rows are removed even when their blob files cannot be; those failures
//! are listed after the count.

use crate::models::ClipId;
use crate::storage::{ClipStore, DeleteReport};
use std::io::Write;

/// Deletes the given clips and prints what happened.
///
/// # Errors
///
/// Returns an error if the row deletion or output fails.
pub fn execute<W: Write>(
    store: &ClipStore,
    ids: &[ClipId],
    out: &mut W,
) -> anyhow::Result<DeleteReport> {
    let report = store.delete(ids)?;
    writeln!(out, "deleted {} of {} clip(s)", report.removed, ids.len())?;
    for failure in &report.blob_failures {
        writeln!(
            out,
            "failed to remove blob {}: {}",
            failure.path.display(),
            failure.cause
        )?;
    }
    Ok(report)
}
