//! Wipe command.

use crate::storage::ClipStore;
use std::io::Write;

/// Deletes every clip and blob, then prints the number of rows removed.
///
/// # Errors
///
/// Returns an error if the store or output fails.
pub fn execute<W: Write>(store: &ClipStore, out: &mut W) -> anyhow::Result<usize> {
    let removed = store.wipe()?;
    writeln!(out, "wiped {removed} clip(s)")?;
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewClip;

    #[test]
    fn test_wipe_prints_count() {
        let dir = tempfile::tempdir().unwrap();
        let store = ClipStore::open(dir.path()).unwrap();
        store.insert(&NewClip::text("text/plain", "one")).unwrap();
        store
            .insert(&NewClip::binary("image/png", vec![1, 2, 3]))
            .unwrap();

        let mut out = Vec::new();
        assert_eq!(execute(&store, &mut out).unwrap(), 2);
        assert_eq!(String::from_utf8(out).unwrap(), "wiped 2 clip(s)\n");
        assert_eq!(store.count().unwrap(), 0);
    }
}
