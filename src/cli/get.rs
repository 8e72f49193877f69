//! Get command.

use crate::models::ClipId;
use crate::storage::ClipStore;
use std::io::Write;

/// Prints one clip as pretty JSON.
///
/// # Errors
///
/// Returns [`crate::Error::NotFound`] for an unknown id, or an output error.
pub fn execute<W: Write>(store: &ClipStore, id: ClipId, out: &mut W) -> anyhow::Result<()> {
    let clip = store.get(id)?;
    serde_json::to_writer_pretty(&mut *out, &clip)?;
    writeln!(out)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use crate::models::NewClip;

    #[test]
    fn test_prints_clip_json() {
        let dir = tempfile::tempdir().unwrap();
        let store = ClipStore::open(dir.path()).unwrap();
        let id = store
            .insert(&NewClip::text("text/plain", "hello").with_url("https://example.org"))
            .unwrap()
            .clip
            .id;

        let mut out = Vec::new();
        execute(&store, id, &mut out).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value["text"], "hello");
        assert_eq!(value["url"], "https://example.org");
    }

    #[test]
    fn test_missing_clip_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = ClipStore::open(dir.path()).unwrap();

        let err = execute(&store, ClipId::new(404), &mut Vec::new()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::NotFound(id)) if id.value() == 404
        ));
    }
}
