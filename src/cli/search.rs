//! Search command.

use super::output::{OutputFormat, write_clips};
use crate::storage::ClipStore;
use std::io::Write;

/// Executes the search command.
///
/// Query words are joined with single spaces. An empty query lists the most
/// recent clips. Returns the number of clips printed.
///
/// # Errors
///
/// Returns an error if the store query or output fails.
pub fn execute<W: Write>(
    store: &ClipStore,
    words: &[String],
    limit: usize,
    sync: bool,
    format: &OutputFormat,
    out: &mut W,
) -> anyhow::Result<usize> {
    let query = words.join(" ");
    let clips = store.search(&query, limit, sync)?;
    write_clips(out, &clips, format)?;
    Ok(clips.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewClip;

    #[test]
    fn test_words_joined_into_one_query() {
        let dir = tempfile::tempdir().unwrap();
        let store = ClipStore::open(dir.path()).unwrap();
        store
            .insert(&NewClip::text("text/plain", "ship the release notes"))
            .unwrap();
        store
            .insert(&NewClip::text("text/plain", "release party"))
            .unwrap();

        let mut out = Vec::new();
        let words = vec!["release".to_string(), "not".to_string()];
        let printed = execute(&store, &words, 10, false, &OutputFormat::Simple, &mut out).unwrap();

        assert_eq!(printed, 1);
        assert!(String::from_utf8(out).unwrap().ends_with("ship the release notes\n"));
    }

    #[test]
    fn test_no_words_lists_recent() {
        let dir = tempfile::tempdir().unwrap();
        let store = ClipStore::open(dir.path()).unwrap();
        for text in ["a", "b", "c"] {
            store.insert(&NewClip::text("text/plain", text)).unwrap();
        }

        let mut out = Vec::new();
        let printed = execute(&store, &[], 2, false, &OutputFormat::JsonStream, &mut out).unwrap();
        assert_eq!(printed, 2);
    }

    #[test]
    fn test_template_format() {
        let dir = tempfile::tempdir().unwrap();
        let store = ClipStore::open(dir.path()).unwrap();
        store
            .insert(&NewClip::text("text/plain", "release\n  notes").with_url("https://example.org"))
            .unwrap();

        let format: OutputFormat = "{{.Mime}} {{simplify .Text}} <{{.Url}}>".parse().unwrap();
        let mut out = Vec::new();
        execute(&store, &["release".to_string()], 10, false, &format, &mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "text/plain release notes <https://example.org>\n"
        );
    }
}
