//! Clip types and identifiers.

use super::ContentHash;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Maximum number of characters in a one-line preview.
const PREVIEW_CHARS: usize = 100;

/// Store-assigned identifier of a persisted clip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClipId(i64);

impl ClipId {
    /// Creates a clip ID from its row identifier.
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// Returns the row identifier.
    #[must_use]
    pub const fn value(self) -> i64 {
        self.0
    }
}

impl fmt::Display for ClipId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ClipId {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        s.trim()
            .parse::<i64>()
            .map(Self)
            .map_err(|e| crate::Error::InvalidInput(format!("invalid clip id '{s}': {e}")))
    }
}

/// Primary payload of a clip as produced by negotiation, before persistence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClipBody {
    /// Trimmed textual payload.
    Text(String),
    /// Raw binary payload (images).
    Binary(Vec<u8>),
}

/// A negotiated clip that has not been persisted yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewClip {
    /// When negotiation produced this clip.
    pub captured_at: DateTime<Utc>,
    /// Mime type of the primary representation.
    pub mime: String,
    /// The primary payload.
    pub body: ClipBody,
    /// Caption or alt-text, only set for binary clips.
    pub metadata: Option<String>,
    /// Source URL advertised alongside the content.
    pub url: Option<String>,
}

impl NewClip {
    /// Creates a text clip captured now.
    #[must_use]
    pub fn text(mime: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            captured_at: Utc::now(),
            mime: mime.into(),
            body: ClipBody::Text(text.into()),
            metadata: None,
            url: None,
        }
    }

    /// Creates a binary clip captured now.
    #[must_use]
    pub fn binary(mime: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            captured_at: Utc::now(),
            mime: mime.into(),
            body: ClipBody::Binary(bytes),
            metadata: None,
            url: None,
        }
    }

    /// Sets the metadata field.
    #[must_use]
    pub fn with_metadata(mut self, metadata: impl Into<String>) -> Self {
        self.metadata = Some(metadata.into());
        self
    }

    /// Sets the URL field.
    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Returns the textual payload, if any.
    #[must_use]
    pub fn text_payload(&self) -> Option<&str> {
        match &self.body {
            ClipBody::Text(text) => Some(text),
            ClipBody::Binary(_) => None,
        }
    }

    /// Returns the binary payload, if any.
    #[must_use]
    pub fn binary_payload(&self) -> Option<&[u8]> {
        match &self.body {
            ClipBody::Text(_) => None,
            ClipBody::Binary(bytes) => Some(bytes),
        }
    }

    /// Computes the dedup key over mime, text, metadata, url and raw bytes.
    ///
    /// The capture timestamp does not participate.
    #[must_use]
    pub fn content_hash(&self) -> ContentHash {
        ContentHash::of_content(
            &self.mime,
            self.text_payload(),
            self.metadata.as_deref(),
            self.url.as_deref(),
            self.binary_payload().unwrap_or_default(),
        )
    }
}

/// Location of a binary payload in the blob store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlobRef {
    /// Hash of the raw bytes; also the file name.
    pub hash: ContentHash,
    /// Absolute path of the blob file.
    pub path: PathBuf,
}

/// Primary payload of a persisted clip.
///
/// Exactly one representation holds the payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ClipPayload {
    /// Inline text.
    Text(String),
    /// Binary content stored as a blob file.
    Blob(BlobRef),
}

/// A persisted, deduplicated clipboard entry.
///
/// Clips are immutable: the store has no update path, only deletion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Clip {
    /// Store-assigned identifier.
    pub id: ClipId,
    /// When the clip was negotiated.
    pub captured_at: DateTime<Utc>,
    /// Dedup key.
    pub hash: ContentHash,
    /// Mime type of the primary representation.
    pub mime: String,
    /// The primary payload.
    #[serde(flatten)]
    pub payload: ClipPayload,
    /// Caption or alt-text for binary clips.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<String>,
    /// Source URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl Clip {
    /// Returns the inline text, if this is a text clip.
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        match &self.payload {
            ClipPayload::Text(text) => Some(text),
            ClipPayload::Blob(_) => None,
        }
    }

    /// Returns the blob reference, if this is a binary clip.
    #[must_use]
    pub const fn blob(&self) -> Option<&BlobRef> {
        match &self.payload {
            ClipPayload::Text(_) => None,
            ClipPayload::Blob(blob) => Some(blob),
        }
    }

    /// One-line preview: text, else blob path, else metadata; whitespace
    /// collapsed and capped at 100 characters.
    #[must_use]
    pub fn preview(&self) -> String {
        let source = match &self.payload {
            ClipPayload::Text(text) if !text.is_empty() => text.clone(),
            ClipPayload::Blob(blob) => blob.path.display().to_string(),
            ClipPayload::Text(_) => self.metadata.clone().unwrap_or_default(),
        };
        source
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .chars()
            .take(PREVIEW_CHARS)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clip(payload: ClipPayload) -> Clip {
        Clip {
            id: ClipId::new(1),
            captured_at: Utc::now(),
            hash: ContentHash::new(1),
            mime: "text/plain".to_string(),
            payload,
            metadata: None,
            url: None,
        }
    }

    #[test]
    fn test_clip_id_parse() {
        assert_eq!(" 42 ".parse::<ClipId>().unwrap(), ClipId::new(42));
        assert!("forty-two".parse::<ClipId>().is_err());
    }

    #[test]
    fn test_content_hash_ignores_timestamp() {
        let a = NewClip::text("text/plain", "same");
        let mut b = NewClip::text("text/plain", "same");
        b.captured_at = a.captured_at - chrono::Duration::hours(3);
        assert_eq!(a.content_hash(), b.content_hash());
    }

    #[test]
    fn test_content_hash_depends_on_mime() {
        let a = NewClip::text("text/plain", "same");
        let b = NewClip::text("text/html", "same");
        assert_ne!(a.content_hash(), b.content_hash());
    }

    #[test]
    fn test_text_and_binary_differ() {
        let text = NewClip::text("x/y", "abc");
        let binary = NewClip::binary("x/y", b"abc".to_vec());
        assert_ne!(text.content_hash(), binary.content_hash());
    }

    #[test]
    fn test_preview_collapses_whitespace() {
        let c = clip(ClipPayload::Text("a\n\n  b\tc".to_string()));
        assert_eq!(c.preview(), "a b c");
    }

    #[test]
    fn test_preview_caps_length_on_char_boundary() {
        let c = clip(ClipPayload::Text("é".repeat(150)));
        assert_eq!(c.preview().chars().count(), 100);
    }

    #[test]
    fn test_preview_falls_back_to_blob_path() {
        let c = clip(ClipPayload::Blob(BlobRef {
            hash: ContentHash::new(9),
            path: PathBuf::from("/data/blob/0000000000000009"),
        }));
        assert_eq!(c.preview(), "/data/blob/0000000000000009");
    }

    #[test]
    fn test_serializes_flattened_payload() {
        let c = clip(ClipPayload::Text("hi".to_string()));
        let json = serde_json::to_value(&c).unwrap();
        assert_eq!(json["text"], "hi");
        assert_eq!(json["id"], 1);
        assert_eq!(json["hash"], "0000000000000001");
        assert!(json.get("url").is_none());
    }
}
