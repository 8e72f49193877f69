//! Content hashing for deduplication and blob addressing.
//!
//! Both the clip dedup key and blob file names use XXH3-64. Neither is
//! cryptographic; collisions between distinct content are accepted.

use crate::{Error, Result};
use serde::{Serialize, Serializer};
use std::fmt;
use std::hash::Hasher;
use twox_hash::xxh3::{Hash64, hash64};

/// A 64-bit content digest, rendered as 16 lowercase hex digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentHash(u64);

impl ContentHash {
    /// Wraps a raw digest value.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the raw digest value.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }

    /// Hashes raw bytes. Used to name blob files.
    #[must_use]
    pub fn of_bytes(bytes: &[u8]) -> Self {
        Self(hash64(bytes))
    }

    /// Hashes the logical content of a clip.
    ///
    /// Every field is length-prefixed so that moving bytes from one field to
    /// its neighbour changes the digest.
    #[must_use]
    pub fn of_content(
        mime: &str,
        text: Option<&str>,
        metadata: Option<&str>,
        url: Option<&str>,
        bytes: &[u8],
    ) -> Self {
        let mut hasher = Hash64::with_seed(0);
        write_field(&mut hasher, Some(mime.as_bytes()));
        write_field(&mut hasher, text.map(str::as_bytes));
        write_field(&mut hasher, metadata.map(str::as_bytes));
        write_field(&mut hasher, url.map(str::as_bytes));
        write_field(&mut hasher, Some(bytes));
        Self(hasher.finish())
    }

    /// Parses the hex form produced by [`fmt::Display`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the string is not valid hex.
    pub fn parse(s: &str) -> Result<Self> {
        u64::from_str_radix(s, 16)
            .map(Self)
            .map_err(|e| Error::InvalidInput(format!("invalid content hash '{s}': {e}")))
    }
}

fn write_field(hasher: &mut Hash64, field: Option<&[u8]>) {
    match field {
        Some(bytes) => {
            hasher.write_u8(1);
            hasher.write_u64(bytes.len() as u64);
            hasher.write(bytes);
        },
        None => hasher.write_u8(0),
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl Serialize for ContentHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_is_fixed_width_hex() {
        assert_eq!(ContentHash::new(0xab).to_string(), "00000000000000ab");
        assert_eq!(ContentHash::new(u64::MAX).to_string(), "ffffffffffffffff");
    }

    #[test]
    fn test_parse_roundtrips_display() {
        let hash = ContentHash::of_bytes(b"hello");
        assert_eq!(ContentHash::parse(&hash.to_string()).unwrap(), hash);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(
            ContentHash::parse("not-hex"),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_field_boundaries_matter() {
        let a = ContentHash::of_content("text/plain", Some("ab"), Some("c"), None, &[]);
        let b = ContentHash::of_content("text/plain", Some("a"), Some("bc"), None, &[]);
        assert_ne!(a, b);
    }

    #[test]
    fn test_absent_differs_from_empty() {
        let absent = ContentHash::of_content("text/plain", Some("x"), None, None, &[]);
        let empty = ContentHash::of_content("text/plain", Some("x"), Some(""), None, &[]);
        assert_ne!(absent, empty);
    }

    #[test]
    fn test_bytes_participate() {
        let a = ContentHash::of_content("image/png", None, None, None, &[1, 2, 3]);
        let b = ContentHash::of_content("image/png", None, None, None, &[1, 2, 4]);
        assert_ne!(a, b);
    }
}
