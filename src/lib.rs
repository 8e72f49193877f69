//! # Stashd
//!
//! A clipboard history daemon for wlroots-based Wayland compositors.
//!
//! Stashd listens to the `wlr-data-control` protocol, picks the best
//! representation of every clipboard offer, and keeps a deduplicated,
//! searchable history in `SQLite` with binary payloads stored on disk.
//!
//! ## Architecture
//!
//! - [`wayland`]: protocol client (connect, discover, bind, listen, close)
//! - [`services::negotiation`]: mime selection and payload retrieval
//! - [`services::capture`]: hand-off queue consumer that persists clips
//! - [`storage`]: row store, content-addressed blob store and FTS5 search
//!
//! ## Example
//!
//! ```rust,ignore
//! use stashd::storage::ClipStore;
//!
//! let store = ClipStore::open("/home/me/.local/share/stashd")?;
//! for clip in store.search("invoice", 20, false)? {
//!     println!("{} {}", clip.id, clip.mime);
//! }
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
#![allow(clippy::multiple_crate_versions)]

use thiserror::Error as ThisError;

pub mod cli;
pub mod config;
pub mod models;
pub mod observability;
pub mod services;
pub mod storage;
pub mod wayland;

pub use config::StashConfig;
pub use models::{BlobRef, Clip, ClipBody, ClipId, ClipPayload, ContentHash, NewClip};
pub use services::{CaptureService, ContentNegotiator, PayloadSource};
pub use storage::{BlobStore, ClipStore, DeleteReport};
pub use wayland::{CancelToken, ClipboardSession, SessionState};

/// Error type for stashd operations.
///
/// # Error Variant Triggers
///
/// | Variant | Raised When |
/// |---------|-------------|
/// | `Connection` | The compositor socket cannot be reached |
/// | `Protocol` | Required globals are missing, or session operations run out of order |
/// | `Bind` | The data-control device cannot be created |
/// | `Dispatch` | Event dispatch fails for a reason other than our own close |
/// | `Negotiation` | An offer carries nothing retrievable |
/// | `Storage` | `SQLite` or filesystem operations fail |
/// | `NotFound` | A clip id does not exist |
/// | `InvalidInput` | Malformed configuration or command-line input |
/// | `Logging` | The log subscriber or log file cannot be set up |
#[derive(Debug, ThisError)]
pub enum Error {
    /// The compositor could not be reached.
    #[error("connection failed: {0}")]
    Connection(String),

    /// The compositor did not advertise what we need, or the session was
    /// driven through its states out of order.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Binding the manager, seat or data device failed.
    #[error("bind failed: {0}")]
    Bind(String),

    /// Event dispatch failed while the session was not being closed by us.
    #[error("dispatch failed: {0}")]
    Dispatch(String),

    /// Content negotiation for a single offer failed.
    ///
    /// Fatal to that offer only; the watch loop moves on to the next one.
    #[error("negotiation failed: {0}")]
    Negotiation(String),

    /// A storage operation failed.
    ///
    /// Raised when:
    /// - `SQLite` statements fail, including after the busy retry window
    /// - Blob files cannot be written
    /// - The storage root cannot be created
    #[error("operation '{operation}' failed: {cause}")]
    Storage {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },

    /// No clip exists with the given id.
    #[error("clip {0} not found")]
    NotFound(ClipId),

    /// Invalid input was provided.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Logging could not be set up: a subscriber is already installed or the
    /// log file cannot be opened.
    #[error("logging setup failed: {0}")]
    Logging(String),
}

impl Error {
    /// Builds a [`Error::Storage`] from an operation name and any displayable cause.
    pub fn storage(operation: &str, cause: impl std::fmt::Display) -> Self {
        Self::Storage {
            operation: operation.to_string(),
            cause: cause.to_string(),
        }
    }
}

/// Result type alias for stashd operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::Protocol("no seat".to_string());
        assert_eq!(err.to_string(), "protocol error: no seat");

        let err = Error::storage("insert_clip", "disk full");
        assert_eq!(err.to_string(), "operation 'insert_clip' failed: disk full");

        let err = Error::NotFound(ClipId::new(7));
        assert_eq!(err.to_string(), "clip 7 not found");

        let err = Error::Negotiation("no suitable mime types".to_string());
        assert_eq!(err.to_string(), "negotiation failed: no suitable mime types");
    }
}
