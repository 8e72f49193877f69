//! Content negotiation: choose the best representation of an offer and
//! retrieve it.

use crate::models::{ClipBody, NewClip};
use crate::{Error, Result};
use chrono::Utc;
use std::io;
use tracing::instrument;

/// Image mime types in order of preference.
pub const IMAGE_MIMES: [&str; 4] = ["image/png", "image/jpeg", "image/webp", "image/gif"];
/// Text mime types in order of preference.
pub const TEXT_MIMES: [&str; 3] = ["text/plain;charset=utf-8", "text/plain", "text/html"];
/// Source-URL mime types in order of preference.
pub const URL_MIMES: [&str; 2] = ["chromium/x-source-url", "text/x-moz-url"];

const FALLBACK_MIME: &str = "text/plain";

/// Something that advertises mime types and can hand over their bytes.
///
/// Implemented by the Wayland offer; tests use in-memory sources.
pub trait PayloadSource {
    /// Advertised mime types, in advertisement order.
    fn mime_types(&self) -> &[String];

    /// Reads the full payload for `mime`.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the transfer fails.
    fn fetch(&mut self, mime: &str) -> io::Result<Vec<u8>>;
}

/// Which advertised mime types to retrieve and what role each plays.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MimeSelection {
    /// Primary representation.
    pub primary: Option<String>,
    /// Whether the primary is an image.
    pub primary_is_image: bool,
    /// Source-URL representation.
    pub url: Option<String>,
    /// Caption for image primaries.
    pub metadata: Option<String>,
}

fn first_offered(candidates: &[&str], offered: &[String]) -> Option<String> {
    candidates
        .iter()
        .find(|candidate| offered.iter().any(|m| m == *candidate))
        .map(|candidate| (*candidate).to_string())
}

impl MimeSelection {
    /// Applies the fixed precedence rules to the offered mime types.
    #[must_use]
    pub fn select(offered: &[String]) -> Self {
        let image = first_offered(&IMAGE_MIMES, offered);
        let primary_is_image = image.is_some();
        let primary = image
            .or_else(|| first_offered(&TEXT_MIMES, offered))
            .or_else(|| first_offered(&[FALLBACK_MIME], offered));
        let metadata = if primary_is_image {
            first_offered(&["text/plain", "text/html"], offered)
        } else {
            None
        };

        Self {
            primary,
            primary_is_image,
            url: first_offered(&URL_MIMES, offered),
            metadata,
        }
    }

    /// Mime types to fetch, primary first, without repeats.
    #[must_use]
    pub fn retrieval_order(&self) -> Vec<&str> {
        let mut order: Vec<&str> = Vec::with_capacity(3);
        for mime in [&self.primary, &self.url, &self.metadata]
            .into_iter()
            .flatten()
        {
            if !order.contains(&mime.as_str()) {
                order.push(mime.as_str());
            }
        }
        order
    }
}

/// Turns offers into [`NewClip`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContentNegotiator;

impl ContentNegotiator {
    /// Creates a negotiator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Selects, retrieves and assembles a clip from `source`.
    ///
    /// A failed transfer is logged and the field left empty. When the primary
    /// cannot be retrieved the clip degrades: an image falls back to its
    /// caption as text, and a text primary to an empty body carrying the URL.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Negotiation`] if nothing suitable is offered or no
    /// usable representation could be retrieved.
    #[instrument(skip(self, source), fields(operation = "negotiate", offered = source.mime_types().len()))]
    pub fn negotiate(&self, source: &mut dyn PayloadSource) -> Result<NewClip> {
        let selection = MimeSelection::select(source.mime_types());
        let order: Vec<String> = selection
            .retrieval_order()
            .into_iter()
            .map(str::to_string)
            .collect();
        if order.is_empty() {
            return Err(Error::Negotiation("no suitable mime types".to_string()));
        }
        tracing::debug!(?selection, "mime types selected");

        let mut primary = None;
        let mut url = None;
        let mut metadata = None;
        for mime in &order {
            let is_primary = selection.primary.as_ref() == Some(mime);
            match source.fetch(mime) {
                Ok(bytes) => {
                    tracing::debug!(%mime, size = bytes.len(), "payload retrieved");
                    if is_primary {
                        primary = Some(bytes);
                    } else if selection.url.as_ref() == Some(mime) {
                        url = Some(bytes);
                    } else {
                        metadata = Some(bytes);
                    }
                },
                Err(e) => {
                    tracing::warn!(%mime, primary = is_primary, error = %e, "skipping unretrievable representation");
                },
            }
        }

        let url = url
            .map(|bytes| String::from_utf8_lossy(&bytes).trim().to_string())
            .filter(|u| !u.is_empty());

        let text = |bytes: &[u8]| String::from_utf8_lossy(bytes).trim().to_string();
        let (mime, body, metadata) = match (primary, selection.primary_is_image) {
            (Some(bytes), true) => (
                selection.primary,
                ClipBody::Binary(bytes),
                metadata.map(|bytes| String::from_utf8_lossy(&bytes).into_owned()),
            ),
            (Some(bytes), false) => (selection.primary, ClipBody::Text(text(&bytes)), None),
            // The image never arrived; its caption stands in as a text clip.
            (None, true) if metadata.is_some() => {
                let caption = metadata.as_deref().map(text).unwrap_or_default();
                (selection.metadata, ClipBody::Text(caption), None)
            },
            (None, _) if url.is_some() => (None, ClipBody::Text(String::new()), None),
            (None, _) => {
                return Err(Error::Negotiation("no retrievable representation".to_string()));
            },
        };

        Ok(NewClip {
            captured_at: Utc::now(),
            mime: mime.unwrap_or_else(|| FALLBACK_MIME.to_string()),
            body,
            metadata,
            url,
        })
    }
}
