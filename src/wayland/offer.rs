//! Pending offers and payload transfer.

use crate::services::PayloadSource;
use std::collections::HashMap;
use std::hash::Hash;
use std::io::{self, Read};
use std::os::fd::AsFd;
use wayland_client::Connection;
use wayland_protocols_wlr::data_control::v1::client::zwlr_data_control_offer_v1::ZwlrDataControlOfferV1;

/// An offer that has been announced but not yet resolved.
#[derive(Debug)]
pub struct PendingOffer<O> {
    /// The protocol object.
    pub offer: O,
    /// Mime types advertised so far.
    pub mimes: Vec<String>,
}

/// Open offers keyed by protocol object id.
#[derive(Debug)]
pub struct OfferTable<K, O> {
    entries: HashMap<K, PendingOffer<O>>,
}

impl<K, O> Default for OfferTable<K, O> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<K: Eq + Hash, O> OfferTable<K, O> {
    /// Starts tracking a new offer.
    pub fn open(&mut self, key: K, offer: O) {
        self.entries.insert(
            key,
            PendingOffer {
                offer,
                mimes: Vec::new(),
            },
        );
    }

    /// Appends an advertised mime type. Returns false for unknown offers.
    pub fn add_mime(&mut self, key: &K, mime: String) -> bool {
        self.entries.get_mut(key).is_some_and(|pending| {
            pending.mimes.push(mime);
            true
        })
    }

    /// Stops tracking an offer and hands it back.
    pub fn take(&mut self, key: &K) -> Option<PendingOffer<O>> {
        self.entries.remove(key)
    }

    /// Removes every tracked offer.
    pub fn drain(&mut self) -> impl Iterator<Item = PendingOffer<O>> + '_ {
        self.entries.drain().map(|(_, pending)| pending)
    }

    /// Number of tracked offers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if no offers are tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Retrieves offer payloads over a pipe.
///
/// The write end is handed to the offering client with `receive`, our copy
/// is closed after the request is flushed, and the read end is drained to
/// end-of-stream. A source that never closes its end blocks the read.
pub struct OfferPipe<'a> {
    offer: &'a ZwlrDataControlOfferV1,
    conn: &'a Connection,
    mimes: &'a [String],
}

impl<'a> OfferPipe<'a> {
    /// Wraps a resolved offer.
    #[must_use]
    pub const fn new(
        offer: &'a ZwlrDataControlOfferV1,
        conn: &'a Connection,
        mimes: &'a [String],
    ) -> Self {
        Self { offer, conn, mimes }
    }
}

impl PayloadSource for OfferPipe<'_> {
    fn mime_types(&self) -> &[String] {
        self.mimes
    }

    fn fetch(&mut self, mime: &str) -> io::Result<Vec<u8>> {
        let (mut reader, writer) = io::pipe()?;
        self.offer.receive(mime.to_string(), writer.as_fd());
        self.conn
            .flush()
            .map_err(|e| io::Error::other(format!("flushing receive request: {e}")))?;
        drop(writer);

        let mut payload = Vec::new();
        reader.read_to_end(&mut payload)?;
        Ok(payload)
    }
}
