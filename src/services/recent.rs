//! Recently captured content.
//!
//! Applications often re-announce the same selection (focus changes,
//! primary and regular selection carrying identical text). The watcher
//! checks this in-memory LRU before touching the store.

use crate::models::{ClipId, ContentHash};
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::RwLock;
use std::time::{Duration, Instant};

/// How long a remembered capture suppresses a store round-trip.
///
/// Bounded so that content deleted from another process is captured again
/// on its next copy.
pub const DEFAULT_TTL: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy)]
struct Entry {
    id: ClipId,
    seen_at: Instant,
}

/// LRU of content hashes recently persisted by this process.
///
/// Lock poisoning fails open: a check reports "not seen" and a record is
/// skipped, so the worst case is one redundant store lookup.
pub struct RecentCaptures {
    cache: Option<RwLock<LruCache<ContentHash, Entry>>>,
    ttl: Duration,
}

impl RecentCaptures {
    /// Creates a cache holding up to `capacity` hashes. Zero disables it.
    #[must_use]
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            cache: NonZeroUsize::new(capacity).map(|cap| RwLock::new(LruCache::new(cap))),
            ttl,
        }
    }

    /// Returns the clip recorded for `hash` if it is still fresh.
    pub fn check(&self, hash: ContentHash) -> Option<ClipId> {
        let entry = self.cache.as_ref()?.read().ok()?.peek(&hash).copied()?;
        if entry.seen_at.elapsed() <= self.ttl {
            metrics::counter!("recent_capture_hits_total").increment(1);
            Some(entry.id)
        } else {
            None
        }
    }

    /// Remembers that `hash` is stored as `id`.
    pub fn record(&self, hash: ContentHash, id: ClipId) {
        let Some(cache) = &self.cache else {
            return;
        };
        if let Ok(mut cache) = cache.write() {
            cache.put(
                hash,
                Entry {
                    id,
                    seen_at: Instant::now(),
                },
            );
            #[allow(clippy::cast_precision_loss)]
            metrics::gauge!("recent_capture_cache_size").set(cache.len() as f64);
        }
    }

    /// Number of remembered hashes.
    pub fn len(&self) -> usize {
        self.cache
            .as_ref()
            .and_then(|c| c.read().ok().map(|c| c.len()))
            .unwrap_or_default()
    }

    /// True if nothing is remembered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
