//! Capture service: the consumer side of the hand-off queue.
//!
//! The protocol thread negotiates clips and sends them here; this service
//! persists them so that store I/O never blocks protocol dispatch.

use super::recent::{DEFAULT_TTL, RecentCaptures};
use crate::models::{ClipId, NewClip};
use crate::storage::ClipStore;
use crate::Result;
use std::sync::mpsc::Receiver;
use tracing::instrument;

/// What happened to one captured clip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureOutcome {
    /// A new row was created.
    Stored(ClipId),
    /// Identical content was already stored.
    Duplicate(ClipId),
}

/// Counters for one watch session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptureStats {
    /// Clips received from the protocol thread.
    pub received: usize,
    /// New rows created.
    pub stored: usize,
    /// Clips matching stored content.
    pub duplicates: usize,
    /// Clips that failed to persist.
    pub failed: usize,
}

/// Persists negotiated clips.
pub struct CaptureService<'a> {
    store: &'a ClipStore,
    recent: RecentCaptures,
}

impl<'a> CaptureService<'a> {
    /// Creates a service writing to `store`, remembering up to
    /// `recent_capacity` recent hashes.
    #[must_use]
    pub fn new(store: &'a ClipStore, recent_capacity: usize) -> Self {
        Self {
            store,
            recent: RecentCaptures::new(recent_capacity, DEFAULT_TTL),
        }
    }

    /// Persists one clip, skipping the store when it was seen recently.
    ///
    /// # Errors
    ///
    /// Returns the store error if the insert fails.
    #[instrument(skip(self, clip), fields(operation = "capture", mime = %clip.mime))]
    pub fn capture(&self, clip: &NewClip) -> Result<CaptureOutcome> {
        let hash = clip.content_hash();
        if let Some(id) = self.recent.check(hash) {
            tracing::debug!(clip.id = %id, "recently captured, skipping store");
            return Ok(CaptureOutcome::Duplicate(id));
        }

        let inserted = self.store.insert(clip)?;
        self.recent.record(hash, inserted.clip.id);
        Ok(if inserted.created {
            CaptureOutcome::Stored(inserted.clip.id)
        } else {
            CaptureOutcome::Duplicate(inserted.clip.id)
        })
    }

    /// Drains `clips` until every sender is gone.
    ///
    /// A failed insert is logged and counted; the loop keeps going.
    pub fn run(&self, clips: &Receiver<NewClip>) -> CaptureStats {
        let mut stats = CaptureStats::default();
        for clip in clips {
            stats.received += 1;
            match self.capture(&clip) {
                Ok(CaptureOutcome::Stored(_)) => stats.stored += 1,
                Ok(CaptureOutcome::Duplicate(_)) => stats.duplicates += 1,
                Err(e) => {
                    stats.failed += 1;
                    metrics::counter!("capture_failures_total").increment(1);
                    tracing::error!(error = %e, "failed to persist clip");
                },
            }
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::thread;

    #[test]
    fn test_capture_outcomes() {
        let dir = tempfile::tempdir().unwrap();
        let store = ClipStore::open(dir.path()).unwrap();
        let service = CaptureService::new(&store, 8);

        let clip = NewClip::text("text/plain", "once");
        let first = service.capture(&clip).unwrap();
        let second = service.capture(&clip).unwrap();

        let id = store.list_recent(1).unwrap()[0].id;
        assert_eq!(first, CaptureOutcome::Stored(id));
        assert_eq!(second, CaptureOutcome::Duplicate(id));
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn test_duplicate_detected_by_store_without_cache() {
        let dir = tempfile::tempdir().unwrap();
        let store = ClipStore::open(dir.path()).unwrap();
        let service = CaptureService::new(&store, 0);

        let clip = NewClip::text("text/plain", "again");
        service.capture(&clip).unwrap();
        assert!(matches!(
            service.capture(&clip).unwrap(),
            CaptureOutcome::Duplicate(_)
        ));
    }

    #[test]
    fn test_run_drains_queue() {
        let dir = tempfile::tempdir().unwrap();
        let store = ClipStore::open(dir.path()).unwrap();
        let service = CaptureService::new(&store, 8);

        let (tx, rx) = mpsc::channel();
        let producer = thread::spawn(move || {
            for text in ["a", "b", "a", "c"] {
                tx.send(NewClip::text("text/plain", text)).unwrap();
            }
        });

        let stats = service.run(&rx);
        producer.join().unwrap();

        assert_eq!(
            stats,
            CaptureStats {
                received: 4,
                stored: 3,
                duplicates: 1,
                failed: 0,
            }
        );
    }
}
