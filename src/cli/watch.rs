//! Watch command: the capture daemon.
//!
//! The protocol session runs on its own thread and hands negotiated clips
//! over a channel; the calling thread persists them. Firing the cancel token
//! closes the session, which drops the sender and ends the capture loop.

use crate::config::StashConfig;
use crate::services::{CaptureService, CaptureStats};
use crate::storage::ClipStore;
use crate::wayland::{CancelToken, ClipboardSession};
use anyhow::{Context, anyhow};
use std::sync::mpsc;
use std::thread;

/// Runs the daemon until `cancel` fires or the session fails.
///
/// # Errors
///
/// Returns an error if the compositor cannot be reached, lacks the
/// data-control protocol, or dispatch fails. Clips persisted before the
/// failure are kept.
pub fn execute(
    config: &StashConfig,
    store: &ClipStore,
    cancel: &CancelToken,
) -> anyhow::Result<CaptureStats> {
    let (sink, clips) = mpsc::channel();
    let primary_selection = config.primary_selection;
    let token = cancel.clone();

    let protocol = thread::Builder::new()
        .name("stashd-wayland".to_string())
        .spawn(move || -> crate::Result<()> {
            let mut session = ClipboardSession::new();
            session.connect()?;
            session.discover()?;
            session.bind(primary_selection)?;
            tracing::info!(primary_selection, "watching clipboard");
            session.listen(sink, &token)
        })
        .context("spawning protocol thread")?;

    let stats = CaptureService::new(store, config.recent_capacity).run(&clips);
    let outcome = protocol
        .join()
        .map_err(|_| anyhow!("protocol thread panicked"))?;

    tracing::info!(
        received = stats.received,
        stored = stats.stored,
        duplicates = stats.duplicates,
        failed = stats.failed,
        total = store.count().unwrap_or_default(),
        "watch stopped"
    );
    outcome.context("clipboard session")?;
    Ok(stats)
}
