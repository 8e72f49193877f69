//! Restore command: put a stored clip back on the clipboard.
//!
//! Content is piped to an external program (`wl-copy` by default) on stdin.

use crate::models::{ClipId, ClipPayload};
use crate::storage::ClipStore;
use crate::Error;
use anyhow::{Context, bail};
use std::io::Write;
use std::process::{Command, Stdio};

/// Splits a configured command line into program and arguments.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] for an empty command.
pub fn parse_command(command: &str) -> crate::Result<(String, Vec<String>)> {
    let mut parts = command.split_whitespace().map(str::to_string);
    let program = parts
        .next()
        .ok_or_else(|| Error::InvalidInput("restore command is empty".to_string()))?;
    Ok((program, parts.collect()))
}

/// Loads the bytes that restoring `id` would write.
///
/// # Errors
///
/// Returns [`Error::NotFound`] for an unknown id, or a storage error if the
/// blob file cannot be read.
pub fn restore_bytes(store: &ClipStore, id: ClipId) -> crate::Result<Vec<u8>> {
    let clip = store.get(id)?;
    match &clip.payload {
        ClipPayload::Text(text) => Ok(text.clone().into_bytes()),
        ClipPayload::Blob(blob) => store.blobs().read(blob),
    }
}

/// Pipes clip `id` into `command`.
///
/// # Errors
///
/// Returns an error if the clip cannot be loaded, the program cannot be
/// started, or it exits unsuccessfully.
pub fn execute(store: &ClipStore, id: ClipId, command: &str) -> anyhow::Result<()> {
    let bytes = restore_bytes(store, id)?;
    let (program, args) = parse_command(command)?;

    let mut child = Command::new(&program)
        .args(&args)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .spawn()
        .with_context(|| format!("starting '{program}'"))?;
    if let Some(mut stdin) = child.stdin.take() {
        stdin
            .write_all(&bytes)
            .with_context(|| format!("writing to '{program}'"))?;
    }
    let status = child
        .wait()
        .with_context(|| format!("waiting for '{program}'"))?;
    if !status.success() {
        bail!("'{program}' exited with {status}");
    }

    tracing::info!(clip.id = %id, bytes = bytes.len(), %program, "clip restored");
    Ok(())
}
