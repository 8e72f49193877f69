//! Content-addressed blob files.
//!
//! Each binary payload is written once to `<storage root>/blob/<hash>`, where
//! `<hash>` is the 16-digit hex XXH3 digest of the raw bytes.

use crate::models::{BlobRef, ContentHash};
use crate::{Error, Result};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Directory of write-once blob files.
#[derive(Debug, Clone)]
pub struct BlobStore {
    dir: PathBuf,
}

/// Result of [`BlobStore::write`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlob {
    /// Where the bytes live.
    pub blob: BlobRef,
    /// False when an identical file already existed.
    pub written: bool,
}

impl BlobStore {
    /// Creates a blob store rooted at `dir`. Nothing is created on disk yet.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The blob directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path a blob with the given hash is stored at.
    #[must_use]
    pub fn path_for(&self, hash: ContentHash) -> PathBuf {
        self.dir.join(hash.to_string())
    }

    /// Stores `bytes`, skipping the write if the file already exists.
    ///
    /// New files are written to a temporary name and renamed into place, so a
    /// crash never leaves a truncated blob under its final name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if the directory or file cannot be written.
    pub fn write(&self, bytes: &[u8]) -> Result<StoredBlob> {
        let hash = ContentHash::of_bytes(bytes);
        let path = self.path_for(hash);
        let blob = BlobRef {
            hash,
            path: path.clone(),
        };

        if path.exists() {
            tracing::debug!(blob = %hash, "blob already present");
            return Ok(StoredBlob {
                blob,
                written: false,
            });
        }

        std::fs::create_dir_all(&self.dir).map_err(|e| Error::storage("create_blob_dir", e))?;

        let tmp = self
            .dir
            .join(format!(".{hash}.{}.tmp", std::process::id()));
        write_file(&tmp, bytes)
            .and_then(|()| std::fs::rename(&tmp, &path))
            .map_err(|e| {
                let _ = std::fs::remove_file(&tmp);
                Error::storage("write_blob", format!("{}: {e}", path.display()))
            })?;

        tracing::debug!(blob = %hash, size = bytes.len(), "blob written");
        Ok(StoredBlob {
            blob,
            written: true,
        })
    }

    /// Reads a blob back.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if the file cannot be read.
    pub fn read(&self, blob: &BlobRef) -> Result<Vec<u8>> {
        std::fs::read(&blob.path)
            .map_err(|e| Error::storage("read_blob", format!("{}: {e}", blob.path.display())))
    }

    /// Removes a blob file. A file that is already gone counts as removed.
    ///
    /// # Errors
    ///
    /// Returns the I/O error for any other failure.
    pub fn remove(path: &Path) -> io::Result<()> {
        match std::fs::remove_file(path) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }

    /// Removes the whole blob directory tree.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if the tree exists but cannot be removed.
    pub fn wipe(&self) -> Result<()> {
        match std::fs::remove_dir_all(&self.dir) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(Error::storage("wipe_blobs", e)),
            _ => Ok(()),
        }
    }
}

fn write_file(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut file = std::fs::File::create(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}
