//! Data models for stashd.
//!
//! This module contains the clip types shared by the capture pipeline and
//! the storage engine.

mod clip;
mod hash;

pub use clip::{BlobRef, Clip, ClipBody, ClipId, ClipPayload, NewClip};
pub use hash::ContentHash;
