//! Capture pipeline services.
//!
//! - [`negotiation`]: picks and retrieves the best representation of an offer
//! - [`capture`]: persists negotiated clips off the protocol thread
//! - [`recent`]: short-lived memory of what was just persisted

pub mod capture;
pub mod negotiation;
pub mod recent;

pub use capture::{CaptureOutcome, CaptureService, CaptureStats};
pub use negotiation::{ContentNegotiator, MimeSelection, PayloadSource};
pub use recent::RecentCaptures;
