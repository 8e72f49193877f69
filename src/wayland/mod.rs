//! Wayland `wlr-data-control` client.
//!
//! [`ClipboardSession`] owns the compositor connection and drives the
//! protocol; [`CancelToken`] and [`CloseHandle`] stop it from another thread.

mod cancel;
mod offer;
mod registry;
mod session;

pub use cancel::{CancelToken, CloseHandle};
pub use offer::{OfferPipe, OfferTable, PendingOffer};
pub use registry::{Global, GlobalRegistry};
pub use session::{ClipboardSession, DeviceEvent, SelectionKind, SessionState, WatchState};
