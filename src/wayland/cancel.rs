//! Cooperative cancellation for the watch loop.
//!
//! [`CancelToken`] is the out-of-band stop signal. [`CloseHandle`] is what a
//! watcher thread uses to act on it: it raises the closed-by-us flag and then
//! shuts the compositor socket down, which wakes a dispatch blocked on read.

use std::net::Shutdown;
use std::os::unix::net::UnixStream;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};

/// A clonable, one-shot stop signal.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl CancelToken {
    /// Creates an unfired token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fires the token and wakes every waiter. Repeated calls are harmless.
    pub fn cancel(&self) {
        let (lock, cvar) = &*self.inner;
        *lock.lock().unwrap_or_else(PoisonError::into_inner) = true;
        cvar.notify_all();
    }

    /// True once [`CancelToken::cancel`] has been called.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.inner.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Blocks until the token fires.
    pub fn wait(&self) {
        let (lock, cvar) = &*self.inner;
        let mut fired = lock.lock().unwrap_or_else(PoisonError::into_inner);
        while !*fired {
            fired = cvar.wait(fired).unwrap_or_else(PoisonError::into_inner);
        }
    }
}

/// Closes a session's transport from another thread.
#[derive(Debug, Clone)]
pub struct CloseHandle {
    closed: Arc<AtomicBool>,
    socket: Arc<UnixStream>,
}

impl CloseHandle {
    /// Wraps a duplicate of the session socket and its closed flag.
    #[must_use]
    pub fn new(socket: UnixStream, closed: Arc<AtomicBool>) -> Self {
        Self {
            closed,
            socket: Arc::new(socket),
        }
    }

    /// Marks the session closed-by-us, then shuts the socket down.
    ///
    /// Safe to call concurrently with a blocked read on the same socket, and
    /// more than once.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        if let Err(e) = self.socket.shutdown(Shutdown::Both) {
            tracing::debug!(error = %e, "socket already shut down");
        }
    }

    /// True once the session was closed by us.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}
