//! Connection handling for the clip store.
//!
//! Provides mutex acquisition with poison recovery, pragma configuration,
//! and the bounded busy retry used around write transactions.

use crate::{Error, Result};
use rusqlite::{Connection, ErrorCode};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

const RETRY_INITIAL_DELAY: Duration = Duration::from_millis(10);
const RETRY_MAX_DELAY: Duration = Duration::from_millis(250);

/// Acquires a mutex lock with poison recovery.
///
/// A panic in a previous critical section leaves the connection usable, so
/// the inner value is recovered and a warning is logged.
pub fn acquire_lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            tracing::warn!("SQLite mutex was poisoned, recovering");
            metrics::counter!("sqlite_mutex_poison_recovery_total").increment(1);
            poisoned.into_inner()
        },
    }
}

/// Configures a connection for concurrent use by several daemon processes.
///
/// - **WAL mode**: readers never block the single writer
/// - **NORMAL synchronous**: durable across application crashes
/// - **`busy_timeout`**: `SQLite` waits internally before reporting `SQLITE_BUSY`
///
/// # Errors
///
/// Returns [`Error::Storage`] if the busy timeout cannot be set.
pub fn configure_connection(conn: &Connection, busy_timeout: Duration) -> Result<()> {
    conn.busy_timeout(busy_timeout)
        .map_err(|e| Error::storage("configure_connection", e))?;
    // journal_mode returns a row, and in-memory databases refuse WAL; ignore both.
    let _ = conn.pragma_update(None, "journal_mode", "WAL");
    let _ = conn.pragma_update(None, "synchronous", "NORMAL");
    Ok(())
}

/// Returns true for transient lock contention errors.
#[must_use]
pub fn is_busy(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if matches!(e.code, ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked)
    )
}

/// Runs `op`, retrying with exponential backoff while it reports
/// `SQLITE_BUSY` or `SQLITE_LOCKED`, for at most `budget`.
///
/// # Errors
///
/// Returns the last error once the budget is spent, or any non-busy error
/// immediately.
pub fn with_busy_retry<T>(
    budget: Duration,
    mut op: impl FnMut() -> rusqlite::Result<T>,
) -> rusqlite::Result<T> {
    let start = Instant::now();
    let mut delay = RETRY_INITIAL_DELAY;
    let mut attempt = 1_u32;

    loop {
        match op() {
            Err(e) if is_busy(&e) && start.elapsed() < budget => {
                metrics::counter!("sqlite_busy_retries_total").increment(1);
                tracing::debug!(attempt, delay_ms = delay.as_millis(), "database busy, retrying");
                std::thread::sleep(delay.min(budget.saturating_sub(start.elapsed())));
                delay = (delay * 2).min(RETRY_MAX_DELAY);
                attempt += 1;
            },
            other => return other,
        }
    }
}

/// Runs `body` inside a `BEGIN IMMEDIATE` transaction.
///
/// Acquiring the write lock is retried within `budget`. The transaction is
/// committed when `body` succeeds and rolled back otherwise.
///
/// # Errors
///
/// Returns the error from `body`, or [`Error::Storage`] if the transaction
/// cannot be opened or committed.
pub fn in_transaction<T>(
    conn: &Connection,
    budget: Duration,
    body: impl FnOnce(&Connection) -> Result<T>,
) -> Result<T> {
    with_busy_retry(budget, || conn.execute_batch("BEGIN IMMEDIATE"))
        .map_err(|e| Error::storage("begin_transaction", e))?;

    let result = body(conn);

    if result.is_ok() {
        if let Err(e) = with_busy_retry(budget, || conn.execute_batch("COMMIT")) {
            let _ = conn.execute_batch("ROLLBACK");
            return Err(Error::storage("commit_transaction", e));
        }
    } else {
        let _ = conn.execute_batch("ROLLBACK");
    }

    result
}
