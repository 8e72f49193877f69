//! Metrics recording for clip store operations.

use crate::Result;
use std::time::Instant;

const BACKEND: &str = "sqlite";

/// Records `storage_operations_total` and `storage_operation_duration_ms`
/// for one operation.
pub fn record_operation_metrics(
    backend: &'static str,
    operation: &'static str,
    start: Instant,
    status: &'static str,
) {
    metrics::counter!(
        "storage_operations_total",
        "backend" => backend,
        "operation" => operation,
        "status" => status
    )
    .increment(1);
    metrics::histogram!(
        "storage_operation_duration_ms",
        "backend" => backend,
        "operation" => operation,
        "status" => status
    )
    .record(start.elapsed().as_secs_f64() * 1000.0);
}

/// Runs `f` and records its outcome and latency under `operation`.
pub fn timed<T>(operation: &'static str, f: impl FnOnce() -> Result<T>) -> Result<T> {
    let start = Instant::now();
    let result = f();
    let status = if result.is_ok() { "success" } else { "error" };
    record_operation_metrics(BACKEND, operation, start, status);
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn test_timed_passes_result_through() {
        assert_eq!(timed("get", || Ok(5)).unwrap(), 5);
        let err: Result<()> = timed("get", || Err(Error::InvalidInput("x".to_string())));
        assert!(err.is_err());
    }

    #[test]
    fn test_record_without_recorder_is_noop() {
        record_operation_metrics("sqlite", "search", Instant::now(), "success");
    }
}
