//! Store metrics collection.

use metrics::{counter, histogram};

/// Metric name constants for consistency.
pub mod names {
    /// Total store operations by operation and outcome.
    pub const OPERATIONS_TOTAL: &str = "reel_store_operations_total";

    /// Store operation latency in seconds by operation.
    pub const LATENCY_SECONDS: &str = "reel_store_latency_seconds";
}

/// Record one completed store operation.
pub fn record_operation(operation: &'static str, ok: bool, latency_secs: f64) {
    counter!(
        names::OPERATIONS_TOTAL,
        "operation" => operation,
        "outcome" => if ok { "ok" } else { "error" }
    )
    .increment(1);

    histogram!(names::LATENCY_SECONDS, "operation" => operation).record(latency_secs);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_names_are_prefixed() {
        assert!(names::OPERATIONS_TOTAL.starts_with("reel_store_"));
        assert!(names::LATENCY_SECONDS.starts_with("reel_store_"));
    }

    #[test]
    fn test_record_without_recorder_is_noop() {
        record_operation("create", true, 0.002);
    }
}
