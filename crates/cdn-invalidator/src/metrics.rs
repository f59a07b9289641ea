//! Prometheus-compatible metrics for invalidation processing
//!
//! Recorded through the `metrics` facade; nothing is exported unless the process
//! installs a recorder.

use metrics::{counter, histogram};
use std::time::Duration;

/// Record the terminal outcome of one message
pub fn record_outcome(outcome: &str) {
    counter!(
        "cdn_invalidations_total",
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// Record how long the invalidation service call took
pub fn record_invalidation_latency(duration: Duration) {
    histogram!("cdn_invalidation_duration_seconds").record(duration.as_secs_f64());
}

/// Record a retry accepted by the queue
pub fn record_retry_scheduled(retry_count: u32) {
    counter!(
        "cdn_retries_scheduled_total",
        "retry_count" => retry_count.to_string()
    )
    .increment(1);
}

/// Record a retry that could not be published
pub fn record_publish_failure() {
    counter!("cdn_publish_failures_total").increment(1);
}

/// Record a processed batch
pub fn record_batch(size: usize, panicked: usize) {
    counter!("cdn_batches_total").increment(1);
    histogram!("cdn_batch_size").record(size as f64);

    if panicked > 0 {
        counter!("cdn_message_panics_total").increment(panicked as u64);
    }
}
