//! Queue polling loop
//!
//! One loop per source queue: poll a batch, hand it to the dispatcher, then delete
//! every received message. The batch acknowledgment is unconditional, so a batch
//! is always consumed as a whole; congested requests live on as republished copies.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use cdn_common::QueuedRecord;
use cdn_invalidator::BatchDispatcher;
use cdn_queue::{QueueConsumer, QueueError};

/// Longest pause between failed polls
const MAX_POLL_BACKOFF_SECS: u64 = 30;

#[derive(Debug, Clone, Copy)]
pub struct WorkerSettings {
    pub max_messages: u32,
    /// Pause after an empty poll (only needed when long polling is disabled)
    pub idle_delay: Duration,
}

pub fn poll_backoff(consecutive_errors: u32) -> Duration {
    let secs = 1u64
        .checked_shl(consecutive_errors.min(16))
        .unwrap_or(MAX_POLL_BACKOFF_SECS)
        .min(MAX_POLL_BACKOFF_SECS);
    Duration::from_secs(secs)
}

/// Poll `consumer` until shutdown is signalled or the consumer stops.
pub async fn run_consumer(
    consumer: Arc<dyn QueueConsumer>,
    dispatcher: Arc<BatchDispatcher>,
    settings: WorkerSettings,
    mut shutdown: watch::Receiver<bool>,
) {
    let queue = consumer.identifier().to_string();
    info!(queue = %queue, source_route = %consumer.source_route(), "Queue worker started");

    let mut consecutive_errors: u32 = 0;

    loop {
        if *shutdown.borrow() {
            break;
        }

        let polled = tokio::select! {
            result = consumer.poll(settings.max_messages) => result,
            _ = shutdown.changed() => break,
        };

        match polled {
            Ok(queued) if queued.is_empty() => {
                consecutive_errors = 0;
                if !settings.idle_delay.is_zero() {
                    tokio::time::sleep(settings.idle_delay).await;
                }
            }
            Ok(queued) => {
                consecutive_errors = 0;
                process_batch(consumer.as_ref(), &dispatcher, queued).await;
            }
            Err(QueueError::Stopped) => break,
            Err(e) => {
                consecutive_errors = consecutive_errors.saturating_add(1);
                let backoff = poll_backoff(consecutive_errors);
                error!(
                    queue = %queue,
                    error = %e,
                    consecutive_errors,
                    backoff_secs = backoff.as_secs(),
                    "Failed to poll queue, backing off"
                );
                tokio::select! {
                    _ = tokio::time::sleep(backoff) => {}
                    _ = shutdown.changed() => break,
                }
            }
        }
    }

    info!(queue = %queue, "Queue worker stopped");
}

async fn process_batch(consumer: &dyn QueueConsumer, dispatcher: &BatchDispatcher, queued: Vec<QueuedRecord>) {
    let (records, receipts): (Vec<_>, Vec<_>) = queued
        .into_iter()
        .map(|q| (q.record, q.receipt_handle))
        .unzip();

    let report = dispatcher.dispatch(records).await;
    debug!(
        queue = %consumer.identifier(),
        acknowledgment = report.acknowledgment(),
        "Batch acknowledged"
    );

    for receipt in receipts {
        if let Err(e) = consumer.ack(&receipt).await {
            // The message becomes visible again and is processed a second time
            warn!(queue = %consumer.identifier(), error = %e, "Failed to delete processed message");
        }
    }
}
