//! Batch Dispatcher
//!
//! Runs every record of a batch on its own task and waits for all of them. A
//! record that panics is counted and logged; it never takes the rest of the batch
//! down with it. The caller always receives the same acknowledgment.

use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{error, info, Instrument};

use cdn_common::InboundRecord;

use crate::controller::{DropReason, MessageOutcome, RetryController};
use crate::metrics;

/// Acknowledgment returned for every batch, whatever happened to its records.
pub const BATCH_ACK: &str = "A-OK";

/// Summary of a processed batch
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub total: usize,
    pub completed: usize,
    pub retrying: usize,
    pub dropped: usize,
    pub malformed: usize,
    pub panicked: usize,
    /// Outcomes in completion order, not input order
    pub outcomes: Vec<MessageOutcome>,
}

impl BatchReport {
    pub fn acknowledgment(&self) -> &'static str {
        BATCH_ACK
    }

    fn record(&mut self, outcome: MessageOutcome) {
        match &outcome {
            MessageOutcome::Completed(_) => self.completed += 1,
            MessageOutcome::Retrying { .. } => self.retrying += 1,
            MessageOutcome::Dropped(reason) => {
                self.dropped += 1;
                if matches!(reason, DropReason::Malformed(_)) {
                    self.malformed += 1;
                }
            }
        }
        self.outcomes.push(outcome);
    }
}

pub struct BatchDispatcher {
    controller: Arc<RetryController>,
}

impl BatchDispatcher {
    pub fn new(controller: Arc<RetryController>) -> Self {
        Self { controller }
    }

    /// Process a batch concurrently and wait until every record reaches a terminal state.
    pub async fn dispatch(&self, records: Vec<InboundRecord>) -> BatchReport {
        let mut report = BatchReport {
            total: records.len(),
            ..Default::default()
        };

        if records.is_empty() {
            return report;
        }

        let mut tasks = JoinSet::new();
        for record in records {
            let controller = self.controller.clone();
            tasks.spawn(async move { controller.process(&record).await }.in_current_span());
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => report.record(outcome),
                Err(e) => {
                    report.panicked += 1;
                    error!(error = %e, panicked = e.is_panic(), "Message processing task failed");
                }
            }
        }

        metrics::record_batch(report.total, report.panicked);
        info!(
            total = report.total,
            completed = report.completed,
            retrying = report.retrying,
            dropped = report.dropped,
            panicked = report.panicked,
            "Batch processed"
        );

        report
    }
}
