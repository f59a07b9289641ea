//! Retry Controller
//!
//! Runs one inbound record through `Received → Dispatched → {Completed, Retrying, Dropped}`:
//!
//! 1. decode; a malformed record is dropped before any call is made
//! 2. invalidate
//! 3. success → `Completed`
//! 4. terminal failure → `Dropped`, logged and swallowed
//! 5. congestion → republish a copy with `retry_count + 1` after the configured
//!    delay, unless the attempt budget is spent
//!
//! Nothing is returned as an error: every path ends in a [`MessageOutcome`] and a
//! log line.

use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, info_span, warn, Instrument};

use cdn_common::{InboundRecord, InvalidationRequest};
use cdn_queue::RetryPublisher;

use crate::client::{ClassifiedOutcome, FailureReason, InvalidationClient, InvalidationReceipt};
use crate::decoder;
use crate::metrics;

/// Attempt budget and delay for congestion retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per logical request, first delivery included
    pub max_attempts: u32,
    /// Delivery delay for a republished retry
    pub retry_delay_seconds: u32,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, retry_delay_seconds: u32) -> Self {
        Self {
            max_attempts,
            retry_delay_seconds,
        }
    }

    /// Whether a request on delivery `retry_count` may be retried once more.
    ///
    /// With `max_attempts = N` retries `1..N-1` are allowed, so at most N attempts
    /// happen in total.
    pub fn allows_retry(&self, retry_count: u32) -> bool {
        retry_count.saturating_add(1) < self.max_attempts
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(5, 60)
    }
}

/// Why a message was dropped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropReason {
    Malformed(String),
    /// Non-retryable failure reported by the invalidation service
    Rejected(FailureReason),
    RetryExhausted { attempts: u32 },
    /// Congestion retry could not be re-enqueued; the request is lost
    PublishFailed(String),
}

/// Local terminal state of one inbound record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageOutcome {
    Completed(InvalidationReceipt),
    /// A copy with `retry_count` was re-enqueued
    Retrying { retry_count: u32, message_id: String },
    Dropped(DropReason),
}

impl MessageOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            MessageOutcome::Completed(_) => "completed",
            MessageOutcome::Retrying { .. } => "retrying",
            MessageOutcome::Dropped(DropReason::Malformed(_)) => "malformed",
            MessageOutcome::Dropped(DropReason::Rejected(_)) => "rejected",
            MessageOutcome::Dropped(DropReason::RetryExhausted { .. }) => "retry_exhausted",
            MessageOutcome::Dropped(DropReason::PublishFailed(_)) => "publish_failed",
        }
    }
}

pub struct RetryController {
    client: Arc<dyn InvalidationClient>,
    publisher: Arc<dyn RetryPublisher>,
    policy: RetryPolicy,
}

impl RetryController {
    pub fn new(
        client: Arc<dyn InvalidationClient>,
        publisher: Arc<dyn RetryPublisher>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            client,
            publisher,
            policy,
        }
    }

    /// Process a single inbound record to a terminal local state.
    pub async fn process(&self, record: &InboundRecord) -> MessageOutcome {
        let outcome = match decoder::decode(record) {
            Ok(request) => {
                let span = info_span!(
                    "invalidation",
                    target_id = %request.target_id,
                    path = %request.path_pattern,
                    retry_count = request.retry_count,
                );
                self.dispatch(request).instrument(span).await
            }
            Err(e) => {
                warn!(
                    message_id = record.message_id.as_deref().unwrap_or("unknown"),
                    error = %e,
                    "Dropping message with bad format, expected {{\"distribution_id\": \"<id>\", \"path\": \"/a/path/*\"}}"
                );
                MessageOutcome::Dropped(DropReason::Malformed(e.to_string()))
            }
        };

        metrics::record_outcome(outcome.label());
        outcome
    }

    async fn dispatch(&self, request: InvalidationRequest) -> MessageOutcome {
        debug!(attempt = request.attempt(), "Dispatching invalidation");

        let started = Instant::now();
        let classified = self.client.invalidate(&request).await;
        metrics::record_invalidation_latency(started.elapsed());

        match classified {
            ClassifiedOutcome::Success(receipt) => {
                info!(
                    invalidation_id = receipt.invalidation_id.as_deref().unwrap_or("unknown"),
                    status = receipt.status.as_deref().unwrap_or("unknown"),
                    "Invalidation created"
                );
                MessageOutcome::Completed(receipt)
            }
            ClassifiedOutcome::TerminalFailure(reason) => {
                warn!(
                    kind = %reason.kind,
                    reason = %reason.message,
                    "Ignoring non-retryable invalidation failure"
                );
                MessageOutcome::Dropped(DropReason::Rejected(reason))
            }
            ClassifiedOutcome::RetryableFailure(reason) => self.schedule_retry(&request, &reason).await,
        }
    }

    async fn schedule_retry(&self, request: &InvalidationRequest, reason: &FailureReason) -> MessageOutcome {
        if !self.policy.allows_retry(request.retry_count) {
            warn!(
                attempts = request.attempt(),
                max_attempts = self.policy.max_attempts,
                reason = %reason,
                "Failed after {} attempts, giving up",
                request.attempt()
            );
            return MessageOutcome::Dropped(DropReason::RetryExhausted {
                attempts: request.attempt(),
            });
        }

        let retry = request.next_retry();
        match self.publisher.publish(&retry, self.policy.retry_delay_seconds).await {
            Ok(message_id) => {
                metrics::record_retry_scheduled(retry.retry_count);
                info!(
                    next_retry_count = retry.retry_count,
                    delay_seconds = self.policy.retry_delay_seconds,
                    message_id = %message_id,
                    "Invalidation congested, retry scheduled"
                );
                MessageOutcome::Retrying {
                    retry_count: retry.retry_count,
                    message_id,
                }
            }
            Err(e) => {
                metrics::record_publish_failure();
                error!(
                    error = %e,
                    source_route = %retry.source_route,
                    "Failed to publish retry, request is lost"
                );
                MessageOutcome::Dropped(DropReason::PublishFailed(e.to_string()))
            }
        }
    }
}
