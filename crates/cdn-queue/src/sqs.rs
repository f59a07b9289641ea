use async_trait::async_trait;
use aws_sdk_sqs::{types::Message as SqsMessage, types::QueueAttributeName, Client};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tracing::{debug, error, info};

use cdn_common::{envelope, InboundRecord, InvalidationRequest, QueuedRecord, SourceRoute};

use crate::{QueueConsumer, QueueError, QueueRoute, Result, RetryPublisher};

/// AWS SQS queue consumer
pub struct SqsQueueConsumer {
    client: Client,
    queue_url: String,
    queue_name: String,
    source_route: SourceRoute,
    visibility_timeout_seconds: i32,
    wait_time_seconds: i32,
    running: AtomicBool,
    total_polled: AtomicU64,
    total_acked: AtomicU64,
}

impl SqsQueueConsumer {
    /// Default long poll wait time in seconds (SQS max is 20).
    pub const DEFAULT_WAIT_TIME_SECONDS: i32 = 20;

    pub fn new(
        client: Client,
        queue_url: String,
        source_route: SourceRoute,
        visibility_timeout_seconds: i32,
    ) -> Self {
        let queue_name = queue_url
            .rsplit('/')
            .next()
            .unwrap_or("unknown")
            .to_string();

        Self {
            client,
            queue_url,
            queue_name,
            source_route,
            visibility_timeout_seconds,
            wait_time_seconds: Self::DEFAULT_WAIT_TIME_SECONDS,
            running: AtomicBool::new(true),
            total_polled: AtomicU64::new(0),
            total_acked: AtomicU64::new(0),
        }
    }

    /// Create from a queue URL, resolving the queue ARN used as source route.
    pub async fn connect(client: Client, queue_url: String, visibility_timeout_seconds: i32) -> Result<Self> {
        let result = client
            .get_queue_attributes()
            .queue_url(&queue_url)
            .attribute_names(QueueAttributeName::QueueArn)
            .send()
            .await
            .map_err(|e| QueueError::Sqs(e.to_string()))?;

        let arn = result
            .attributes()
            .and_then(|attrs| attrs.get(&QueueAttributeName::QueueArn))
            .cloned()
            .ok_or_else(|| QueueError::Config(format!("Queue {} did not report its ARN", queue_url)))?;

        info!(queue_url = %queue_url, queue_arn = %arn, "Resolved SQS queue ARN");

        Ok(Self::new(client, queue_url, SourceRoute::new(arn), visibility_timeout_seconds))
    }

    /// Set the long poll wait time in seconds (max 20).
    pub fn with_wait_time_seconds(mut self, seconds: i32) -> Self {
        self.wait_time_seconds = seconds.clamp(0, 20);
        self
    }

    pub fn total_polled(&self) -> u64 {
        self.total_polled.load(Ordering::Relaxed)
    }

    pub fn total_acked(&self) -> u64 {
        self.total_acked.load(Ordering::Relaxed)
    }

    fn to_record(&self, sqs_msg: SqsMessage) -> Option<QueuedRecord> {
        let Some(receipt_handle) = sqs_msg.receipt_handle().map(str::to_string) else {
            error!(queue = %self.queue_name, "SQS message without receipt handle, skipping");
            return None;
        };

        // An absent body is left for the decoder to reject as malformed
        let mut record = InboundRecord::new(
            sqs_msg.body().unwrap_or_default(),
            self.source_route.clone(),
        );
        if let Some(id) = sqs_msg.message_id() {
            record = record.with_message_id(id);
        }

        Some(QueuedRecord {
            record,
            receipt_handle,
        })
    }
}

#[async_trait]
impl QueueConsumer for SqsQueueConsumer {
    fn identifier(&self) -> &str {
        &self.queue_name
    }

    fn source_route(&self) -> &SourceRoute {
        &self.source_route
    }

    async fn poll(&self, max_messages: u32) -> Result<Vec<QueuedRecord>> {
        if !self.running.load(Ordering::SeqCst) {
            return Err(QueueError::Stopped);
        }

        let result = self
            .client
            .receive_message()
            .queue_url(&self.queue_url)
            .max_number_of_messages(max_messages.clamp(1, 10) as i32)
            .visibility_timeout(self.visibility_timeout_seconds)
            .wait_time_seconds(self.wait_time_seconds)
            .send()
            .await
            .map_err(|e| QueueError::Sqs(e.to_string()))?;

        let records: Vec<QueuedRecord> = result
            .messages
            .unwrap_or_default()
            .into_iter()
            .filter_map(|msg| self.to_record(msg))
            .collect();

        if !records.is_empty() {
            self.total_polled.fetch_add(records.len() as u64, Ordering::Relaxed);
            debug!(queue = %self.queue_name, count = records.len(), "Polled messages from SQS");
        }

        Ok(records)
    }

    async fn ack(&self, receipt_handle: &str) -> Result<()> {
        self.client
            .delete_message()
            .queue_url(&self.queue_url)
            .receipt_handle(receipt_handle)
            .send()
            .await
            .map_err(|e| QueueError::Sqs(e.to_string()))?;

        self.total_acked.fetch_add(1, Ordering::Relaxed);
        debug!(queue = %self.queue_name, "Message deleted from SQS");
        Ok(())
    }

    fn is_healthy(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    async fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        info!(
            queue = %self.queue_name,
            total_polled = self.total_polled(),
            total_acked = self.total_acked(),
            "SQS queue consumer stopped"
        );
    }
}

/// Publishes retries back to the originating SQS queue with `DelaySeconds`.
pub struct SqsRetryPublisher {
    client: Client,
    endpoint_override: Option<String>,
}

impl SqsRetryPublisher {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            endpoint_override: None,
        }
    }

    /// Build queue URLs against a custom endpoint (LocalStack) instead of AWS.
    pub fn with_endpoint_override(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint_override = Some(endpoint.into());
        self
    }
}

#[async_trait]
impl RetryPublisher for SqsRetryPublisher {
    async fn publish(&self, request: &InvalidationRequest, delay_seconds: u32) -> Result<String> {
        let route = QueueRoute::from_arn(request.source_route.as_str())?;
        let queue_url = route.queue_url(self.endpoint_override.as_deref());
        let body = envelope::seal(request)?;

        let result = self
            .client
            .send_message()
            .queue_url(&queue_url)
            .message_body(body)
            .delay_seconds(delay_seconds.min(900) as i32)
            .send()
            .await
            .map_err(|e| QueueError::Sqs(e.to_string()))?;

        let message_id = result.message_id().unwrap_or_default().to_string();
        debug!(
            queue_url = %queue_url,
            message_id = %message_id,
            retry_count = request.retry_count,
            delay_seconds,
            "Retry published to SQS"
        );
        Ok(message_id)
    }
}
