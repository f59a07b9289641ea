use async_trait::async_trait;
use cdn_common::{InvalidationRequest, QueuedRecord, SourceRoute};

pub mod error;
pub mod routing;

#[cfg(feature = "sqs")]
pub mod sqs;

pub use error::QueueError;
pub use routing::QueueRoute;

pub type Result<T> = std::result::Result<T, QueueError>;

/// Trait for consuming raw invalidation records from a queue
#[async_trait]
pub trait QueueConsumer: Send + Sync {
    /// Get the unique identifier for this consumer
    fn identifier(&self) -> &str;

    /// Route attached to every record this consumer receives
    fn source_route(&self) -> &SourceRoute;

    /// Poll for records from the queue
    async fn poll(&self, max_messages: u32) -> Result<Vec<QueuedRecord>>;

    /// Acknowledge a record (remove from queue)
    async fn ack(&self, receipt_handle: &str) -> Result<()>;

    /// Check if the consumer is healthy
    fn is_healthy(&self) -> bool;

    /// Stop the consumer
    async fn stop(&self);
}

/// Re-enqueues a request for a later delivery attempt.
///
/// Implementations must write the same two-layer envelope the decoder reads
/// (see [`cdn_common::envelope::seal`]) and derive the destination from the
/// request's `source_route`, so one publisher serves every source queue.
#[async_trait]
pub trait RetryPublisher: Send + Sync {
    /// Publish `request` with an advisory delivery delay. Returns the broker message ID.
    async fn publish(&self, request: &InvalidationRequest, delay_seconds: u32) -> Result<String>;
}
