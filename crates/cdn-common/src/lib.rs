use serde::{Deserialize, Serialize};
use std::fmt;

pub mod envelope;
pub mod logging;

pub use envelope::{EnvelopeError, InvalidationPayload, TransportEnvelope};

// ============================================================================
// Routing
// ============================================================================

/// Opaque identifier of the queue a message arrived from.
///
/// For SQS this is the queue ARN. It is carried through processing untouched and
/// only interpreted by the retry publisher when it computes the retry destination.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceRoute(String);

impl SourceRoute {
    pub fn new(route: impl Into<String>) -> Self {
        Self(route.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SourceRoute {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for SourceRoute {
    fn from(value: String) -> Self {
        Self(value)
    }
}

// ============================================================================
// Core Message Types
// ============================================================================

/// A single validated unit of work: purge `path_pattern` under `target_id`.
///
/// Requests are never mutated for redelivery. A retry is produced with
/// [`InvalidationRequest::next_retry`] and travels through serialization as a
/// brand-new queue message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidationRequest {
    pub target_id: String,
    pub path_pattern: String,
    pub retry_count: u32,
    pub source_route: SourceRoute,
}

impl InvalidationRequest {
    pub fn new(
        target_id: impl Into<String>,
        path_pattern: impl Into<String>,
        source_route: SourceRoute,
    ) -> Self {
        Self {
            target_id: target_id.into(),
            path_pattern: path_pattern.into(),
            retry_count: 0,
            source_route,
        }
    }

    pub fn with_retry_count(mut self, retry_count: u32) -> Self {
        self.retry_count = retry_count;
        self
    }

    /// 1-based attempt number of this delivery.
    pub fn attempt(&self) -> u32 {
        self.retry_count.saturating_add(1)
    }

    /// Copy of this request for the next delivery, with `retry_count + 1`.
    pub fn next_retry(&self) -> Self {
        Self {
            retry_count: self.retry_count.saturating_add(1),
            ..self.clone()
        }
    }
}

/// A raw message as handed over by the queue trigger.
#[derive(Debug, Clone)]
pub struct InboundRecord {
    pub body: String,
    pub source_route: SourceRoute,
    /// Broker message ID, used for log correlation only
    pub message_id: Option<String>,
}

impl InboundRecord {
    pub fn new(body: impl Into<String>, source_route: SourceRoute) -> Self {
        Self {
            body: body.into(),
            source_route,
            message_id: None,
        }
    }

    pub fn with_message_id(mut self, message_id: impl Into<String>) -> Self {
        self.message_id = Some(message_id.into());
        self
    }
}

/// A record that has been received from a queue with tracking metadata
#[derive(Debug, Clone)]
pub struct QueuedRecord {
    pub record: InboundRecord,
    pub receipt_handle: String,
}
