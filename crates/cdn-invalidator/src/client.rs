//! Invalidation client contract and failure classification
//!
//! The CDN rejects overlapping invalidations once a distribution has too many in
//! progress. That single condition is worth retrying later; every other failure
//! (unknown distribution, access denied, bad path, transport) is terminal.

use async_trait::async_trait;
use chrono::Utc;
use std::fmt;
use uuid::Uuid;

use cdn_common::InvalidationRequest;

/// Failure kinds reported by the invalidation service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// Concurrency quota for the distribution is exhausted
    TooManyInvalidationsInProgress,
    NoSuchDistribution,
    AccessDenied,
    InvalidArgument,
    BatchTooLarge,
    /// The call never produced a service response (DNS, TLS, timeout, ...)
    Transport,
    Other,
}

impl FailureKind {
    /// Map a service error code onto a failure kind.
    pub fn from_error_code(code: &str) -> Self {
        match code {
            "TooManyInvalidationsInProgress" => FailureKind::TooManyInvalidationsInProgress,
            "NoSuchDistribution" => FailureKind::NoSuchDistribution,
            "AccessDenied" => FailureKind::AccessDenied,
            "InvalidArgument" | "MissingBody" | "InconsistentQuantities" => {
                FailureKind::InvalidArgument
            }
            "BatchTooLarge" => FailureKind::BatchTooLarge,
            _ => FailureKind::Other,
        }
    }

    pub fn is_retryable(self) -> bool {
        matches!(self, FailureKind::TooManyInvalidationsInProgress)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FailureKind::TooManyInvalidationsInProgress => "TooManyInvalidationsInProgress",
            FailureKind::NoSuchDistribution => "NoSuchDistribution",
            FailureKind::AccessDenied => "AccessDenied",
            FailureKind::InvalidArgument => "InvalidArgument",
            FailureKind::BatchTooLarge => "BatchTooLarge",
            FailureKind::Transport => "Transport",
            FailureKind::Other => "Other",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureReason {
    pub kind: FailureKind,
    pub message: String,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// What the service returned for an accepted invalidation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvalidationReceipt {
    pub invalidation_id: Option<String>,
    pub status: Option<String>,
}

/// Result of one invalidation attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassifiedOutcome {
    Success(InvalidationReceipt),
    RetryableFailure(FailureReason),
    TerminalFailure(FailureReason),
}

impl ClassifiedOutcome {
    /// Classify a failure; only congestion becomes retryable.
    pub fn failure(kind: FailureKind, message: impl Into<String>) -> Self {
        let reason = FailureReason {
            kind,
            message: message.into(),
        };
        if kind.is_retryable() {
            ClassifiedOutcome::RetryableFailure(reason)
        } else {
            ClassifiedOutcome::TerminalFailure(reason)
        }
    }
}

/// Provider-facing invalidation batch: one path, fresh caller reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidationBatchRequest {
    pub target_id: String,
    pub paths: Vec<String>,
    pub caller_reference: String,
}

impl InvalidationBatchRequest {
    pub fn for_request(request: &InvalidationRequest) -> Self {
        Self {
            target_id: request.target_id.clone(),
            paths: vec![request.path_pattern.clone()],
            caller_reference: caller_reference(),
        }
    }
}

/// Millisecond timestamp with a short random suffix so two calls in the same
/// millisecond do not collide.
pub fn caller_reference() -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}-{}", Utc::now().timestamp_millis(), &suffix[..8])
}

/// Issues exactly one invalidation call per request.
#[async_trait]
pub trait InvalidationClient: Send + Sync {
    async fn invalidate(&self, request: &InvalidationRequest) -> ClassifiedOutcome;
}
