//! CDN Invalidator
//!
//! Turns queued "invalidate this path" notifications into CDN invalidation calls and
//! retries the ones rejected for congestion:
//! - decoder: two-layer envelope to validated [`InvalidationRequest`]
//! - client: invalidation call with closed failure classification
//! - controller: bounded retry state machine, requeueing through a [`RetryPublisher`]
//! - dispatcher: concurrent, isolated processing of a batch of records
//! - cloudfront: Amazon CloudFront client (feature `cloudfront`)

pub mod client;
pub mod controller;
pub mod decoder;
pub mod dispatcher;
pub mod error;
pub mod metrics;

#[cfg(feature = "cloudfront")]
pub mod cloudfront;

pub use client::{
    ClassifiedOutcome, FailureKind, FailureReason, InvalidationBatchRequest, InvalidationClient,
    InvalidationReceipt,
};
pub use controller::{DropReason, MessageOutcome, RetryController, RetryPolicy};
pub use decoder::decode;
pub use dispatcher::{BatchDispatcher, BatchReport, BATCH_ACK};
pub use error::MalformedMessage;

pub use cdn_common::{InboundRecord, InvalidationRequest, SourceRoute};
pub use cdn_queue::RetryPublisher;
