//! Amazon CloudFront invalidation client
//!
//! One `CreateInvalidation` call per request; failures are classified by service error code.

use async_trait::async_trait;
use aws_sdk_cloudfront::error::{BuildError, DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_cloudfront::types::{InvalidationBatch, Paths};
use aws_sdk_cloudfront::Client;
use tracing::debug;

use cdn_common::InvalidationRequest;

use crate::client::{
    ClassifiedOutcome, FailureKind, InvalidationBatchRequest, InvalidationClient, InvalidationReceipt,
};

/// Amazon CloudFront `CreateInvalidation` client
pub struct CloudFrontInvalidationClient {
    client: Client,
}

impl CloudFrontInvalidationClient {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

fn to_sdk_batch(batch: &InvalidationBatchRequest) -> Result<InvalidationBatch, BuildError> {
    let paths = Paths::builder()
        .quantity(batch.paths.len() as i32)
        .set_items(Some(batch.paths.clone()))
        .build()?;

    InvalidationBatch::builder()
        .paths(paths)
        .caller_reference(&batch.caller_reference)
        .build()
}

/// Service errors are classified by their error code; anything that never
/// reached the service is a transport failure.
fn classify<E, R>(err: &SdkError<E, R>) -> ClassifiedOutcome
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    match err {
        SdkError::ServiceError(ctx) => {
            let code = ctx.err().code().unwrap_or("Unknown");
            let message = ctx.err().message().unwrap_or(code);
            ClassifiedOutcome::failure(FailureKind::from_error_code(code), message)
        }
        other => ClassifiedOutcome::failure(
            FailureKind::Transport,
            DisplayErrorContext(other).to_string(),
        ),
    }
}

#[async_trait]
impl InvalidationClient for CloudFrontInvalidationClient {
    async fn invalidate(&self, request: &InvalidationRequest) -> ClassifiedOutcome {
        let batch = InvalidationBatchRequest::for_request(request);

        let sdk_batch = match to_sdk_batch(&batch) {
            Ok(sdk_batch) => sdk_batch,
            Err(e) => return ClassifiedOutcome::failure(FailureKind::InvalidArgument, e.to_string()),
        };

        debug!(
            distribution_id = %batch.target_id,
            caller_reference = %batch.caller_reference,
            "Creating CloudFront invalidation"
        );

        match self
            .client
            .create_invalidation()
            .distribution_id(&batch.target_id)
            .invalidation_batch(sdk_batch)
            .send()
            .await
        {
            Ok(output) => {
                let invalidation = output.invalidation();
                ClassifiedOutcome::Success(InvalidationReceipt {
                    invalidation_id: invalidation.map(|i| i.id().to_string()),
                    status: invalidation.map(|i| i.status().to_string()),
                })
            }
            Err(e) => classify(&e),
        }
    }
}
