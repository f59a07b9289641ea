//! CDN Invalidator Worker
//!
//! Long-polls the configured SQS queues for CDN invalidation requests and runs
//! each batch through the retry controller:
//! - Successful invalidations are done
//! - `TooManyInvalidationsInProgress` is republished with a delay until the attempt budget runs out
//! - Anything else is logged and dropped
//!
//! Configuration comes from TOML plus environment overrides (see `cdn-config`).

mod worker;

use anyhow::{bail, Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use cdn_config::{AwsConfig, ConfigLoader};
use cdn_invalidator::cloudfront::CloudFrontInvalidationClient;
use cdn_invalidator::{BatchDispatcher, RetryController, RetryPolicy};
use cdn_queue::sqs::{SqsQueueConsumer, SqsRetryPublisher};
use cdn_queue::QueueConsumer;

use crate::worker::{run_consumer, WorkerSettings};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (for local development)
    let _ = dotenvy::dotenv();

    cdn_common::logging::init_logging("cdn-invalidator");

    info!("Starting CDN Invalidator Worker");

    let config = ConfigLoader::new().load().context("Failed to load configuration")?;

    if config.queue.queue_urls.is_empty() {
        bail!("No source queues configured (set CDN_INVALIDATOR_QUEUE_URLS or [queue].queue_urls)");
    }

    if config.metrics.enabled {
        metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(([0, 0, 0, 0], config.metrics.port))
            .install()
            .context("Failed to install Prometheus exporter")?;
        info!(port = config.metrics.port, "Prometheus exporter listening");
    }

    // 1. AWS clients
    let aws_config = load_aws_config(&config.aws).await;
    let sqs_client = aws_sdk_sqs::Client::new(&aws_config);
    let cloudfront_client = aws_sdk_cloudfront::Client::new(&aws_config);

    // 2. Retry controller
    let mut publisher = SqsRetryPublisher::new(sqs_client.clone());
    if let Some(endpoint) = config.aws.endpoint_url() {
        publisher = publisher.with_endpoint_override(endpoint);
    }

    let policy = RetryPolicy::new(config.retry.max_retries, config.retry.retry_timeout_seconds);
    info!(
        max_attempts = policy.max_attempts,
        retry_delay_seconds = policy.retry_delay_seconds,
        "Retry policy configured"
    );

    let controller = Arc::new(RetryController::new(
        Arc::new(CloudFrontInvalidationClient::new(cloudfront_client)),
        Arc::new(publisher),
        policy,
    ));
    let dispatcher = Arc::new(BatchDispatcher::new(controller));

    // 3. Queue consumers
    let mut consumers: Vec<Arc<dyn QueueConsumer>> = Vec::with_capacity(config.queue.queue_urls.len());
    for queue_url in &config.queue.queue_urls {
        let consumer = SqsQueueConsumer::connect(
            sqs_client.clone(),
            queue_url.clone(),
            config.queue.visibility_timeout as i32,
        )
        .await
        .with_context(|| format!("Failed to connect to queue {}", queue_url))?
        .with_wait_time_seconds(config.queue.wait_time_seconds as i32);

        consumers.push(Arc::new(consumer));
    }

    let settings = WorkerSettings {
        max_messages: config.queue.max_messages,
        idle_delay: if config.queue.wait_time_seconds == 0 {
            Duration::from_secs(1)
        } else {
            Duration::ZERO
        },
    };

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut workers = JoinSet::new();
    for consumer in &consumers {
        workers.spawn(run_consumer(
            consumer.clone(),
            dispatcher.clone(),
            settings,
            shutdown_rx.clone(),
        ));
    }

    info!(queues = consumers.len(), "CDN Invalidator started. Press Ctrl+C to shutdown.");

    // Wait for shutdown signal
    shutdown_signal().await;
    info!("Shutdown signal received...");

    let _ = shutdown_tx.send(true);
    for consumer in &consumers {
        consumer.stop().await;
    }

    // In-flight batches finish before the workers exit
    let drain = async {
        while let Some(result) = workers.join_next().await {
            if let Err(e) = result {
                error!(error = %e, "Queue worker task failed");
            }
        }
    };
    if tokio::time::timeout(Duration::from_secs(30), drain).await.is_err() {
        warn!("Queue workers did not stop within 30s timeout");
    }

    info!("CDN Invalidator shutdown complete");
    Ok(())
}

async fn load_aws_config(aws: &AwsConfig) -> aws_config::SdkConfig {
    let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());

    if let Some(region) = aws.region() {
        loader = loader.region(aws_config::Region::new(region.to_string()));
    }

    if let Some(endpoint_url) = aws.endpoint_url() {
        info!(endpoint = %endpoint_url, "Configuring AWS clients for custom endpoint");
        loader = loader.endpoint_url(endpoint_url);
    }

    loader.load().await
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
