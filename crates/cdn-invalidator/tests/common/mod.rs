//! Recording fakes for the invalidation client and retry publisher.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use cdn_common::envelope;
use cdn_invalidator::{
    ClassifiedOutcome, FailureKind, InboundRecord, InvalidationClient, InvalidationReceipt,
    InvalidationRequest, RetryController, RetryPolicy, RetryPublisher, SourceRoute,
};
use cdn_queue::QueueError;

pub const SOURCE_ARN: &str = "arn:aws:sqs:us-east-1:123456789012:cdn-invalidations";

pub fn success() -> ClassifiedOutcome {
    ClassifiedOutcome::Success(InvalidationReceipt {
        invalidation_id: Some("I2J0I21PCUYOIK".to_string()),
        status: Some("InProgress".to_string()),
    })
}

pub fn congestion() -> ClassifiedOutcome {
    ClassifiedOutcome::failure(
        FailureKind::TooManyInvalidationsInProgress,
        "too many invalidations in progress",
    )
}

pub fn not_found() -> ClassifiedOutcome {
    ClassifiedOutcome::failure(FailureKind::NoSuchDistribution, "The specified distribution does not exist.")
}

pub fn sns_record(inner: serde_json::Value) -> InboundRecord {
    let body = serde_json::json!({
        "Type": "Notification",
        "Message": inner.to_string(),
    })
    .to_string();
    InboundRecord::new(body, SourceRoute::from(SOURCE_ARN))
}

pub fn valid_record(target: &str, path: &str, retry_count: u32) -> InboundRecord {
    sns_record(serde_json::json!({
        "distribution_id": target,
        "path": path,
        "retry_count": retry_count,
    }))
}

/// Turn a published retry back into the record the queue would redeliver.
pub fn redeliver(request: &InvalidationRequest) -> InboundRecord {
    let body = envelope::seal(request).expect("seal retry");
    InboundRecord::new(body, request.source_route.clone())
}

/// Returns scripted outcomes in order, then `fallback`.
pub struct ScriptedClient {
    script: Mutex<VecDeque<ClassifiedOutcome>>,
    fallback: ClassifiedOutcome,
    calls: Mutex<Vec<InvalidationRequest>>,
}

impl ScriptedClient {
    pub fn always(outcome: ClassifiedOutcome) -> Arc<Self> {
        Self::scripted(Vec::new(), outcome)
    }

    pub fn scripted(script: Vec<ClassifiedOutcome>, fallback: ClassifiedOutcome) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            fallback,
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> Vec<InvalidationRequest> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl InvalidationClient for ScriptedClient {
    async fn invalidate(&self, request: &InvalidationRequest) -> ClassifiedOutcome {
        self.calls.lock().unwrap().push(request.clone());
        let next = self.script.lock().unwrap().pop_front();
        next.unwrap_or_else(|| self.fallback.clone())
    }
}

/// Panics when asked to invalidate `poison_target`, succeeds otherwise.
pub struct PanickingClient {
    pub poison_target: String,
    pub calls: AtomicUsize,
}

#[async_trait]
impl InvalidationClient for PanickingClient {
    async fn invalidate(&self, request: &InvalidationRequest) -> ClassifiedOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if request.target_id == self.poison_target {
            panic!("client blew up for {}", request.target_id);
        }
        success()
    }
}

/// Records every publish; optionally fails them all.
#[derive(Default)]
pub struct RecordingPublisher {
    published: Mutex<Vec<(InvalidationRequest, u32)>>,
    fail: bool,
}

impl RecordingPublisher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            published: Mutex::new(Vec::new()),
            fail: true,
        })
    }

    pub fn published(&self) -> Vec<(InvalidationRequest, u32)> {
        self.published.lock().unwrap().clone()
    }

    pub fn publish_count(&self) -> usize {
        self.published.lock().unwrap().len()
    }
}

#[async_trait]
impl RetryPublisher for RecordingPublisher {
    async fn publish(&self, request: &InvalidationRequest, delay_seconds: u32) -> cdn_queue::Result<String> {
        let mut published = self.published.lock().unwrap();
        published.push((request.clone(), delay_seconds));
        if self.fail {
            return Err(QueueError::Sqs("AWS.SimpleQueueService.NonExistentQueue".to_string()));
        }
        Ok(format!("msg-{}", published.len()))
    }
}

pub fn controller(
    client: Arc<dyn InvalidationClient>,
    publisher: Arc<dyn RetryPublisher>,
    max_attempts: u32,
    retry_delay_seconds: u32,
) -> RetryController {
    RetryController::new(client, publisher, RetryPolicy::new(max_attempts, retry_delay_seconds))
}

/// In-memory sink for formatted log lines.
#[derive(Clone, Default)]
pub struct LogCapture(Arc<Mutex<Vec<u8>>>);

impl LogCapture {
    /// Install a plain-text subscriber writing into this capture for the current thread.
    pub fn install(&self) -> tracing::subscriber::DefaultGuard {
        let sink = self.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .with_ansi(false)
            .with_writer(move || sink.clone())
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    pub fn lines(&self) -> Vec<String> {
        let bytes = self.0.lock().unwrap().clone();
        String::from_utf8_lossy(&bytes)
            .lines()
            .map(str::to_string)
            .collect()
    }

    pub fn count(&self, level: &str, message: &str) -> usize {
        self.lines()
            .iter()
            .filter(|line| line.contains(level) && line.contains(message))
            .count()
    }
}

impl io::Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
