// crates/changedesk-server/src/queue.rs
// ============================================================================
// Module: Notification Queue
// Description: Best-effort per-customer success notifications.
// Purpose: Publish fan-out outcomes to an optional message queue.
// Dependencies: aws-sdk-sqs, serde, tokio
// ============================================================================

//! ## Overview
//! When a queue URL is configured, the reactor publishes one notification per
//! successful per-customer reaction. Publication is best effort: failures are
//! logged by the caller and never fail the request.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::future::Future;
use std::sync::Arc;
use std::sync::Mutex;

use aws_config::BehaviorVersion;
use aws_config::Region;
use aws_sdk_sqs::Client;
use serde::Serialize;
use thiserror::Error;
use tokio::runtime::Runtime;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Queue publication errors.
#[derive(Debug, Error)]
pub enum QueueError {
    /// Publisher configuration is invalid.
    #[error("queue invalid: {0}")]
    Invalid(String),
    /// The queue service rejected or failed the call.
    #[error("queue service error: {0}")]
    Service(String),
    /// Local I/O failure.
    #[error("queue io error: {0}")]
    Io(String),
}

// ============================================================================
// SECTION: Types
// ============================================================================

/// One per-customer success notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueueNotification {
    /// Record identifier.
    pub object_id: String,
    /// Record kind tag.
    pub object_type: String,
    /// Customer the reaction ran for.
    pub customer_code: String,
    /// Record status at reaction time.
    pub status: String,
    /// Routing hint written on the trigger.
    pub request_type: Option<String>,
    /// Notification instant (RFC3339).
    pub timestamp: String,
}

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Queue publisher capability.
pub trait QueuePublisher: Send + Sync {
    /// Publishes one notification.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError`] when publication fails.
    fn publish(&self, notification: &QueueNotification) -> Result<(), QueueError>;
}

// ============================================================================
// SECTION: SQS Publisher
// ============================================================================

/// SQS-backed queue publisher.
pub struct SqsQueuePublisher {
    /// SQS client handle.
    client: Client,
    /// Destination queue URL.
    queue_url: String,
    /// Tokio runtime for blocking SQS calls.
    runtime: Option<Arc<Runtime>>,
}

impl Drop for SqsQueuePublisher {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            let _ = std::thread::spawn(move || drop(runtime));
        }
    }
}

impl SqsQueuePublisher {
    /// Creates a new SQS publisher.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError`] when the queue URL is unset or the runtime
    /// cannot be created.
    pub fn new(queue_url: &str, region: Option<&str>) -> Result<Self, QueueError> {
        if queue_url.trim().is_empty() {
            return Err(QueueError::Invalid("queue url must be set".to_string()));
        }
        let runtime = Runtime::new().map_err(|err| QueueError::Io(err.to_string()))?;
        let region = region.map(str::to_string);
        let shared_config = block_on_queue(&runtime, async {
            let mut loader = aws_config::defaults(BehaviorVersion::latest());
            if let Some(region) = region {
                loader = loader.region(Region::new(region));
            }
            Ok(loader.load().await)
        })?;
        let client = Client::new(&shared_config);
        Ok(Self {
            client,
            queue_url: queue_url.to_string(),
            runtime: Some(Arc::new(runtime)),
        })
    }

    /// Returns the runtime or an error if shutdown.
    fn runtime(&self) -> Result<&Runtime, QueueError> {
        self.runtime
            .as_ref()
            .map(AsRef::as_ref)
            .ok_or_else(|| QueueError::Io("queue runtime closed".to_string()))
    }
}

impl QueuePublisher for SqsQueuePublisher {
    fn publish(&self, notification: &QueueNotification) -> Result<(), QueueError> {
        let body = serde_json::to_string(notification)
            .map_err(|err| QueueError::Invalid(err.to_string()))?;
        let client = self.client.clone();
        let queue_url = self.queue_url.clone();
        block_on_queue(self.runtime()?, async move {
            client
                .send_message()
                .queue_url(queue_url)
                .message_body(body)
                .send()
                .await
                .map_err(|err| QueueError::Service(err.to_string()))?;
            Ok(())
        })
    }
}

/// Blocks on a queue future using the publisher runtime.
fn block_on_queue<F, T>(runtime: &Runtime, future: F) -> Result<T, QueueError>
where
    F: Future<Output = Result<T, QueueError>> + Send + 'static,
    T: Send + 'static,
{
    if let Ok(handle) = tokio::runtime::Handle::try_current() {
        if matches!(handle.runtime_flavor(), tokio::runtime::RuntimeFlavor::MultiThread) {
            return tokio::task::block_in_place(|| handle.block_on(future));
        }
        let (tx, rx) = std::sync::mpsc::sync_channel(1);
        std::thread::spawn(move || {
            let result = Runtime::new()
                .map_err(|err| QueueError::Io(err.to_string()))
                .and_then(|runtime| runtime.block_on(future));
            let _ = tx.send(result);
        });
        return rx
            .recv()
            .unwrap_or_else(|_| Err(QueueError::Io("queue thread join failed".to_string())));
    }

    runtime.block_on(future)
}

// ============================================================================
// SECTION: No-op and Recording Publishers
// ============================================================================

/// Publisher used when no queue is configured.
pub struct NoopQueuePublisher;

impl QueuePublisher for NoopQueuePublisher {
    fn publish(&self, _notification: &QueueNotification) -> Result<(), QueueError> {
        Ok(())
    }
}

/// Publisher that records notifications for tests.
#[derive(Default)]
pub struct RecordingQueuePublisher {
    /// Recorded notifications.
    published: Mutex<Vec<QueueNotification>>,
}

impl RecordingQueuePublisher {
    /// Creates an empty recording publisher.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the recorded notifications.
    #[must_use]
    pub fn published(&self) -> Vec<QueueNotification> {
        self.published.lock().map(|published| published.clone()).unwrap_or_default()
    }
}

impl QueuePublisher for RecordingQueuePublisher {
    fn publish(&self, notification: &QueueNotification) -> Result<(), QueueError> {
        self.published
            .lock()
            .map_err(|_| QueueError::Io("recording lock poisoned".to_string()))?
            .push(notification.clone());
        Ok(())
    }
}
