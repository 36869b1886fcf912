//! Store request notifications
//!
//! Every public data store operation emits exactly one
//! [`StoreRequestMetrics`] event, on success and on failure. Emission is
//! tied to the drop of a [`NotificationScope`], so early returns, `?`
//! propagation and dropped futures all still publish.

use crate::adapters::database::traits::{FeedPage, StoreResponse, StoreResult};
use crate::domain::{DataStoreError, StoreFailure};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

/// Observational record of one logical operation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoreRequestMetrics {
    /// Operation name, e.g. `upsert`
    pub operation: String,

    /// Resource type the operation targeted
    pub resource_type: Option<String>,

    /// Final status code, if the store answered
    pub status_code: Option<u16>,

    /// Request units consumed across all attempts
    pub request_charge: f64,

    /// Wall-clock time of the whole operation, retries included
    #[serde(rename = "latency_ms", serialize_with = "serialize_millis")]
    pub latency: Duration,

    /// When the operation finished
    pub timestamp: DateTime<Utc>,
}

fn serialize_millis<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}

/// Destination for notification events
///
/// `publish` is synchronous and must not block; delivery is the sink's
/// concern.
pub trait NotificationSink: Send + Sync {
    fn publish(&self, event: StoreRequestMetrics);
}

/// Logs every event at debug level
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl NotificationSink for TracingSink {
    fn publish(&self, event: StoreRequestMetrics) {
        tracing::debug!(
            operation = %event.operation,
            resource_type = event.resource_type.as_deref().unwrap_or("-"),
            status_code = event.status_code,
            request_charge = event.request_charge,
            latency_ms = event.latency.as_millis() as u64,
            "Store request completed"
        );
    }
}

/// Forwards events into an unbounded channel
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<StoreRequestMetrics>,
}

impl ChannelSink {
    /// Creates a sink and the receiving end of its channel
    pub fn new() -> (Self, mpsc::UnboundedReceiver<StoreRequestMetrics>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl NotificationSink for ChannelSink {
    fn publish(&self, event: StoreRequestMetrics) {
        // A closed receiver means nobody is listening any more
        let _ = self.tx.send(event);
    }
}

/// Discards every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl NotificationSink for NullSink {
    fn publish(&self, _event: StoreRequestMetrics) {}
}

/// Publishes every event to each inner sink in order
#[derive(Clone, Default)]
pub struct FanOutSink {
    sinks: Vec<Arc<dyn NotificationSink>>,
}

impl FanOutSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl NotificationSink for FanOutSink {
    fn publish(&self, event: StoreRequestMetrics) {
        if let Some((last, rest)) = self.sinks.split_last() {
            for sink in rest {
                sink.publish(event.clone());
            }
            last.publish(event);
        }
    }
}

#[derive(Debug, Default)]
struct ScopeState {
    status_code: Option<u16>,
    request_charge: f64,
}

/// Collects status and cost for one operation and publishes on drop
pub struct NotificationScope {
    sink: Arc<dyn NotificationSink>,
    operation: &'static str,
    resource_type: Option<String>,
    started: Instant,
    state: Mutex<ScopeState>,
}

impl NotificationScope {
    /// Starts timing an operation
    pub fn begin(
        sink: Arc<dyn NotificationSink>,
        operation: &'static str,
        resource_type: Option<&str>,
    ) -> Self {
        Self {
            sink,
            operation,
            resource_type: resource_type.map(str::to_string),
            started: Instant::now(),
            state: Mutex::new(ScopeState::default()),
        }
    }

    /// Records one successful store response
    pub fn record_response<T>(&self, response: &StoreResponse<T>) {
        self.record(Some(response.status), response.request_charge);
    }

    /// Records one query page
    pub fn record_page(&self, page: &FeedPage) {
        self.record(Some(page.status), page.request_charge);
    }

    /// Records one failed store request
    pub fn record_failure(&self, failure: &StoreFailure) {
        self.record(Some(failure.status), failure.request_charge);
    }

    /// Records the outcome of one store request attempt
    pub fn record_attempt<T>(&self, outcome: &StoreResult<StoreResponse<T>>) {
        match outcome {
            Ok(response) => self.record_response(response),
            Err(failure) => self.record_failure(failure),
        }
    }

    /// Records the final outcome when it did not come from the store
    pub fn record_error(&self, error: &DataStoreError) {
        if matches!(error, DataStoreError::Cancelled) {
            self.state.lock().status_code = None;
        }
    }

    fn record(&self, status_code: Option<u16>, request_charge: f64) {
        let mut state = self.state.lock();
        state.status_code = status_code;
        state.request_charge += request_charge;
    }
}

impl Drop for NotificationScope {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        self.sink.publish(StoreRequestMetrics {
            operation: self.operation.to_string(),
            resource_type: self.resource_type.take(),
            status_code: state.status_code,
            request_charge: state.request_charge,
            latency: self.started.elapsed(),
            timestamp: Utc::now(),
        });
    }
}
