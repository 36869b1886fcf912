//! Integration tests for graceful shutdown
//!
//! These tests verify that:
//! - A shutdown signal cancels in-flight store operations
//! - Cancelled operations still publish their notification
//! - No partial writes are left behind

use fhir_datastore::adapters::memory::{InMemoryDocumentStore, OperationKind};
use fhir_datastore::core::{ChannelSink, FhirDataStore, RetryPolicy};
use fhir_datastore::domain::{
    Cancellation, DataStoreError, ResourceKey, ResourceWrapper, StoreFailure,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

fn patient() -> ResourceWrapper {
    ResourceWrapper::builder()
        .resource(&json!({"resourceType": "Patient", "id": "p1"}))
        .unwrap()
        .build()
        .unwrap()
}

fn slow_retry() -> RetryPolicy {
    RetryPolicy::default()
        .with_max_retries(5)
        .with_backoff(Duration::from_secs(5), Duration::from_secs(5), 1.0)
}

#[tokio::test]
async fn test_shutdown_signal_propagation() {
    // Every clone observes the same signal
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let first = Cancellation::new(shutdown_rx.clone());
    let second = Cancellation::new(shutdown_rx);

    assert!(!first.is_cancelled());
    assert!(!second.is_cancelled());

    shutdown_tx.send(true).unwrap();

    assert!(first.is_cancelled());
    assert!(second.is_cancelled());
    first.cancelled().await;
}

#[tokio::test]
async fn test_dropped_sender_is_not_cancellation() {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let cancel = Cancellation::new(shutdown_rx);
    drop(shutdown_tx);

    assert!(!cancel.is_cancelled());
    let waited = tokio::time::timeout(Duration::from_millis(20), cancel.cancelled()).await;
    assert!(waited.is_err());
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_interrupts_retry_wait() {
    let store = InMemoryDocumentStore::new("fhir", "resources");
    store.fail_next(OperationKind::Procedure, StoreFailure::new(503, "busy"));
    let (sink, mut rx) = ChannelSink::new();
    let data_store = FhirDataStore::new(Arc::new(store.clone()), slow_retry(), Arc::new(sink));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let cancel = Cancellation::new(shutdown_rx);

    let task = tokio::spawn(async move {
        data_store
            .upsert(&patient(), None, true, true, &cancel)
            .await
    });

    // Let the first attempt fail and the backoff start
    tokio::time::sleep(Duration::from_secs(1)).await;
    shutdown_tx.send(true).unwrap();

    let result = task.await.unwrap();
    assert!(matches!(result, Err(DataStoreError::Cancelled)));
    assert_eq!(store.document_count("Patient_p1"), 0);

    let event = rx.try_recv().unwrap();
    assert_eq!(event.operation, "upsert");
    assert_eq!(event.status_code, None);
    assert!(rx.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_during_read_retry() {
    let store = InMemoryDocumentStore::new("fhir", "resources");
    store.fail_next(OperationKind::Read, StoreFailure::new(429, "throttled"));
    let data_store = FhirDataStore::new(
        Arc::new(store),
        slow_retry(),
        Arc::new(fhir_datastore::core::NullSink),
    );

    let (shutdown_tx, cancel) = Cancellation::channel();
    let key = ResourceKey::new("Patient", "p1").unwrap();

    let task = tokio::spawn(async move { data_store.get(&key, &cancel).await });

    tokio::time::sleep(Duration::from_secs(2)).await;
    shutdown_tx.send(true).unwrap();

    assert!(matches!(task.await.unwrap(), Err(DataStoreError::Cancelled)));
}
