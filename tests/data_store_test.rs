//! Integration tests for the data store over the in-memory backend
//!
//! These tests verify that:
//! - Writes assign versions and retain history on request
//! - Weak ETags and creation rules are enforced
//! - Deletes are idempotent and hard deletes remove every version
//! - Each operation emits exactly one notification
//! - Transient failures are retried and cursors are always released

use fhir_datastore::adapters::database::{history_document_id, QueryDefinition, QueryOptions};
use fhir_datastore::adapters::memory::store::{PROCEDURE_CHARGE, QUERY_CHARGE, READ_CHARGE};
use fhir_datastore::adapters::memory::{InMemoryDocumentStore, OperationKind};
use fhir_datastore::core::{ChannelSink, FhirDataStore, RetryPolicy, StoreRequestMetrics};
use fhir_datastore::domain::{
    Cancellation, DataStoreError, ResourceKey, ResourceWrapper, SaveOutcomeType, StoreFailure,
    WeakETag,
};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;

fn patient(id: &str, family: &str) -> ResourceWrapper {
    ResourceWrapper::builder()
        .resource(&json!({
            "resourceType": "Patient",
            "id": id,
            "name": [{"family": family}]
        }))
        .unwrap()
        .build()
        .unwrap()
}

fn key(id: &str) -> ResourceKey {
    ResourceKey::new("Patient", id).unwrap()
}

fn fast_retry() -> RetryPolicy {
    RetryPolicy::default()
        .with_max_retries(3)
        .with_backoff(Duration::from_millis(10), Duration::from_millis(100), 2.0)
}

fn setup(
    retry: RetryPolicy,
) -> (
    InMemoryDocumentStore,
    FhirDataStore,
    UnboundedReceiver<StoreRequestMetrics>,
) {
    let store = InMemoryDocumentStore::new("fhir", "resources");
    let (sink, rx) = ChannelSink::new();
    let data_store = FhirDataStore::new(Arc::new(store.clone()), retry, Arc::new(sink));
    (store, data_store, rx)
}

fn drain(rx: &mut UnboundedReceiver<StoreRequestMetrics>) -> Vec<StoreRequestMetrics> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

fn family(wrapper: &ResourceWrapper) -> String {
    let resource = wrapper.raw_resource.to_json().unwrap();
    resource["name"][0]["family"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_create_then_update_assigns_versions() {
    let (store, data_store, _rx) = setup(RetryPolicy::no_retry());
    let cancel = Cancellation::none();

    let created = data_store
        .upsert(&patient("p1", "Smith"), None, true, true, &cancel)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(created.outcome_type, SaveOutcomeType::Created);
    assert_eq!(created.wrapper.version, "1");
    assert!(!created.wrapper.is_history);

    let updated = data_store
        .upsert(&patient("p1", "Jones"), None, true, true, &cancel)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.outcome_type, SaveOutcomeType::Updated);
    assert_eq!(updated.wrapper.version, "2");

    let ids = store.document_ids("Patient_p1");
    assert_eq!(ids.len(), 2);
    assert!(ids.contains(&"p1".to_string()));
    assert!(ids.contains(&history_document_id("p1", "1")));

    let current = data_store.get(&key("p1"), &cancel).await.unwrap().unwrap();
    assert_eq!(current.version, "2");
    assert_eq!(family(&current), "Jones");
}

#[tokio::test]
async fn test_update_without_history_keeps_single_document() {
    let (store, data_store, _rx) = setup(RetryPolicy::no_retry());
    let cancel = Cancellation::none();

    for family in ["A", "B", "C"] {
        data_store
            .upsert(&patient("p1", family), None, true, false, &cancel)
            .await
            .unwrap();
    }

    assert_eq!(store.document_count("Patient_p1"), 1);
    let current = data_store.get(&key("p1"), &cancel).await.unwrap().unwrap();
    assert_eq!(current.version, "3");
}

#[tokio::test]
async fn test_matching_etag_updates() {
    let (_store, data_store, _rx) = setup(RetryPolicy::no_retry());
    let cancel = Cancellation::none();

    let created = data_store
        .upsert(&patient("p1", "Smith"), None, true, true, &cancel)
        .await
        .unwrap()
        .unwrap();
    let etag = created.wrapper.weak_etag().unwrap();

    let updated = data_store
        .upsert(&patient("p1", "Jones"), Some(&etag), false, true, &cancel)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.wrapper.version, "2");
}

#[tokio::test]
async fn test_stale_etag_is_conflict() {
    let (store, data_store, _rx) = setup(RetryPolicy::no_retry());
    let cancel = Cancellation::none();

    data_store
        .upsert(&patient("p1", "Smith"), None, true, true, &cancel)
        .await
        .unwrap();

    let stale = WeakETag::from_version_id("5");
    let err = data_store
        .upsert(&patient("p1", "Jones"), Some(&stale), true, true, &cancel)
        .await
        .unwrap_err();

    assert!(matches!(err, DataStoreError::ResourceConflict(Some(ref e)) if *e == stale));
    assert_eq!(store.document_count("Patient_p1"), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_writers_one_wins() {
    let (store, data_store, _rx) = setup(RetryPolicy::no_retry());
    data_store
        .upsert(&patient("p1", "Smith"), None, true, true, &Cancellation::none())
        .await
        .unwrap();

    let writers: Vec<_> = (0..16)
        .map(|i| {
            let data_store = data_store.clone();
            tokio::spawn(async move {
                let etag = WeakETag::from_version_id("1");
                data_store
                    .upsert(
                        &patient("p1", &format!("Writer{i}")),
                        Some(&etag),
                        true,
                        true,
                        &Cancellation::none(),
                    )
                    .await
            })
        })
        .collect();

    let mut winners = 0;
    let mut conflicts = 0;
    for writer in writers {
        match writer.await.unwrap() {
            Ok(Some(outcome)) => {
                assert_eq!(outcome.outcome_type, SaveOutcomeType::Updated);
                winners += 1;
            }
            Err(DataStoreError::ResourceConflict(Some(_))) => conflicts += 1,
            other => panic!("unexpected result: {other:?}"),
        }
    }

    assert_eq!(winners, 1);
    assert_eq!(conflicts, 15);

    let current = data_store.get(&key("p1"), &Cancellation::none()).await.unwrap().unwrap();
    assert_eq!(current.version, "2");
    assert_eq!(
        store.document_ids("Patient_p1"),
        vec!["p1".to_string(), history_document_id("p1", "1")]
    );
}

#[tokio::test]
async fn test_etag_for_missing_resource_is_conflict() {
    let (_store, data_store, _rx) = setup(RetryPolicy::no_retry());
    let etag = WeakETag::from_version_id("1");

    let err = data_store
        .upsert(&patient("ghost", "X"), Some(&etag), true, true, &Cancellation::none())
        .await
        .unwrap_err();

    assert!(matches!(err, DataStoreError::ResourceConflict(_)));
}

#[tokio::test]
async fn test_create_not_allowed() {
    let (store, data_store, _rx) = setup(RetryPolicy::no_retry());

    let err = data_store
        .upsert(&patient("p1", "Smith"), None, false, true, &Cancellation::none())
        .await
        .unwrap_err();

    assert!(matches!(err, DataStoreError::MethodNotAllowed(_)));
    assert_eq!(store.document_count("Patient_p1"), 0);
}

#[tokio::test]
async fn test_delete_marker_lifecycle() {
    let (_store, data_store, _rx) = setup(RetryPolicy::no_retry());
    let cancel = Cancellation::none();
    let marker = ResourceWrapper::deleted_marker(&key("p1"));

    // Deleting something that never existed is a no-op
    let outcome = data_store
        .upsert(&marker, None, false, true, &cancel)
        .await
        .unwrap();
    assert!(outcome.is_none());

    data_store
        .upsert(&patient("p1", "Smith"), None, true, true, &cancel)
        .await
        .unwrap();

    let deleted = data_store
        .upsert(&marker, None, false, true, &cancel)
        .await
        .unwrap()
        .unwrap();
    assert!(deleted.wrapper.is_deleted);
    assert_eq!(deleted.wrapper.version, "2");

    let current = data_store.get(&key("p1"), &cancel).await.unwrap().unwrap();
    assert!(current.is_deleted);

    // Deleting twice is also a no-op
    let again = data_store
        .upsert(&marker, None, false, true, &cancel)
        .await
        .unwrap();
    assert!(again.is_none());

    // Recreating after a delete starts a new life
    let recreated = data_store
        .upsert(&patient("p1", "Brown"), None, true, true, &cancel)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(recreated.outcome_type, SaveOutcomeType::Created);
    assert_eq!(recreated.wrapper.version, "3");
}

#[tokio::test]
async fn test_get_specific_version() {
    let (store, data_store, _rx) = setup(RetryPolicy::no_retry());
    let cancel = Cancellation::none();

    data_store
        .upsert(&patient("p1", "Smith"), None, true, true, &cancel)
        .await
        .unwrap();
    data_store
        .upsert(&patient("p1", "Jones"), None, true, true, &cancel)
        .await
        .unwrap();

    let first = data_store
        .get(&key("p1").with_version("1"), &cancel)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first.version, "1");
    assert!(first.is_history);
    assert_eq!(family(&first), "Smith");

    let second = data_store
        .get(&key("p1").with_version("2"), &cancel)
        .await
        .unwrap()
        .unwrap();
    assert!(!second.is_history);
    assert_eq!(family(&second), "Jones");

    let missing = data_store
        .get(&key("p1").with_version("9"), &cancel)
        .await
        .unwrap();
    assert!(missing.is_none());

    assert_eq!(store.open_cursors(), 0);
}

#[tokio::test]
async fn test_get_missing_resource() {
    let (_store, data_store, mut rx) = setup(RetryPolicy::no_retry());

    let result = data_store.get(&key("nobody"), &Cancellation::none()).await.unwrap();
    assert!(result.is_none());

    let events = drain(&mut rx);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].operation, "read");
    assert_eq!(events[0].status_code, Some(404));
    assert_eq!(events[0].request_charge, READ_CHARGE);
}

#[tokio::test]
async fn test_hard_delete_removes_every_version() {
    let (store, data_store, _rx) = setup(RetryPolicy::no_retry());
    let cancel = Cancellation::none();

    for family in ["A", "B", "C"] {
        data_store
            .upsert(&patient("p1", family), None, true, true, &cancel)
            .await
            .unwrap();
    }
    data_store
        .upsert(&patient("p2", "Other"), None, true, true, &cancel)
        .await
        .unwrap();
    assert_eq!(store.document_count("Patient_p1"), 3);

    data_store.hard_delete(&key("p1"), &cancel).await.unwrap();

    assert_eq!(store.document_count("Patient_p1"), 0);
    assert_eq!(store.document_count("Patient_p2"), 1);
    assert!(data_store.get(&key("p1"), &cancel).await.unwrap().is_none());
    assert!(data_store
        .get(&key("p1").with_version("1"), &cancel)
        .await
        .unwrap()
        .is_none());

    // Nothing left to remove still succeeds
    data_store.hard_delete(&key("p1"), &cancel).await.unwrap();
}

#[tokio::test]
async fn test_one_notification_per_operation() {
    let (_store, data_store, mut rx) = setup(RetryPolicy::no_retry());
    let cancel = Cancellation::none();

    data_store
        .upsert(&patient("p1", "Smith"), None, true, true, &cancel)
        .await
        .unwrap();
    data_store.get(&key("p1"), &cancel).await.unwrap();
    data_store
        .get(&key("p1").with_version("1"), &cancel)
        .await
        .unwrap();
    data_store.hard_delete(&key("p1"), &cancel).await.unwrap();

    let events = drain(&mut rx);
    let operations: Vec<&str> = events.iter().map(|e| e.operation.as_str()).collect();
    assert_eq!(operations, ["upsert", "read", "get_version", "hard_delete"]);

    for event in &events {
        assert_eq!(event.resource_type.as_deref(), Some("Patient"));
        assert_eq!(event.status_code, Some(200));
    }
    assert_eq!(events[0].request_charge, PROCEDURE_CHARGE);
    assert_eq!(events[1].request_charge, READ_CHARGE);
    assert_eq!(events[2].request_charge, QUERY_CHARGE);
}

#[tokio::test]
async fn test_failed_operation_still_notifies() {
    let (_store, data_store, mut rx) = setup(RetryPolicy::no_retry());

    let err = data_store
        .upsert(&patient("p1", "Smith"), None, false, true, &Cancellation::none())
        .await
        .unwrap_err();
    assert!(matches!(err, DataStoreError::MethodNotAllowed(_)));

    let events = drain(&mut rx);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].operation, "upsert");
    // Procedure errors surface as a bad request carrying the raised code
    assert_eq!(events[0].status_code, Some(400));
}

#[tokio::test(start_paused = true)]
async fn test_transient_failure_is_retried() {
    let (store, data_store, mut rx) = setup(fast_retry());
    store.fail_next(
        OperationKind::Procedure,
        StoreFailure::new(503, "service busy"),
    );

    let outcome = data_store
        .upsert(&patient("p1", "Smith"), None, true, true, &Cancellation::none())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(outcome.wrapper.version, "1");

    let events = drain(&mut rx);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].status_code, Some(200));
    // Failed attempt is charged too
    assert_eq!(events[0].request_charge, READ_CHARGE + PROCEDURE_CHARGE);
}

#[tokio::test(start_paused = true)]
async fn test_persistent_unavailability() {
    let (store, data_store, _rx) = setup(fast_retry());
    for _ in 0..4 {
        store.fail_next(OperationKind::Procedure, StoreFailure::new(503, "down"));
    }

    let err = data_store
        .upsert(&patient("p1", "Smith"), None, true, true, &Cancellation::none())
        .await
        .unwrap_err();

    assert!(matches!(err, DataStoreError::ServiceUnavailable));
    assert_eq!(store.document_count("Patient_p1"), 0);
}

#[tokio::test]
async fn test_unclassified_failure_passes_through() {
    let (store, data_store, _rx) = setup(fast_retry());
    store.fail_next(
        OperationKind::Procedure,
        StoreFailure::new(500, "internal").with_sub_status(1001),
    );

    let err = data_store
        .upsert(&patient("p1", "Smith"), None, true, true, &Cancellation::none())
        .await
        .unwrap_err();

    match err {
        DataStoreError::Store(failure) => {
            assert_eq!(failure.status, 500);
            assert_eq!(failure.sub_status, Some(1001));
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[tokio::test]
async fn test_hard_delete_throttled() {
    let (store, data_store, _rx) = setup(RetryPolicy::no_retry());
    store.fail_next(
        OperationKind::Procedure,
        StoreFailure::new(429, "too many requests").with_retry_after(Duration::from_millis(250)),
    );

    let err = data_store
        .hard_delete(&key("p1"), &Cancellation::none())
        .await
        .unwrap_err();

    assert!(matches!(err, DataStoreError::RequestRateExceeded(_)));
    assert_eq!(err.retry_after(), Some(Duration::from_millis(250)));
}

#[tokio::test]
async fn test_hard_delete_too_large() {
    let (store, data_store, _rx) = setup(RetryPolicy::no_retry());
    store.fail_next(OperationKind::Procedure, StoreFailure::new(413, "script budget"));

    let err = data_store
        .hard_delete(&key("p1"), &Cancellation::none())
        .await
        .unwrap_err();

    assert!(matches!(err, DataStoreError::RequestRateExceeded(None)));
}

#[tokio::test]
async fn test_cancelled_before_start() {
    let (store, data_store, mut rx) = setup(RetryPolicy::no_retry());
    let (tx, cancel) = Cancellation::channel();
    tx.send(true).unwrap();

    let err = data_store
        .upsert(&patient("p1", "Smith"), None, true, true, &cancel)
        .await
        .unwrap_err();

    assert!(matches!(err, DataStoreError::Cancelled));
    assert_eq!(store.document_count("Patient_p1"), 0);

    let events = drain(&mut rx);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].status_code, None);
}

#[tokio::test]
async fn test_execute_query_pages() {
    let (store, data_store, mut rx) = setup(RetryPolicy::no_retry());
    let cancel = Cancellation::none();

    for id in ["a", "b", "c"] {
        data_store
            .upsert(&patient(id, "Smith"), None, true, true, &cancel)
            .await
            .unwrap();
    }
    drain(&mut rx);

    let query = QueryDefinition::new()
        .where_eq("resourceTypeName", "Patient")
        .where_eq("isHistory", false);
    let options = QueryOptions::default().with_max_item_count(2);

    let first = data_store
        .execute_query::<Value>(&query, &options, "search", Some("Patient"), &cancel)
        .await
        .unwrap();
    assert_eq!(first.items.len(), 2);
    let token = first.continuation.clone().unwrap();

    let second = data_store
        .execute_query::<Value>(
            &query,
            &options.clone().with_continuation(token),
            "search",
            Some("Patient"),
            &cancel,
        )
        .await
        .unwrap();
    assert_eq!(second.items.len(), 1);
    assert!(second.continuation.is_none());

    let events = drain(&mut rx);
    assert_eq!(events.len(), 2);
    assert!(events.iter().all(|e| e.operation == "search"));
    assert_eq!(store.open_cursors(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_query_retries_with_server_hint() {
    let (store, data_store, _rx) = setup(fast_retry());
    let cancel = Cancellation::none();

    data_store
        .upsert(&patient("p1", "Smith"), None, true, true, &cancel)
        .await
        .unwrap();
    store.fail_next(
        OperationKind::Query,
        StoreFailure::new(429, "throttled").with_retry_after(Duration::from_millis(40)),
    );

    let version = data_store
        .get(&key("p1").with_version("1"), &cancel)
        .await
        .unwrap();

    assert!(version.is_some());
    assert_eq!(store.open_cursors(), 0);
}

#[tokio::test]
async fn test_query_failure_releases_cursor() {
    let (store, data_store, _rx) = setup(RetryPolicy::no_retry());
    store.fail_next(OperationKind::Query, StoreFailure::new(400, "bad query"));

    let err = data_store
        .get(&key("p1").with_version("1"), &Cancellation::none())
        .await
        .unwrap_err();

    assert!(matches!(err, DataStoreError::Store(ref f) if f.status == 400));
    assert_eq!(store.open_cursors(), 0);
}
