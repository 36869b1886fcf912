//! Integration tests for the Cosmos DB REST backend against a mock server

use fhir_datastore::adapters::cosmosdb::rest::headers;
use fhir_datastore::adapters::cosmosdb::{CosmosDocumentStore, CosmosRestClient};
use fhir_datastore::adapters::database::{
    DocumentStore, ProcedureInstall, QueryDefinition, QueryOptions,
};
use fhir_datastore::config::{secret_string, CosmosDbConfig};
use fhir_datastore::core::procedures::UpsertWithHistory;
use fhir_datastore::core::{FhirDataStore, NullSink, RetryPolicy};
use fhir_datastore::domain::{
    Cancellation, DataStoreError, ResourceWrapper, SaveOutcomeType, WeakETag,
};
use mockito::{Matcher, Server};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

fn config(endpoint: &str) -> CosmosDbConfig {
    CosmosDbConfig {
        endpoint: endpoint.to_string(),
        // base64 of "test-master-key"
        key: secret_string("dGVzdC1tYXN0ZXIta2V5".to_string()),
        database_name: "fhir".to_string(),
        collection_name: "resources".to_string(),
        request_timeout_seconds: 5,
        max_item_count: 50,
    }
}

fn store(server: &Server) -> CosmosDocumentStore {
    let client = CosmosRestClient::new(&config(&server.url())).unwrap();
    CosmosDocumentStore::new(client, 50)
}

fn stored_patient(version: &str) -> serde_json::Value {
    json!({
        "id": "p1",
        "partitionKey": "Patient_p1",
        "resourceTypeName": "Patient",
        "resourceId": "p1",
        "version": version,
        "rawResource": {"data": "{\"resourceType\":\"Patient\",\"id\":\"p1\"}", "format": "Json"},
        "isDeleted": false,
        "isHistory": false,
        "lastModified": "2025-03-01T12:00:00Z",
        "_etag": "\"0000a1\""
    })
}

#[tokio::test]
async fn test_read_document_sends_signed_partitioned_request() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/dbs/fhir/colls/resources/docs/p1")
        .match_header(headers::PARTITION_KEY, r#"["Patient_p1"]"#)
        .match_header(headers::VERSION, "2018-12-31")
        .match_header(headers::DATE, Matcher::Regex("GMT$".to_string()))
        .match_header(
            "authorization",
            Matcher::Regex("^type%3Dmaster%26ver%3D1\\.0%26sig%3D".to_string()),
        )
        .with_status(200)
        .with_header(headers::REQUEST_CHARGE, "1.25")
        .with_body(stored_patient("3").to_string())
        .create_async()
        .await;

    let response = store(&server).read_document("p1", "Patient_p1").await.unwrap();

    mock.assert_async().await;
    assert_eq!(response.status, 200);
    assert_eq!(response.request_charge, 1.25);
    assert_eq!(response.body["version"], "3");
}

#[tokio::test]
async fn test_failure_carries_status_headers_and_message() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/dbs/fhir/colls/resources/docs/p1")
        .with_status(429)
        .with_header(headers::REQUEST_CHARGE, "0.5")
        .with_header(headers::SUB_STATUS, "3200")
        .with_header(headers::RETRY_AFTER_MS, "120")
        .with_body(r#"{"code":"TooManyRequests","message":"Request rate is large"}"#)
        .create_async()
        .await;

    let failure = store(&server)
        .read_document("p1", "Patient_p1")
        .await
        .unwrap_err();

    assert_eq!(failure.status, 429);
    assert_eq!(failure.sub_status, Some(3200));
    assert_eq!(failure.retry_after, Some(Duration::from_millis(120)));
    assert_eq!(failure.request_charge, 0.5);
    assert_eq!(failure.message, "Request rate is large");
    assert!(failure.is_throttled());
}

#[tokio::test]
async fn test_non_json_error_body_is_kept_as_message() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/dbs/fhir/colls/resources/docs/p1")
        .with_status(503)
        .with_body("gateway unavailable")
        .create_async()
        .await;

    let failure = store(&server)
        .read_document("p1", "Patient_p1")
        .await
        .unwrap_err();

    assert_eq!(failure.status, 503);
    assert_eq!(failure.message, "gateway unavailable");
}

#[tokio::test]
async fn test_query_page_and_continuation() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/dbs/fhir/colls/resources/docs")
        .match_header(headers::IS_QUERY, "True")
        .match_header("content-type", "application/query+json")
        .match_header(headers::PARTITION_KEY, r#"["Patient_p1"]"#)
        .match_header(headers::MAX_ITEM_COUNT, "1")
        .match_header(headers::CONTINUATION, "page-1")
        .match_body(Matcher::PartialJson(json!({
            "query": "SELECT * FROM root r WHERE r.resourceId = @p0"
        })))
        .with_status(200)
        .with_header(headers::REQUEST_CHARGE, "2.8")
        .with_header(headers::CONTINUATION, "page-2")
        .with_body(json!({"Documents": [stored_patient("1")], "_count": 1}).to_string())
        .create_async()
        .await;

    let store = store(&server);
    let query = QueryDefinition::new().where_eq("resourceId", "p1");
    let options = QueryOptions::for_partition("Patient_p1")
        .with_max_item_count(1)
        .with_continuation("page-1");

    let mut cursor = store.create_document_query(&query, &options);
    assert!(cursor.has_more_results());
    let page = cursor.next_page().await.unwrap();

    mock.assert_async().await;
    assert_eq!(page.documents.len(), 1);
    assert_eq!(page.continuation.as_deref(), Some("page-2"));
    assert_eq!(page.request_charge, 2.8);
    assert!(cursor.has_more_results());
}

#[tokio::test]
async fn test_query_without_continuation_exhausts_cursor() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/dbs/fhir/colls/resources/docs")
        .with_status(200)
        .with_body(json!({"Documents": [], "_count": 0}).to_string())
        .create_async()
        .await;

    let store = store(&server);
    let mut cursor = store.create_document_query(&QueryDefinition::new(), &QueryOptions::default());
    let page = cursor.next_page().await.unwrap();

    assert!(page.documents.is_empty());
    assert!(page.continuation.is_none());
    assert!(!cursor.has_more_results());
}

#[tokio::test]
async fn test_install_procedure_created() {
    let mut server = Server::new_async().await;
    let name = UpsertWithHistory::DEFINITION.installed_name();
    let mock = server
        .mock("POST", "/dbs/fhir/colls/resources/sprocs")
        .match_body(Matcher::PartialJson(json!({"id": name})))
        .with_status(201)
        .with_body(json!({"id": name}).to_string())
        .create_async()
        .await;

    let outcome = store(&server)
        .install_procedure(&name, UpsertWithHistory::DEFINITION.body)
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(outcome, ProcedureInstall::Created);
}

#[tokio::test]
async fn test_install_existing_procedure_is_not_an_error() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/dbs/fhir/colls/resources/sprocs")
        .with_status(409)
        .with_body(r#"{"code":"Conflict","message":"Resource with specified id already exists"}"#)
        .create_async()
        .await;

    let outcome = store(&server)
        .install_procedure(
            &UpsertWithHistory::DEFINITION.installed_name(),
            UpsertWithHistory::DEFINITION.body,
        )
        .await
        .unwrap();

    assert_eq!(outcome, ProcedureInstall::AlreadyInstalled);
}

#[tokio::test]
async fn test_upsert_through_procedure_endpoint() {
    let mut server = Server::new_async().await;
    let path = format!(
        "/dbs/fhir/colls/resources/sprocs/{}",
        UpsertWithHistory::DEFINITION.installed_name()
    );
    let mock = server
        .mock("POST", path.as_str())
        .match_header(headers::PARTITION_KEY, r#"["Patient_p1"]"#)
        .match_body(Matcher::Regex(r#""2",true,true\]$"#.to_string()))
        .with_status(200)
        .with_header(headers::REQUEST_CHARGE, "14.3")
        .with_body(json!({"outcomeType": "Updated", "wrapper": stored_patient("3")}).to_string())
        .create_async()
        .await;

    let data_store = FhirDataStore::new(
        Arc::new(store(&server)),
        RetryPolicy::no_retry(),
        Arc::new(NullSink),
    );
    let wrapper = ResourceWrapper::builder()
        .resource(&json!({"resourceType": "Patient", "id": "p1"}))
        .unwrap()
        .build()
        .unwrap();
    let etag = WeakETag::from_version_id("2");

    let outcome = data_store
        .upsert(&wrapper, Some(&etag), true, true, &Cancellation::none())
        .await
        .unwrap()
        .unwrap();

    mock.assert_async().await;
    assert_eq!(outcome.outcome_type, SaveOutcomeType::Updated);
    assert_eq!(outcome.wrapper.version, "3");
}

#[tokio::test]
async fn test_procedure_precondition_failure_is_conflict() {
    let mut server = Server::new_async().await;
    let path = format!(
        "/dbs/fhir/colls/resources/sprocs/{}",
        UpsertWithHistory::DEFINITION.installed_name()
    );
    server
        .mock("POST", path.as_str())
        .with_status(400)
        .with_header(headers::SUB_STATUS, "412")
        .with_body(r#"{"code":"BadRequest","message":"Version mismatch"}"#)
        .create_async()
        .await;

    let data_store = FhirDataStore::new(
        Arc::new(store(&server)),
        RetryPolicy::no_retry(),
        Arc::new(NullSink),
    );
    let wrapper = ResourceWrapper::builder()
        .resource(&json!({"resourceType": "Patient", "id": "p1"}))
        .unwrap()
        .build()
        .unwrap();
    let etag = WeakETag::from_version_id("1");

    let err = data_store
        .upsert(&wrapper, Some(&etag), true, true, &Cancellation::none())
        .await
        .unwrap_err();

    assert!(matches!(err, DataStoreError::ResourceConflict(Some(_))));
}

#[tokio::test]
async fn test_unreachable_endpoint_is_unavailable() {
    let client = CosmosRestClient::new(&config("http://127.0.0.1:1")).unwrap();
    let store = CosmosDocumentStore::new(client, 50);

    let failure = store.read_document("p1", "Patient_p1").await.unwrap_err();

    assert_eq!(failure.status, 503);
}

#[test]
fn test_invalid_key_is_rejected() {
    let mut config = config("https://example.documents.azure.com");
    config.key = secret_string("not base64!".to_string());

    let err = CosmosRestClient::new(&config).err().unwrap();
    assert!(matches!(err, DataStoreError::CosmosDb(_)));
}
