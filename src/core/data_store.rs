//! FHIR data store
//!
//! The public persistence contract: upsert with history, point and version
//! reads, hard delete and single-page queries. Store failures are translated
//! into domain error kinds here and nowhere else, and every operation emits
//! exactly one notification.

use super::notification::{NotificationScope, NotificationSink};
use super::procedures::{HardDelete, UpsertWithHistory};
use super::query::{QueryExecutor, QueryPage};
use super::retry::RetryPolicy;
use crate::adapters::database::document::ResourceDocument;
use crate::adapters::database::query::{QueryDefinition, QueryOptions};
use crate::adapters::database::traits::{CollectionAddress, DocumentStore};
use crate::domain::errors::status;
use crate::domain::{
    Cancellation, DataStoreError, ResourceKey, ResourceWrapper, Result, StoreFailure,
    UpsertOutcome, WeakETag,
};
use serde::de::DeserializeOwned;
use std::sync::Arc;

/// Operation names carried by notifications
pub mod operations {
    pub const UPSERT: &str = "upsert";
    pub const READ: &str = "read";
    pub const GET_VERSION: &str = "get_version";
    pub const HARD_DELETE: &str = "hard_delete";
}

/// Versioned resource persistence over a document store
///
/// Holds no mutable state across calls; concurrent writers to the same
/// logical resource are arbitrated by the store's conditional writes.
///
/// # Examples
///
/// ```rust,no_run
/// use fhir_datastore::adapters::memory::InMemoryDocumentStore;
/// use fhir_datastore::core::{FhirDataStore, RetryPolicy, TracingSink};
/// use fhir_datastore::domain::{Cancellation, ResourceKey, ResourceWrapper};
/// use serde_json::json;
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = FhirDataStore::new(
///     Arc::new(InMemoryDocumentStore::new("fhir", "resources")),
///     RetryPolicy::default(),
///     Arc::new(TracingSink),
/// );
///
/// let wrapper = ResourceWrapper::builder()
///     .resource(&json!({"resourceType": "Patient", "id": "p1"}))?
///     .build()?;
/// let cancel = Cancellation::none();
///
/// let outcome = store.upsert(&wrapper, None, true, true, &cancel).await?;
/// let current = store.get(&ResourceKey::new("Patient", "p1")?, &cancel).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct FhirDataStore {
    store: Arc<dyn DocumentStore>,
    retry: RetryPolicy,
    sink: Arc<dyn NotificationSink>,
    queries: QueryExecutor,
    upsert_procedure: String,
    hard_delete_procedure: String,
}

impl FhirDataStore {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        retry: RetryPolicy,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        let queries = QueryExecutor::new(store.clone(), retry.clone(), sink.clone());
        Self {
            store,
            retry,
            sink,
            queries,
            upsert_procedure: UpsertWithHistory::DEFINITION.installed_name(),
            hard_delete_procedure: HardDelete::DEFINITION.installed_name(),
        }
    }

    /// The collection this data store targets
    pub fn collection(&self) -> &CollectionAddress {
        self.store.collection()
    }

    /// Writes a new current version of a resource
    ///
    /// # Arguments
    ///
    /// * `resource` - The resource to write; a delete marker when `is_deleted`
    /// * `weak_etag` - Version the caller last saw; `None` asserts nothing
    /// * `allow_create` - Whether a missing resource may be created
    /// * `keep_history` - Whether the prior current version is retained
    ///
    /// # Returns
    ///
    /// `Ok(None)` when deleting a resource that is already absent or deleted.
    ///
    /// # Errors
    ///
    /// - [`DataStoreError::ResourceConflict`] on a version mismatch, or when a
    ///   version is asserted for a resource that does not exist
    /// - [`DataStoreError::MethodNotAllowed`] when the resource does not
    ///   exist and creation is not allowed
    /// - [`DataStoreError::ServiceUnavailable`] when the store stays
    ///   unavailable after retries
    /// - [`DataStoreError::Store`] for any other store failure
    pub async fn upsert(
        &self,
        resource: &ResourceWrapper,
        weak_etag: Option<&WeakETag>,
        allow_create: bool,
        keep_history: bool,
        cancel: &Cancellation,
    ) -> Result<Option<UpsertOutcome>> {
        let scope = NotificationScope::begin(
            self.sink.clone(),
            operations::UPSERT,
            Some(&resource.resource_type_name),
        );

        let request = UpsertWithHistory::new(resource, weak_etag, allow_create, keep_history);
        let params = request.parameters()?;

        let result = self
            .retry
            .execute(cancel, || {
                let scope = &scope;
                let request = &request;
                let params = params.clone();
                async move {
                    let outcome = self
                        .store
                        .execute_procedure(&self.upsert_procedure, request.partition_key(), params)
                        .await;
                    scope.record_attempt(&outcome);
                    outcome
                }
            })
            .await;

        match result {
            Ok(response) => {
                let outcome = UpsertWithHistory::parse_response(response.body)?;
                tracing::debug!(
                    resource_type = %outcome.wrapper.resource_type_name,
                    resource_id = %outcome.wrapper.resource_id,
                    version = %outcome.wrapper.version,
                    outcome = %outcome.outcome_type,
                    "Upserted resource"
                );
                Ok(Some(outcome))
            }
            Err(DataStoreError::Store(failure)) => {
                translate_upsert_failure(failure, resource, weak_etag, allow_create)
            }
            Err(e) => {
                scope.record_error(&e);
                Err(e)
            }
        }
    }

    /// Reads the current version of a resource, or the version the key is
    /// pinned to
    ///
    /// # Returns
    ///
    /// `Ok(None)` when no such document exists. A current document that is a
    /// delete marker is returned as is.
    ///
    /// # Errors
    ///
    /// Store failures other than not-found propagate.
    pub async fn get(
        &self,
        key: &ResourceKey,
        cancel: &Cancellation,
    ) -> Result<Option<ResourceWrapper>> {
        match key.version_id() {
            Some(version) => self.get_version(key, version, cancel).await,
            None => self.read_current(key, cancel).await,
        }
    }

    async fn get_version(
        &self,
        key: &ResourceKey,
        version: &str,
        cancel: &Cancellation,
    ) -> Result<Option<ResourceWrapper>> {
        let query = QueryDefinition::new()
            .where_eq("resourceId", key.id())
            .where_eq("version", version);
        let options = QueryOptions::for_partition(key.to_partition_key());

        let page: QueryPage<ResourceDocument> = self
            .queries
            .execute(
                &query,
                &options,
                operations::GET_VERSION,
                Some(key.resource_type()),
                cancel,
            )
            .await?;

        Ok(page.into_first().map(ResourceDocument::into_wrapper))
    }

    async fn read_current(
        &self,
        key: &ResourceKey,
        cancel: &Cancellation,
    ) -> Result<Option<ResourceWrapper>> {
        let scope =
            NotificationScope::begin(self.sink.clone(), operations::READ, Some(key.resource_type()));
        let partition_key = key.to_partition_key();

        let result = self
            .retry
            .execute(cancel, || {
                let scope = &scope;
                let partition_key = &partition_key;
                async move {
                    let outcome = self.store.read_document(key.id(), partition_key).await;
                    scope.record_attempt(&outcome);
                    outcome
                }
            })
            .await;

        match result {
            Ok(response) => Ok(Some(
                ResourceDocument::from_value(response.body)?.into_wrapper(),
            )),
            Err(DataStoreError::Store(failure)) if failure.is_not_found() => Ok(None),
            Err(e) => {
                scope.record_error(&e);
                Err(e)
            }
        }
    }

    /// Removes every version of a logical resource
    ///
    /// The key's version, if any, is ignored.
    ///
    /// # Errors
    ///
    /// - [`DataStoreError::RequestRateExceeded`] when the store rejects the
    ///   delete for size or rate
    /// - [`DataStoreError::Store`] for any other store failure
    pub async fn hard_delete(&self, key: &ResourceKey, cancel: &Cancellation) -> Result<()> {
        let scope = NotificationScope::begin(
            self.sink.clone(),
            operations::HARD_DELETE,
            Some(key.resource_type()),
        );

        let request = HardDelete::new(key);

        let result = self
            .retry
            .execute(cancel, || {
                let scope = &scope;
                let request = &request;
                async move {
                    let outcome = self
                        .store
                        .execute_procedure(
                            &self.hard_delete_procedure,
                            request.partition_key(),
                            request.parameters(),
                        )
                        .await;
                    scope.record_attempt(&outcome);
                    outcome
                }
            })
            .await;

        match result {
            Ok(response) => {
                let removed = HardDelete::parse_response(response.body)?;
                tracing::debug!(
                    resource_type = %key.resource_type(),
                    resource_id = %key.id(),
                    removed_count = removed.len(),
                    removed_ids = ?removed,
                    request_charge = response.request_charge,
                    "Hard deleted resource"
                );
                Ok(())
            }
            Err(DataStoreError::Store(failure)) => match failure.signal() {
                status::REQUEST_ENTITY_TOO_LARGE | status::TOO_MANY_REQUESTS => {
                    Err(DataStoreError::RequestRateExceeded(failure.retry_after))
                }
                _ => {
                    crate::log_store_failure!(operations::HARD_DELETE, key, failure);
                    Err(DataStoreError::Store(failure))
                }
            },
            Err(e) => {
                scope.record_error(&e);
                Err(e)
            }
        }
    }

    /// Draws one page of a declarative query
    ///
    /// # Errors
    ///
    /// Store failures are returned unchanged.
    pub async fn execute_query<T>(
        &self,
        query: &QueryDefinition,
        options: &QueryOptions,
        operation: &'static str,
        resource_type: Option<&str>,
        cancel: &Cancellation,
    ) -> Result<QueryPage<T>>
    where
        T: DeserializeOwned,
    {
        self.queries
            .execute(query, options, operation, resource_type, cancel)
            .await
    }
}

fn translate_upsert_failure(
    failure: StoreFailure,
    resource: &ResourceWrapper,
    weak_etag: Option<&WeakETag>,
    allow_create: bool,
) -> Result<Option<UpsertOutcome>> {
    match failure.signal() {
        status::PRECONDITION_FAILED => Err(DataStoreError::ResourceConflict(weak_etag.cloned())),
        status::NOT_FOUND if resource.is_deleted => {
            tracing::debug!(
                resource_type = %resource.resource_type_name,
                resource_id = %resource.resource_id,
                "Resource already absent, delete is a no-op"
            );
            Ok(None)
        }
        status::NOT_FOUND if weak_etag.is_some() => {
            Err(DataStoreError::ResourceConflict(weak_etag.cloned()))
        }
        status::NOT_FOUND if !allow_create => Err(DataStoreError::MethodNotAllowed(format!(
            "{}/{} does not exist and creation is not allowed",
            resource.resource_type_name, resource.resource_id
        ))),
        status::SERVICE_UNAVAILABLE => Err(DataStoreError::ServiceUnavailable),
        _ => {
            crate::log_store_failure!(
                operations::UPSERT,
                format!("{}/{}", resource.resource_type_name, resource.resource_id),
                failure
            );
            Err(DataStoreError::Store(failure))
        }
    }
}
