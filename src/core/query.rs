//! Single-page query execution
//!
//! The executor draws exactly one page per call. Each attempt acquires a
//! fresh cursor and drops it before returning, whatever the outcome.

use super::notification::{NotificationScope, NotificationSink};
use super::retry::RetryPolicy;
use crate::adapters::database::query::{QueryDefinition, QueryOptions};
use crate::adapters::database::traits::{DocumentStore, FeedPage, StoreResult};
use crate::domain::{Cancellation, DataStoreError, Result};
use serde::de::DeserializeOwned;
use std::sync::Arc;

/// One page of typed query results
#[derive(Debug, Clone, PartialEq)]
pub struct QueryPage<T> {
    /// Items in this page
    pub items: Vec<T>,

    /// Token to resume from, if the store has more results
    pub continuation: Option<String>,

    /// Request units consumed by the page that was returned
    pub request_charge: f64,
}

impl<T> QueryPage<T> {
    /// Consumes the page and returns its first item
    pub fn into_first(self) -> Option<T> {
        self.items.into_iter().next()
    }
}

/// Runs declarative queries against a document store
#[derive(Clone)]
pub struct QueryExecutor {
    store: Arc<dyn DocumentStore>,
    retry: RetryPolicy,
    sink: Arc<dyn NotificationSink>,
}

impl QueryExecutor {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        retry: RetryPolicy,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        Self { store, retry, sink }
    }

    /// Draws one page of `query` and emits one notification
    ///
    /// # Errors
    ///
    /// Store failures are returned unchanged; translating them is the
    /// caller's concern. Documents that do not deserialize into `T` yield
    /// [`DataStoreError::Serialization`].
    pub async fn execute<T>(
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
        let scope = NotificationScope::begin(self.sink.clone(), operation, resource_type);

        let result = self
            .retry
            .execute(cancel, || {
                let scope = &scope;
                async move {
                    let outcome = self.draw_page(query, options).await;
                    match &outcome {
                        Ok(page) => scope.record_page(page),
                        Err(failure) => scope.record_failure(failure),
                    }
                    outcome
                }
            })
            .await;

        let page = match result {
            Ok(page) => page,
            Err(e) => {
                scope.record_error(&e);
                return Err(e);
            }
        };

        let request_charge = page.request_charge;
        let items = page
            .documents
            .into_iter()
            .map(serde_json::from_value)
            .collect::<std::result::Result<Vec<T>, _>>()
            .map_err(|e| DataStoreError::Serialization(format!("query result: {e}")))?;

        Ok(QueryPage {
            items,
            continuation: page.continuation,
            request_charge,
        })
    }

    async fn draw_page(
        &self,
        query: &QueryDefinition,
        options: &QueryOptions,
    ) -> StoreResult<FeedPage> {
        let mut cursor = self.store.create_document_query(query, options);
        let page = cursor.next_page().await;
        drop(cursor);
        page
    }
}
