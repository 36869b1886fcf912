//! Cosmos DB implementation of the document store trait

use super::rest::CosmosRestClient;
use crate::adapters::database::query::{QueryDefinition, QueryOptions, SqlQuerySpec};
use crate::adapters::database::traits::{
    CollectionAddress, DocumentQuery, DocumentStore, FeedPage, ProcedureInstall, StoreResponse,
    StoreResult,
};
use crate::domain::status;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// Cosmos DB document store
///
/// Wraps the REST client; every method returns the service's failure
/// unchanged so the data store can classify it.
pub struct CosmosDocumentStore {
    client: Arc<CosmosRestClient>,
    default_max_item_count: u32,
}

impl CosmosDocumentStore {
    pub fn new(client: CosmosRestClient, default_max_item_count: u32) -> Self {
        Self {
            client: Arc::new(client),
            default_max_item_count,
        }
    }
}

#[async_trait]
impl DocumentStore for CosmosDocumentStore {
    fn collection(&self) -> &CollectionAddress {
        self.client.collection()
    }

    async fn read_document(&self, id: &str, partition_key: &str) -> StoreResult<StoreResponse<Value>> {
        self.client.read_document(id, partition_key).await
    }

    fn create_document_query(
        &self,
        query: &QueryDefinition,
        options: &QueryOptions,
    ) -> Box<dyn DocumentQuery> {
        Box::new(CosmosQuery {
            client: Arc::clone(&self.client),
            spec: query.to_sql(),
            partition_key: options.partition_key.clone(),
            max_item_count: options.max_item_count.unwrap_or(self.default_max_item_count),
            continuation: options.continuation.clone(),
            exhausted: false,
        })
    }

    async fn execute_procedure(
        &self,
        name: &str,
        partition_key: &str,
        params: Vec<Value>,
    ) -> StoreResult<StoreResponse<Value>> {
        self.client
            .execute_procedure(name, partition_key, &params)
            .await
    }

    async fn install_procedure(&self, name: &str, body: &str) -> StoreResult<ProcedureInstall> {
        match self.client.create_procedure(name, body).await {
            Ok(_) => Ok(ProcedureInstall::Created),
            Err(failure) if failure.status == status::CONFLICT => {
                Ok(ProcedureInstall::AlreadyInstalled)
            }
            Err(failure) => Err(failure),
        }
    }
}

/// Query cursor over the REST client
struct CosmosQuery {
    client: Arc<CosmosRestClient>,
    spec: SqlQuerySpec,
    partition_key: Option<String>,
    max_item_count: u32,
    continuation: Option<String>,
    exhausted: bool,
}

#[async_trait]
impl DocumentQuery for CosmosQuery {
    fn has_more_results(&self) -> bool {
        !self.exhausted
    }

    async fn next_page(&mut self) -> StoreResult<FeedPage> {
        let page = self
            .client
            .query_documents(
                &self.spec,
                self.partition_key.as_deref(),
                Some(self.max_item_count),
                self.continuation.as_deref(),
            )
            .await?;

        self.continuation = page.continuation.clone();
        self.exhausted = page.continuation.is_none();
        Ok(page)
    }
}
