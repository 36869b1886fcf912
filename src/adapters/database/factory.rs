//! Document store factory
//!
//! Creates the document store backend selected by configuration.

use crate::adapters::cosmosdb::{CosmosDocumentStore, CosmosRestClient};
use crate::adapters::database::traits::DocumentStore;
use crate::adapters::memory::InMemoryDocumentStore;
use crate::config::schema::{DataStoreConfig, StoreTarget};
use crate::domain::{DataStoreError, Result};
use std::sync::Arc;

/// Database id used by the in-memory backend
pub const MEMORY_DATABASE_ID: &str = "memory";

/// Create a document store based on the configuration
///
/// This factory function examines `store_target` and creates the matching
/// backend. No request is issued; use the `provision` command (or
/// [`crate::adapters::cosmosdb::CosmosDbClient::provision`] and
/// [`crate::core::procedures::StoredProcedureInstaller`]) to prepare a new
/// account.
///
/// # Errors
///
/// Returns an error if the backend cannot be created
pub async fn create_document_store(config: &DataStoreConfig) -> Result<Arc<dyn DocumentStore>> {
    match config.store_target {
        StoreTarget::CosmosDB => {
            let cosmos_config = config.cosmosdb.as_ref().ok_or_else(|| {
                DataStoreError::Configuration(
                    "cosmosdb configuration is required when store_target = 'cosmosdb'"
                        .to_string(),
                )
            })?;

            tracing::info!(
                database = %cosmos_config.database_name,
                collection = %cosmos_config.collection_name,
                "Creating Cosmos DB document store"
            );
            let client = CosmosRestClient::new(cosmos_config)?;
            let store = CosmosDocumentStore::new(client, cosmos_config.max_item_count);

            Ok(Arc::new(store) as Arc<dyn DocumentStore>)
        }
        StoreTarget::Memory => {
            let collection = config
                .cosmosdb
                .as_ref()
                .map(|c| c.collection_name.clone())
                .unwrap_or_else(|| "resources".to_string());

            tracing::info!(collection = %collection, "Creating in-memory document store");
            let store = InMemoryDocumentStore::new(MEMORY_DATABASE_ID, collection);

            Ok(Arc::new(store) as Arc<dyn DocumentStore>)
        }
    }
}
