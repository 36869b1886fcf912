//! Cosmos DB provisioning client
//!
//! Creates the database and the resource collection through the Azure SDK.
//! Document traffic goes through [`super::rest::CosmosRestClient`].

use crate::config::CosmosDbConfig;
use crate::domain::{CosmosDbError, DataStoreError, Result};
use azure_core::credentials::Secret;
use azure_data_cosmos::clients::DatabaseClient;
use azure_data_cosmos::models::{
    ContainerProperties, IndexingPolicy, PartitionKeyDefinition, PartitionKeyKind,
};
use azure_data_cosmos::{CosmosClient, CosmosClientOptions};
use std::borrow::Cow;

/// Partition key path of the resource collection
pub const PARTITION_KEY_PATH: &str = "/partitionKey";

/// Cosmos DB client used to provision the database and collection
pub struct CosmosDbClient {
    client: CosmosClient,
    database: DatabaseClient,
    config: CosmosDbConfig,
}

impl CosmosDbClient {
    /// Create a new Cosmos DB client
    ///
    /// # Errors
    ///
    /// Returns an error if the SDK client cannot be created.
    pub fn new(config: CosmosDbConfig) -> Result<Self> {
        use secrecy::ExposeSecret;

        let key = Secret::new(config.key.expose_secret().as_ref().to_string());
        let options = Some(CosmosClientOptions::default());

        let client = CosmosClient::with_key(&config.endpoint, key, options).map_err(|e| {
            DataStoreError::CosmosDb(CosmosDbError::ConnectionFailed(format!(
                "Failed to create Cosmos client: {e}"
            )))
        })?;

        let database = client.database_client(&config.database_name);

        Ok(Self {
            client,
            database,
            config,
        })
    }

    /// Test the connection to Cosmos DB
    ///
    /// Attempts to read the database to verify connectivity.
    pub async fn test_connection(&self) -> Result<()> {
        self.database.read(None).await.map_err(|e| {
            DataStoreError::CosmosDb(CosmosDbError::ConnectionFailed(format!(
                "Connection test failed: {e}"
            )))
        })?;

        Ok(())
    }

    /// Ensure the database exists, creating it if necessary
    pub async fn ensure_database_exists(&self) -> Result<()> {
        let database = &self.config.database_name;

        if self.database.read(None).await.is_ok() {
            tracing::info!(database = %database, "Database already exists");
            return Ok(());
        }

        tracing::info!(database = %database, "Creating database");
        self.client
            .create_database(database, None)
            .await
            .map_err(|e| {
                DataStoreError::CosmosDb(CosmosDbError::DatabaseCreationFailed(format!(
                    "Failed to create database {database}: {e}"
                )))
            })?;

        tracing::info!(database = %database, "Database created successfully");
        Ok(())
    }

    /// Ensure the resource collection exists, creating it if necessary
    ///
    /// Every version of a resource shares the partition `{type}_{id}`,
    /// stored in the `partitionKey` field.
    pub async fn ensure_collection_exists(&self) -> Result<()> {
        let collection = &self.config.collection_name;
        let container = self.database.container_client(collection);

        if container.read(None).await.is_ok() {
            tracing::info!(collection = %collection, "Collection already exists");
            return Ok(());
        }

        tracing::info!(collection = %collection, "Creating collection");

        let properties = ContainerProperties {
            id: Cow::Owned(collection.clone()),
            partition_key: PartitionKeyDefinition {
                paths: vec![PARTITION_KEY_PATH.to_string()],
                kind: PartitionKeyKind::Hash,
                version: None,
            },
            indexing_policy: Some(IndexingPolicy::default()),
            ..Default::default()
        };

        self.database
            .create_container(properties, None)
            .await
            .map_err(|e| {
                DataStoreError::CosmosDb(CosmosDbError::CollectionCreationFailed(format!(
                    "Failed to create collection {collection}: {e}"
                )))
            })?;

        tracing::info!(collection = %collection, "Collection created successfully");
        Ok(())
    }

    /// Ensures the database and collection both exist
    pub async fn provision(&self) -> Result<()> {
        self.ensure_database_exists().await?;
        self.ensure_collection_exists().await
    }
}
