//! Document store abstraction traits
//!
//! This module defines the capability the data store consumes from a
//! partitioned document database. Backends report failures as
//! [`StoreFailure`] values; classification into domain errors happens in
//! the data store, never here.

use super::query::{QueryDefinition, QueryOptions};
use crate::domain::StoreFailure;
use async_trait::async_trait;
use serde_json::Value;
use std::fmt;

/// Result of a single document store request
pub type StoreResult<T> = std::result::Result<T, StoreFailure>;

/// Identifies the collection a store operates on
///
/// Fixed at construction and read-only afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionAddress {
    /// Database id
    pub database_id: String,

    /// Collection id
    pub collection_id: String,
}

impl CollectionAddress {
    pub fn new(database_id: impl Into<String>, collection_id: impl Into<String>) -> Self {
        Self {
            database_id: database_id.into(),
            collection_id: collection_id.into(),
        }
    }

    /// The resource link of the collection, e.g. `dbs/fhir/colls/resources`
    pub fn link(&self) -> String {
        format!("dbs/{}/colls/{}", self.database_id, self.collection_id)
    }

    /// The resource link of a document in the collection
    pub fn document_link(&self, id: &str) -> String {
        format!("{}/docs/{}", self.link(), id)
    }

    /// The resource link of a stored procedure in the collection
    pub fn procedure_link(&self, name: &str) -> String {
        format!("{}/sprocs/{}", self.link(), name)
    }
}

impl fmt::Display for CollectionAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.link())
    }
}

/// A successful store response
#[derive(Debug, Clone, PartialEq)]
pub struct StoreResponse<T> {
    /// Response body
    pub body: T,

    /// HTTP status code
    pub status: u16,

    /// Request units consumed
    pub request_charge: f64,
}

/// One page of query results
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedPage {
    /// Documents in this page
    pub documents: Vec<Value>,

    /// Token for the next page, if there is one
    pub continuation: Option<String>,

    /// HTTP status code
    pub status: u16,

    /// Request units consumed by this page
    pub request_charge: f64,
}

/// Whether a procedure install created the procedure or found it in place
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcedureInstall {
    Created,
    AlreadyInstalled,
}

/// A single-use, non-shared query cursor
///
/// Dropping the cursor releases it.
#[async_trait]
pub trait DocumentQuery: Send {
    /// Whether another page can be drawn
    fn has_more_results(&self) -> bool;

    /// Draws the next page
    ///
    /// # Errors
    ///
    /// Returns the store's failure unchanged.
    async fn next_page(&mut self) -> StoreResult<FeedPage>;
}

/// Document store capability
///
/// This trait defines the interface that all document store backends must
/// implement: point reads, partition-scoped queries and invocation of named
/// server-side procedures.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// The collection this store targets
    fn collection(&self) -> &CollectionAddress;

    /// Point read of a document by id within a partition
    ///
    /// # Errors
    ///
    /// Returns the store's failure unchanged, including not-found.
    async fn read_document(&self, id: &str, partition_key: &str) -> StoreResult<StoreResponse<Value>>;

    /// Creates a query cursor
    ///
    /// No request is issued until the first page is drawn.
    fn create_document_query(
        &self,
        query: &QueryDefinition,
        options: &QueryOptions,
    ) -> Box<dyn DocumentQuery>;

    /// Executes a named server-side procedure within a partition
    ///
    /// # Errors
    ///
    /// Errors raised by the procedure surface as status 400 with the raised
    /// code as sub-status.
    async fn execute_procedure(
        &self,
        name: &str,
        partition_key: &str,
        params: Vec<Value>,
    ) -> StoreResult<StoreResponse<Value>>;

    /// Installs a server-side procedure under `name`
    ///
    /// # Errors
    ///
    /// Returns the store's failure unchanged.
    async fn install_procedure(&self, name: &str, body: &str) -> StoreResult<ProcedureInstall>;
}
