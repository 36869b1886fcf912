//! Document store backends.
//!
//! - [`database`] - Backend-neutral traits, document shapes and factory
//! - [`cosmosdb`] - Azure Cosmos DB implementation
//! - [`memory`] - In-memory implementation for tests and local runs
//!
//! # Example
//!
//! ```rust
//! use fhir_datastore::adapters::database::{DocumentStore, QueryDefinition, QueryOptions};
//! use fhir_datastore::adapters::memory::InMemoryDocumentStore;
//!
//! # async fn example() {
//! let store = InMemoryDocumentStore::new("fhir", "resources");
//! let query = QueryDefinition::new().where_eq("resourceId", "p1");
//! let mut cursor = store.create_document_query(&query, &QueryOptions::for_partition("Patient_p1"));
//! let page = cursor.next_page().await.unwrap();
//! assert!(page.documents.is_empty());
//! # }
//! ```

pub mod cosmosdb;
pub mod database;
pub mod memory;
