//! Database abstraction layer
//!
//! Trait-based abstraction over a partitioned document store, with the
//! document shapes and query definitions shared by every backend.

pub mod document;
pub mod factory;
pub mod query;
pub mod traits;

pub use document::{history_document_id, ResourceDocument};
pub use factory::create_document_store;
pub use query::{QueryDefinition, QueryOptions, SqlQuerySpec};
pub use traits::{
    CollectionAddress, DocumentQuery, DocumentStore, FeedPage, ProcedureInstall, StoreResponse,
    StoreResult,
};
