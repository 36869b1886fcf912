//! In-memory document store backend
//!
//! Stands in for Cosmos DB in tests and local runs. Supports fault injection
//! so retry and error translation paths can be exercised deterministically.

pub mod store;

pub use store::{InMemoryDocumentStore, OperationKind};
