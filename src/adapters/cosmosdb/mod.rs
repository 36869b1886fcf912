//! Azure Cosmos DB integration
//!
//! - [`client`] provisions the database and resource collection via the SDK
//! - [`rest`] issues document, query and stored procedure requests
//! - [`adapter`] implements the document store trait on top of [`rest`]

pub mod adapter;
pub mod client;
pub mod models;
pub mod rest;

pub use adapter::CosmosDocumentStore;
pub use client::CosmosDbClient;
pub use rest::CosmosRestClient;
