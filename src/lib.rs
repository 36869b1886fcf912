// FHIR Datastore - Versioned FHIR resource persistence on Azure Cosmos DB
// Copyright (c) 2025 FHIR Datastore Contributors
// Licensed under the MIT License

//! # FHIR Datastore
//!
//! Versioned persistence for FHIR resources over a partitioned,
//! rate-limited document store (Azure Cosmos DB).
//!
//! ## Overview
//!
//! - **Versioned writes** with optional history retention, executed
//!   atomically per resource by server-side procedures
//! - **Optimistic concurrency** through weak ETags
//! - **Hard delete** of every version of a resource
//! - **Throttling-aware retries** bounded by a cumulative wait budget
//! - **One notification per operation** carrying status, request charge
//!   and latency
//! - **Capability advertisement** per resource type
//!
//! ## Architecture
//!
//! - [`cli`] - Command-line interface and argument parsing
//! - [`core`] - Data store, retry policy, query executor, procedures
//! - [`adapters`] - Document store backends (Cosmos DB, in-memory)
//! - [`domain`] - Keys, resource wrappers and errors
//! - [`config`] - Configuration management
//! - [`logging`] - Structured logging and Log Analytics forwarding
//!
//! ## Quick Start
//!
//! ```rust
//! use fhir_datastore::adapters::memory::InMemoryDocumentStore;
//! use fhir_datastore::core::{FhirDataStore, RetryPolicy, TracingSink};
//! use fhir_datastore::domain::{Cancellation, ResourceKey, ResourceWrapper, WeakETag};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(InMemoryDocumentStore::new("fhir", "resources"));
//! let data_store = FhirDataStore::new(store, RetryPolicy::default(), Arc::new(TracingSink));
//! let cancel = Cancellation::none();
//!
//! let patient = ResourceWrapper::builder()
//!     .resource(&json!({"resourceType": "Patient", "id": "p1"}))?
//!     .build()?;
//!
//! let created = data_store.upsert(&patient, None, true, true, &cancel).await?.unwrap();
//! assert_eq!(created.wrapper.version, "1");
//!
//! // A write against a stale version is rejected
//! let stale = WeakETag::from_version_id("7");
//! assert!(data_store.upsert(&patient, Some(&stale), true, true, &cancel).await.is_err());
//!
//! let key = ResourceKey::new("Patient", "p1")?;
//! let current = data_store.get(&key, &cancel).await?.unwrap();
//! assert_eq!(current.version, "1");
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! Every fallible operation returns [`domain::Result`]. Version conflicts,
//! disallowed creates, throttling and unavailability are distinct
//! [`domain::DataStoreError`] variants; any other store failure surfaces
//! unchanged as [`domain::DataStoreError::Store`].

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod logging;
