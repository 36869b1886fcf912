//! Core persistence logic.
//!
//! # Modules
//!
//! - [`data_store`] - Public persistence contract and error translation
//! - [`retry`] - Retry policy for transient store failures
//! - [`query`] - Single-page query execution
//! - [`procedures`] - Transactional server-side procedures
//! - [`notification`] - One notification event per operation
//! - [`capabilities`] - Per-resource-type interaction declarations
//!
//! # Example
//!
//! ```rust,no_run
//! use fhir_datastore::adapters::database::create_document_store;
//! use fhir_datastore::config::load_config;
//! use fhir_datastore::core::{FhirDataStore, RetryPolicy, TracingSink};
//! use fhir_datastore::domain::{Cancellation, ResourceKey};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("fhir-datastore.toml")?;
//! let store = create_document_store(&config).await?;
//!
//! let data_store = FhirDataStore::new(
//!     store,
//!     RetryPolicy::from_config(&config.retry),
//!     Arc::new(TracingSink),
//! );
//!
//! let (_shutdown_tx, cancel) = Cancellation::channel();
//! let key = ResourceKey::new("Patient", "example")?;
//! if let Some(wrapper) = data_store.get(&key, &cancel).await? {
//!     println!("Version {}", wrapper.version);
//! }
//! # Ok(())
//! # }
//! ```

pub mod capabilities;
pub mod data_store;
pub mod notification;
pub mod procedures;
pub mod query;
pub mod retry;

pub use capabilities::{CapabilityProvider, CapabilityStatementBuilder, DataStoreCapabilities, Interaction};
pub use data_store::FhirDataStore;
pub use notification::{
    ChannelSink, FanOutSink, NotificationSink, NullSink, StoreRequestMetrics, TracingSink,
};
pub use query::{QueryExecutor, QueryPage};
pub use retry::RetryPolicy;
