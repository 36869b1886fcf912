//! Domain models and types for the data store.
//!
//! # Overview
//!
//! The domain layer provides:
//! - **Identity types** ([`ResourceKey`], [`WeakETag`])
//! - **Persisted model** ([`ResourceWrapper`], [`UpsertOutcome`])
//! - **Error types** ([`DataStoreError`], [`StoreFailure`], [`CosmosDbError`])
//! - **Cancellation** ([`Cancellation`])
//! - **Result type alias** ([`Result`])
//!
//! # Error Handling
//!
//! All fallible operations return [`Result<T, DataStoreError>`]. Expected
//! outcomes such as "not found" are `Option` values, not errors:
//!
//! ```rust
//! use fhir_datastore::domain::{DataStoreError, Result};
//!
//! fn example() -> Result<()> {
//!     let config = fhir_datastore::config::DataStoreConfig::from_file("fhir-datastore.toml")?;
//!     Ok(())
//! }
//! ```

pub mod cancel;
pub mod errors;
pub mod key;
pub mod result;
pub mod wrapper;

// Re-export commonly used types for convenience
pub use cancel::Cancellation;
pub use errors::{status, CosmosDbError, DataStoreError, StoreFailure};
pub use key::{ResourceKey, WeakETag};
pub use result::Result;
pub use wrapper::{
    RawResource, ResourceFormat, ResourceWrapper, ResourceWrapperBuilder, SaveOutcomeType,
    UpsertOutcome,
};
