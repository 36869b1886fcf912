//! Configuration management.
//!
//! TOML configuration files with support for:
//! - Environment variable substitution (`${VAR_NAME}`)
//! - `FHIR_DATASTORE_*` environment overrides
//! - Default values for optional settings
//! - Validation on load
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use fhir_datastore::config::load_config;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("fhir-datastore.toml")?;
//!
//! if let Some(cosmosdb) = &config.cosmosdb {
//!     println!("Cosmos DB: {}/{}", cosmosdb.database_name, cosmosdb.collection_name);
//! }
//! println!("Max retries: {}", config.retry.max_retries);
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration Structure
//!
//! - [`ApplicationConfig`] - Log level
//! - [`StoreTarget`] - Backend selection (cosmosdb, memory)
//! - [`CosmosDbConfig`] - Cosmos DB account, database and collection
//! - [`RetryConfig`] - Retry policy for transient store failures
//! - [`CapabilitiesConfig`] - Resource types to advertise
//! - [`LoggingConfig`] - Local file and Azure Log Analytics logging
//!
//! # Example Configuration
//!
//! ```toml
//! environment = "production"
//! store_target = "cosmosdb"
//!
//! [application]
//! log_level = "info"
//!
//! [cosmosdb]
//! endpoint = "https://your-account.documents.azure.com:443/"
//! key = "${COSMOS_KEY}"
//! database_name = "fhir"
//! collection_name = "resources"
//!
//! [retry]
//! max_retries = 9
//! max_wait_time_seconds = 30
//! ```

pub mod loader;
pub mod schema;
pub mod secret;

pub use loader::{load_config, parse_config};
pub use schema::{
    ApplicationConfig, CapabilitiesConfig, CosmosDbConfig, DataStoreConfig, Environment,
    LoggingConfig, RetryConfig, StoreTarget,
};
pub use secret::{secret_string, secret_string_opt, SecretString, SecretValue};
