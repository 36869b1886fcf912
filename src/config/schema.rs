//! Configuration schema types
//!
//! This module defines the configuration structure for the data store.

use crate::config::SecretString;
use serde::{Deserialize, Serialize};

/// Document store backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreTarget {
    /// Azure Cosmos DB
    CosmosDB,
    /// Process-local in-memory store
    Memory,
}

/// Runtime environment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Development environment
    #[default]
    Development,
    /// Staging environment
    Staging,
    /// Production environment
    Production,
}

/// Main data store configuration
///
/// This is the root configuration structure that maps to the TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataStoreConfig {
    /// Application-level settings
    #[serde(default)]
    pub application: ApplicationConfig,

    /// Runtime environment (development, staging, production)
    #[serde(default)]
    pub environment: Environment,

    /// Document store backend (cosmosdb or memory)
    pub store_target: StoreTarget,

    /// Azure Cosmos DB configuration (required if store_target = cosmosdb)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cosmosdb: Option<CosmosDbConfig>,

    /// Retry policy for transient store failures
    #[serde(default)]
    pub retry: RetryConfig,

    /// Advertised capabilities
    #[serde(default)]
    pub capabilities: CapabilitiesConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl DataStoreConfig {
    /// Validates the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid
    pub fn validate(&self) -> Result<(), String> {
        self.application.validate()?;

        match self.store_target {
            StoreTarget::CosmosDB => match &self.cosmosdb {
                Some(config) => config.validate()?,
                None => {
                    return Err(
                        "cosmosdb configuration is required when store_target = 'cosmosdb'"
                            .to_string(),
                    )
                }
            },
            StoreTarget::Memory => {
                // Data would be lost on restart
                if self.environment == Environment::Production {
                    return Err(
                        "store_target = 'memory' is not allowed in production environments. \
                        Use 'cosmosdb', or set 'environment = \"development\"' for local runs."
                            .to_string(),
                    );
                }
            }
        }

        self.retry.validate()?;
        self.capabilities.validate()?;
        self.logging.validate()?;
        Ok(())
    }
}

/// Application-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl ApplicationConfig {
    fn validate(&self) -> Result<(), String> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.as_str()) {
            return Err(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.log_level,
                valid_levels.join(", ")
            ));
        }
        Ok(())
    }
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

/// Azure Cosmos DB configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CosmosDbConfig {
    /// Cosmos DB endpoint URL
    pub endpoint: String,

    /// Cosmos DB master key (base64)
    /// Stored securely in memory and automatically zeroized on drop
    pub key: SecretString,

    /// Database name
    pub database_name: String,

    /// Collection holding every resource version
    #[serde(default = "default_collection_name")]
    pub collection_name: String,

    /// Request timeout in seconds
    #[serde(default = "default_request_timeout_seconds")]
    pub request_timeout_seconds: u64,

    /// Page size for queries
    #[serde(default = "default_max_item_count")]
    pub max_item_count: u32,
}

impl CosmosDbConfig {
    fn validate(&self) -> Result<(), String> {
        use secrecy::ExposeSecret;

        if self.endpoint.is_empty() {
            return Err("cosmosdb.endpoint cannot be empty".to_string());
        }

        if !self.endpoint.starts_with("https://") {
            return Err("cosmosdb.endpoint must start with https://".to_string());
        }

        if self.key.expose_secret().is_empty() {
            return Err("cosmosdb.key cannot be empty".to_string());
        }

        if self.database_name.is_empty() {
            return Err("cosmosdb.database_name cannot be empty".to_string());
        }

        if self.collection_name.is_empty() {
            return Err("cosmosdb.collection_name cannot be empty".to_string());
        }

        if self.request_timeout_seconds == 0 {
            return Err("cosmosdb.request_timeout_seconds must be > 0".to_string());
        }

        if self.max_item_count == 0 || self.max_item_count > 1000 {
            return Err(format!(
                "cosmosdb.max_item_count must be between 1 and 1000, got {}",
                self.max_item_count
            ));
        }

        Ok(())
    }
}

/// Retry configuration for transient store failures
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retries after the first attempt
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,

    /// Initial delay in milliseconds
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    /// Maximum delay in milliseconds
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Backoff multiplier
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Cumulative wait allowed across the retries of one operation
    #[serde(default = "default_max_wait_time_seconds")]
    pub max_wait_time_seconds: u64,
}

impl RetryConfig {
    fn validate(&self) -> Result<(), String> {
        if self.max_retries > 20 {
            return Err(format!(
                "retry.max_retries must be <= 20, got {}",
                self.max_retries
            ));
        }

        if self.backoff_multiplier < 1.0 {
            return Err(format!(
                "retry.backoff_multiplier must be >= 1.0, got {}",
                self.backoff_multiplier
            ));
        }

        if self.initial_delay_ms > self.max_delay_ms {
            return Err(format!(
                "retry.initial_delay_ms ({}) cannot exceed retry.max_delay_ms ({})",
                self.initial_delay_ms, self.max_delay_ms
            ));
        }

        Ok(())
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
            max_wait_time_seconds: default_max_wait_time_seconds(),
        }
    }
}

/// Capability advertisement configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapabilitiesConfig {
    /// Resource types the data store declares support for
    #[serde(default = "default_resource_types")]
    pub resource_types: Vec<String>,
}

impl CapabilitiesConfig {
    fn validate(&self) -> Result<(), String> {
        if self.resource_types.is_empty() {
            return Err("capabilities.resource_types cannot be empty".to_string());
        }

        for resource_type in &self.resource_types {
            let valid = resource_type
                .chars()
                .next()
                .is_some_and(|c| c.is_ascii_uppercase())
                && resource_type.chars().all(|c| c.is_ascii_alphanumeric());
            if !valid {
                return Err(format!(
                    "Invalid resource type '{resource_type}' in capabilities.resource_types"
                ));
            }
        }

        Ok(())
    }
}

impl Default for CapabilitiesConfig {
    fn default() -> Self {
        Self {
            resource_types: default_resource_types(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Enable local file logging
    #[serde(default = "default_true")]
    pub local_enabled: bool,

    /// Local log file path
    #[serde(default = "default_local_path")]
    pub local_path: String,

    /// Log rotation strategy
    #[serde(default = "default_local_rotation")]
    pub local_rotation: String,

    /// Maximum log file size in MB
    #[serde(default = "default_local_max_size_mb")]
    pub local_max_size_mb: usize,

    /// Enable Azure Log Analytics
    #[serde(default)]
    pub azure_enabled: bool,

    /// Azure AD tenant ID
    #[serde(default)]
    pub azure_tenant_id: Option<String>,

    /// Azure AD client ID (from App Registration)
    #[serde(default)]
    pub azure_client_id: Option<String>,

    /// Azure AD client secret (from App Registration)
    /// Stored securely in memory and automatically zeroized on drop
    #[serde(default)]
    pub azure_client_secret: Option<SecretString>,

    /// Log Analytics workspace ID
    #[serde(default)]
    pub azure_log_analytics_workspace_id: Option<String>,

    /// Data Collection Rule (DCR) immutable ID
    #[serde(default)]
    pub azure_dcr_immutable_id: Option<String>,

    /// Data Collection Endpoint (DCE) URL
    #[serde(default)]
    pub azure_dce_endpoint: Option<String>,

    /// Stream name for store request metrics (e.g., "Custom-FhirStoreRequests_CL")
    #[serde(default)]
    pub azure_stream_name: Option<String>,
}

impl LoggingConfig {
    /// Console-only logging, used before a configuration file is loaded
    pub fn console_only() -> Self {
        Self {
            local_enabled: false,
            local_path: String::new(),
            ..Self::default()
        }
    }

    fn validate(&self) -> Result<(), String> {
        let valid_rotations = ["daily", "hourly", "size"];
        if !valid_rotations.contains(&self.local_rotation.as_str()) {
            return Err(format!(
                "Invalid logging.local_rotation '{}'. Must be one of: {}",
                self.local_rotation,
                valid_rotations.join(", ")
            ));
        }

        if self.local_max_size_mb == 0 {
            return Err("logging.local_max_size_mb must be > 0".to_string());
        }

        if self.azure_enabled {
            let required = [
                ("azure_tenant_id", self.azure_tenant_id.is_some()),
                ("azure_client_id", self.azure_client_id.is_some()),
                ("azure_client_secret", self.azure_client_secret.is_some()),
                (
                    "azure_log_analytics_workspace_id",
                    self.azure_log_analytics_workspace_id.is_some(),
                ),
                ("azure_dcr_immutable_id", self.azure_dcr_immutable_id.is_some()),
                ("azure_dce_endpoint", self.azure_dce_endpoint.is_some()),
                ("azure_stream_name", self.azure_stream_name.is_some()),
            ];

            if let Some((name, _)) = required.iter().find(|(_, present)| !present) {
                return Err(format!("Azure logging enabled but {name} not provided"));
            }
        }

        Ok(())
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            local_enabled: true,
            local_path: default_local_path(),
            local_rotation: default_local_rotation(),
            local_max_size_mb: default_local_max_size_mb(),
            azure_enabled: false,
            azure_tenant_id: None,
            azure_client_id: None,
            azure_client_secret: None,
            azure_log_analytics_workspace_id: None,
            azure_dcr_immutable_id: None,
            azure_dce_endpoint: None,
            azure_stream_name: None,
        }
    }
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

fn default_collection_name() -> String {
    "resources".to_string()
}

fn default_request_timeout_seconds() -> u64 {
    60
}

fn default_max_item_count() -> u32 {
    100
}

fn default_max_retries() -> usize {
    9
}

fn default_initial_delay_ms() -> u64 {
    1000
}

fn default_max_delay_ms() -> u64 {
    30000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_max_wait_time_seconds() -> u64 {
    30
}

fn default_resource_types() -> Vec<String> {
    [
        "Patient",
        "Practitioner",
        "Organization",
        "Encounter",
        "Observation",
        "Condition",
        "MedicationRequest",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_local_path() -> String {
    "/var/log/fhir-datastore".to_string()
}

fn default_local_rotation() -> String {
    "daily".to_string()
}

fn default_local_max_size_mb() -> usize {
    100
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::secret_string;

    fn cosmos_config() -> CosmosDbConfig {
        CosmosDbConfig {
            endpoint: "https://myaccount.documents.azure.com:443/".to_string(),
            key: secret_string("dGVzdC1rZXk=".to_string()),
            database_name: "fhir".to_string(),
            collection_name: "resources".to_string(),
            request_timeout_seconds: 60,
            max_item_count: 100,
        }
    }

    fn config(store_target: StoreTarget) -> DataStoreConfig {
        DataStoreConfig {
            application: ApplicationConfig::default(),
            environment: Environment::Development,
            store_target,
            cosmosdb: Some(cosmos_config()),
            retry: RetryConfig::default(),
            capabilities: CapabilitiesConfig::default(),
            logging: LoggingConfig::default(),
        }
    }

    #[test]
    fn test_application_config_validation() {
        let mut config = ApplicationConfig::default();
        assert!(config.validate().is_ok());

        config.log_level = "invalid".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_cosmosdb_config_validation() {
        let mut config = cosmos_config();
        assert!(config.validate().is_ok());

        config.endpoint = "http://localhost:8081".to_string();
        assert!(config.validate().is_err());

        config = cosmos_config();
        config.max_item_count = 0;
        assert!(config.validate().is_err());

        config = cosmos_config();
        config.key = secret_string(String::new());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_cosmosdb_section_required_for_cosmos_target() {
        let mut config = config(StoreTarget::CosmosDB);
        assert!(config.validate().is_ok());

        config.cosmosdb = None;
        let err = config.validate().unwrap_err();
        assert!(err.contains("cosmosdb configuration is required"));
    }

    #[test]
    fn test_memory_target_rejected_in_production() {
        let mut config = config(StoreTarget::Memory);
        config.cosmosdb = None;
        assert!(config.validate().is_ok());

        config.environment = Environment::Production;
        let err = config.validate().unwrap_err();
        assert!(err.contains("not allowed in production"));

        config.environment = Environment::Staging;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_retry_config_validation() {
        let mut config = RetryConfig::default();
        assert!(config.validate().is_ok());

        config.max_retries = 21;
        assert!(config.validate().is_err());

        config = RetryConfig::default();
        config.backoff_multiplier = 0.5;
        assert!(config.validate().is_err());

        config = RetryConfig::default();
        config.initial_delay_ms = 60000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_capabilities_validation() {
        let mut config = CapabilitiesConfig::default();
        assert!(config.validate().is_ok());

        config.resource_types = vec![];
        assert!(config.validate().is_err());

        config.resource_types = vec!["patient".to_string()];
        assert!(config.validate().is_err());

        config.resource_types = vec!["Patient/1".to_string()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_logging_config_default() {
        let config = LoggingConfig::default();
        assert!(config.local_enabled);
        assert_eq!(config.local_path, "/var/log/fhir-datastore");
        assert_eq!(config.local_rotation, "daily");
        assert_eq!(config.local_max_size_mb, 100);
        assert!(!config.azure_enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_logging_azure_requires_all_fields() {
        let mut config = LoggingConfig::default();
        config.azure_enabled = true;
        config.azure_tenant_id = Some("tenant".to_string());

        let err = config.validate().unwrap_err();
        assert_eq!(err, "Azure logging enabled but azure_client_id not provided");
    }

    #[test]
    fn test_default_values() {
        let retry = RetryConfig::default();
        assert_eq!(retry.max_retries, 9);
        assert_eq!(retry.max_wait_time_seconds, 30);
        assert_eq!(default_collection_name(), "resources");
        assert!(default_resource_types().contains(&"Patient".to_string()));
    }
}
