//! Configuration loader with TOML parsing and environment variable overrides

use super::schema::{DataStoreConfig, Environment, StoreTarget};
use super::secret::secret_string;
use crate::domain::errors::DataStoreError;
use crate::domain::result::Result;
use regex::Regex;
use std::fs;
use std::path::Path;

/// Prefix for environment variable overrides
pub const ENV_PREFIX: &str = "FHIR_DATASTORE_";

/// Loads configuration from a TOML file
///
/// This function:
/// 1. Reads the TOML file
/// 2. Performs environment variable substitution (${VAR} syntax)
/// 3. Parses the TOML into DataStoreConfig
/// 4. Applies environment variable overrides (FHIR_DATASTORE_* prefix)
/// 5. Validates the configuration
///
/// # Errors
///
/// Returns [`DataStoreError::Configuration`] if the file is missing or
/// unreadable, a referenced variable is unset, parsing fails, or the
/// resulting configuration does not validate.
///
/// # Examples
///
/// ```no_run
/// use fhir_datastore::config::loader::load_config;
///
/// let config = load_config("fhir-datastore.toml").expect("Failed to load config");
/// ```
pub fn load_config(path: impl AsRef<Path>) -> Result<DataStoreConfig> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(DataStoreError::Configuration(format!(
            "Configuration file not found: {}",
            path.display()
        )));
    }

    let contents = fs::read_to_string(path).map_err(|e| {
        DataStoreError::Configuration(format!(
            "Failed to read configuration file {}: {}",
            path.display(),
            e
        ))
    })?;

    parse_config(&contents)
}

/// Parses configuration text, applying substitution, overrides and validation
pub fn parse_config(contents: &str) -> Result<DataStoreConfig> {
    let contents = substitute_env_vars(contents)?;

    let mut config: DataStoreConfig = toml::from_str(&contents)
        .map_err(|e| DataStoreError::Configuration(format!("Failed to parse TOML: {e}")))?;

    apply_env_overrides(&mut config)?;

    config.validate().map_err(|e| {
        DataStoreError::Configuration(format!("Configuration validation failed: {e}"))
    })?;

    Ok(config)
}

impl DataStoreConfig {
    /// Loads and validates a configuration file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        load_config(path)
    }
}

/// Substitutes environment variables in the format ${VAR_NAME}
///
/// Comment lines are copied through untouched.
///
/// # Errors
///
/// Returns an error listing every referenced variable that is not set
fn substitute_env_vars(input: &str) -> Result<String> {
    let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}")
        .map_err(|e| DataStoreError::Configuration(format!("Invalid placeholder pattern: {e}")))?;
    let mut result = String::with_capacity(input.len());
    let mut missing_vars: Vec<String> = Vec::new();

    for line in input.lines() {
        if line.trim_start().starts_with('#') {
            result.push_str(line);
            result.push('\n');
            continue;
        }

        let mut processed_line = line.to_string();
        for cap in re.captures_iter(line) {
            let var_name = &cap[1];
            match std::env::var(var_name) {
                Ok(value) => {
                    processed_line = processed_line.replace(&cap[0], &value);
                }
                Err(_) => {
                    if !missing_vars.iter().any(|v| v == var_name) {
                        missing_vars.push(var_name.to_string());
                    }
                }
            }
        }
        result.push_str(&processed_line);
        result.push('\n');
    }

    if !missing_vars.is_empty() {
        return Err(DataStoreError::Configuration(format!(
            "Missing required environment variables: {}",
            missing_vars.join(", ")
        )));
    }

    Ok(result)
}

fn env(name: &str) -> Option<String> {
    std::env::var(format!("{ENV_PREFIX}{name}")).ok()
}

fn env_parsed<T: std::str::FromStr>(name: &str) -> Result<Option<T>> {
    match env(name) {
        Some(val) => val.parse().map(Some).map_err(|_| {
            DataStoreError::Configuration(format!(
                "Invalid value '{val}' for {ENV_PREFIX}{name}"
            ))
        }),
        None => Ok(None),
    }
}

/// Applies environment variable overrides using the FHIR_DATASTORE_* prefix
///
/// Variables follow the pattern FHIR_DATASTORE_<SECTION>_<KEY>, for example
/// FHIR_DATASTORE_COSMOSDB_ENDPOINT or FHIR_DATASTORE_RETRY_MAX_RETRIES.
fn apply_env_overrides(config: &mut DataStoreConfig) -> Result<()> {
    if let Some(val) = env("APPLICATION_LOG_LEVEL") {
        config.application.log_level = val;
    }

    if let Some(val) = env("ENVIRONMENT") {
        config.environment = match val.to_lowercase().as_str() {
            "development" => Environment::Development,
            "staging" => Environment::Staging,
            "production" => Environment::Production,
            other => {
                return Err(DataStoreError::Configuration(format!(
                    "Invalid environment '{other}'"
                )))
            }
        };
    }

    if let Some(val) = env("STORE_TARGET") {
        config.store_target = match val.to_lowercase().as_str() {
            "cosmosdb" => StoreTarget::CosmosDB,
            "memory" => StoreTarget::Memory,
            other => {
                return Err(DataStoreError::Configuration(format!(
                    "Invalid store_target '{other}'"
                )))
            }
        };
    }

    // Cosmos DB overrides (only if the section is present)
    if let Some(ref mut cosmos_config) = config.cosmosdb {
        if let Some(val) = env("COSMOSDB_ENDPOINT") {
            cosmos_config.endpoint = val;
        }
        if let Some(val) = env("COSMOSDB_KEY") {
            cosmos_config.key = secret_string(val);
        }
        if let Some(val) = env("COSMOSDB_DATABASE_NAME") {
            cosmos_config.database_name = val;
        }
        if let Some(val) = env("COSMOSDB_COLLECTION_NAME") {
            cosmos_config.collection_name = val;
        }
        if let Some(val) = env_parsed("COSMOSDB_REQUEST_TIMEOUT_SECONDS")? {
            cosmos_config.request_timeout_seconds = val;
        }
        if let Some(val) = env_parsed("COSMOSDB_MAX_ITEM_COUNT")? {
            cosmos_config.max_item_count = val;
        }
    }

    // Retry overrides
    if let Some(val) = env_parsed("RETRY_MAX_RETRIES")? {
        config.retry.max_retries = val;
    }
    if let Some(val) = env_parsed("RETRY_INITIAL_DELAY_MS")? {
        config.retry.initial_delay_ms = val;
    }
    if let Some(val) = env_parsed("RETRY_MAX_DELAY_MS")? {
        config.retry.max_delay_ms = val;
    }
    if let Some(val) = env_parsed("RETRY_MAX_WAIT_TIME_SECONDS")? {
        config.retry.max_wait_time_seconds = val;
    }

    if let Some(val) = env("CAPABILITIES_RESOURCE_TYPES") {
        config.capabilities.resource_types = val
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();
    }

    // Logging overrides
    if let Some(val) = env_parsed("LOGGING_LOCAL_ENABLED")? {
        config.logging.local_enabled = val;
    }
    if let Some(val) = env("LOGGING_LOCAL_PATH") {
        config.logging.local_path = val;
    }
    if let Some(val) = env_parsed("LOGGING_AZURE_ENABLED")? {
        config.logging.azure_enabled = val;
    }
    if let Some(val) = env("LOGGING_AZURE_TENANT_ID") {
        config.logging.azure_tenant_id = Some(val);
    }
    if let Some(val) = env("LOGGING_AZURE_CLIENT_ID") {
        config.logging.azure_client_id = Some(val);
    }
    if let Some(val) = env("LOGGING_AZURE_CLIENT_SECRET") {
        config.logging.azure_client_secret = Some(secret_string(val));
    }
    if let Some(val) = env("LOGGING_AZURE_LOG_ANALYTICS_WORKSPACE_ID") {
        config.logging.azure_log_analytics_workspace_id = Some(val);
    }
    if let Some(val) = env("LOGGING_AZURE_DCR_IMMUTABLE_ID") {
        config.logging.azure_dcr_immutable_id = Some(val);
    }
    if let Some(val) = env("LOGGING_AZURE_DCE_ENDPOINT") {
        config.logging.azure_dce_endpoint = Some(val);
    }
    if let Some(val) = env("LOGGING_AZURE_STREAM_NAME") {
        config.logging.azure_stream_name = Some(val);
    }

    Ok(())
}
