//! Init command implementation
//!
//! Writes a sample configuration file.

use super::session::{EXIT_CONFIGURATION, EXIT_FATAL, EXIT_OK};
use clap::Args;
use std::fs;
use std::path::Path;

/// Arguments for the init command
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Path where to create the configuration file
    #[arg(short, long, default_value = "fhir-datastore.toml")]
    pub output: String,

    /// Include every section with comments
    #[arg(long)]
    pub with_examples: bool,

    /// Overwrite existing file
    #[arg(long)]
    pub force: bool,
}

impl InitArgs {
    /// Execute the init command
    pub async fn execute(&self) -> anyhow::Result<i32> {
        tracing::info!(output = %self.output, "Initializing configuration file");

        if Path::new(&self.output).exists() && !self.force {
            println!("❌ Configuration file already exists: {}", self.output);
            println!("   Use --force to overwrite");
            return Ok(EXIT_CONFIGURATION);
        }

        let config_content = if self.with_examples {
            Self::generate_config_with_examples()
        } else {
            Self::generate_minimal_config()
        };

        match fs::write(&self.output, config_content) {
            Ok(_) => {
                println!("✅ Configuration file created: {}", self.output);
                println!();
                println!("Next steps:");
                println!("  1. Set COSMOS_KEY in your environment or a .env file");
                println!("  2. Validate configuration: fhir-datastore validate-config");
                println!("  3. Create the database, collection and procedures: fhir-datastore provision");
                println!();
                Ok(EXIT_OK)
            }
            Err(e) => {
                println!("❌ Failed to write configuration file");
                println!("   Error: {e}");
                Ok(EXIT_FATAL)
            }
        }
    }

    fn generate_minimal_config() -> &'static str {
        r#"# FHIR data store configuration

environment = "development"  # development | staging | production
store_target = "cosmosdb"    # cosmosdb | memory

[application]
log_level = "info"

[cosmosdb]
endpoint = "https://your-account.documents.azure.com:443/"
key = "${COSMOS_KEY}"
database_name = "fhir"
collection_name = "resources"

[retry]
max_retries = 9
max_wait_time_seconds = 30
"#
    }

    fn generate_config_with_examples() -> &'static str {
        r#"# FHIR data store configuration
#
# Values of the form ${NAME} are read from the environment.
# Any setting can also be overridden with FHIR_DATASTORE_<SECTION>_<KEY>,
# e.g. FHIR_DATASTORE_COSMOSDB_DATABASE_NAME.

# Runtime environment: development | staging | production
# The memory store target is rejected in production.
environment = "development"

# Document store backend: cosmosdb | memory
store_target = "cosmosdb"

[application]
# trace | debug | info | warn | error
log_level = "info"

[cosmosdb]
endpoint = "https://your-account.documents.azure.com:443/"
# Base64 account master key
key = "${COSMOS_KEY}"
database_name = "fhir"
# Every version of every resource lives in this collection,
# partitioned by /partitionKey ("{resourceType}_{id}")
collection_name = "resources"
request_timeout_seconds = 60
# Query page size (1-1000)
max_item_count = 100

[retry]
# Retries after the first attempt for throttling and timeouts
max_retries = 9
initial_delay_ms = 1000
max_delay_ms = 30000
backoff_multiplier = 2.0
# Total time one operation may spend waiting between retries
max_wait_time_seconds = 30

[capabilities]
resource_types = ["Patient", "Practitioner", "Organization", "Encounter", "Observation"]

[logging]
local_enabled = true
local_path = "/var/log/fhir-datastore"
local_rotation = "daily"  # daily | hourly | size
local_max_size_mb = 100

# Forward store request metrics to Azure Log Analytics
azure_enabled = false
# azure_tenant_id = "${AZURE_TENANT_ID}"
# azure_client_id = "${AZURE_CLIENT_ID}"
# azure_client_secret = "${AZURE_CLIENT_SECRET}"
# azure_log_analytics_workspace_id = "your-workspace-id"
# azure_dcr_immutable_id = "dcr-xxxxxxxx"
# azure_dce_endpoint = "https://your-dce.eastus-1.ingest.monitor.azure.com"
# azure_stream_name = "Custom-FhirStoreRequests_CL"
"#
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DataStoreConfig;

    #[test]
    fn test_generated_configs_parse() {
        for content in [
            InitArgs::generate_minimal_config(),
            InitArgs::generate_config_with_examples(),
        ] {
            let config: DataStoreConfig = toml::from_str(content).unwrap();
            assert_eq!(config.retry.max_retries, 9);
            assert_eq!(config.cosmosdb.unwrap().collection_name, "resources");
        }
    }

    #[tokio::test]
    async fn test_init_refuses_to_overwrite() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("fhir-datastore.toml");
        fs::write(&path, "existing").unwrap();

        let args = InitArgs {
            output: path.to_string_lossy().to_string(),
            with_examples: false,
            force: false,
        };
        assert_eq!(args.execute().await.unwrap(), EXIT_CONFIGURATION);
        assert_eq!(fs::read_to_string(&path).unwrap(), "existing");

        let args = InitArgs { force: true, ..args };
        assert_eq!(args.execute().await.unwrap(), EXIT_OK);
        assert!(fs::read_to_string(&path).unwrap().contains("store_target"));
    }
}
