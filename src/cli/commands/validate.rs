//! Validate config command implementation

use super::session::{load, report, EXIT_OK};
use crate::adapters::cosmosdb::CosmosDbClient;
use crate::config::StoreTarget;
use clap::Args;

/// Arguments for the validate-config command
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Also read the configured database to verify connectivity
    #[arg(long)]
    pub check_connection: bool,
}

impl ValidateArgs {
    /// Execute the validate-config command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        use secrecy::ExposeSecret;

        tracing::info!(config_path = %config_path, "Validating configuration");

        println!("🔍 Validating configuration file: {config_path}");
        println!();

        // load() validates as part of loading
        let config = match load(config_path) {
            Ok(c) => c,
            Err(code) => return Ok(code),
        };

        println!("✅ Configuration is valid");
        println!();
        println!("Configuration Summary:");
        println!("  Environment: {:?}", config.environment);
        println!("  Log Level: {}", config.application.log_level);

        match config.store_target {
            StoreTarget::CosmosDB => {
                if let Some(ref cosmos) = config.cosmosdb {
                    println!("  Store Target: CosmosDB");
                    println!("  Endpoint: {}", cosmos.endpoint);
                    println!("  Database: {}", cosmos.database_name);
                    println!("  Collection: {}", cosmos.collection_name);
                    println!("  Key Fingerprint: {}", cosmos.key.expose_secret().fingerprint());
                }
            }
            StoreTarget::Memory => println!("  Store Target: in-memory"),
        }

        println!(
            "  Retries: {} (budget {}s)",
            config.retry.max_retries, config.retry.max_wait_time_seconds
        );
        println!("  Resource Types: {}", config.capabilities.resource_types.join(", "));
        println!("  Azure Log Analytics: {}", config.logging.azure_enabled);
        println!();

        let cosmos = match config.store_target {
            StoreTarget::CosmosDB => config.cosmosdb.as_ref(),
            StoreTarget::Memory => None,
        };
        if let (true, Some(cosmos)) = (self.check_connection, cosmos) {
            println!("🔌 Checking connection to {}", cosmos.endpoint);
            let checked = match CosmosDbClient::new(cosmos.clone()) {
                Ok(client) => client.test_connection().await,
                Err(e) => Err(e),
            };
            if let Err(e) = checked {
                return Ok(report("Connection check failed", &e));
            }
            println!("✅ Connected to database {}", cosmos.database_name);
        }

        Ok(EXIT_OK)
    }
}
