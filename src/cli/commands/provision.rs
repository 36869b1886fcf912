//! Provision command implementation
//!
//! Creates the database and collection when missing, then installs the
//! stored procedures.

use super::session::{load, report, EXIT_OK};
use crate::adapters::cosmosdb::CosmosDbClient;
use crate::adapters::database::{create_document_store, ProcedureInstall};
use crate::config::StoreTarget;
use crate::core::procedures::StoredProcedureInstaller;
use clap::Args;

/// Arguments for the provision command
#[derive(Args, Debug)]
pub struct ProvisionArgs {
    /// Only install stored procedures; assume the collection exists
    #[arg(long)]
    pub procedures_only: bool,
}

impl ProvisionArgs {
    /// Execute the provision command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        let config = match load(config_path) {
            Ok(c) => c,
            Err(code) => return Ok(code),
        };

        if let (StoreTarget::CosmosDB, Some(cosmos), false) = (
            config.store_target,
            config.cosmosdb.as_ref(),
            self.procedures_only,
        ) {
            println!("🔧 Provisioning {}/{}", cosmos.database_name, cosmos.collection_name);

            let client = match CosmosDbClient::new(cosmos.clone()) {
                Ok(c) => c,
                Err(e) => return Ok(report("Failed to create Cosmos DB client", &e)),
            };
            if let Err(e) = client.provision().await {
                return Ok(report("Failed to provision database and collection", &e));
            }
            println!("✅ Database and collection ready");
        }

        let store = match create_document_store(&config).await {
            Ok(s) => s,
            Err(e) => return Ok(report("Failed to create document store", &e)),
        };

        let installed = match StoredProcedureInstaller::new(store).install_all().await {
            Ok(i) => i,
            Err(e) => return Ok(report("Failed to install stored procedures", &e)),
        };

        for (name, outcome) in installed {
            match outcome {
                ProcedureInstall::Created => println!("✅ Installed procedure {name}"),
                ProcedureInstall::AlreadyInstalled => {
                    println!("✔  Procedure {name} already installed")
                }
            }
        }

        Ok(EXIT_OK)
    }
}
