//! Capabilities command implementation
//!
//! Prints the `rest.resource` fragment the data store declares.

use super::session::{load, EXIT_OK};
use crate::core::{CapabilityProvider, CapabilityStatementBuilder, DataStoreCapabilities};
use clap::Args;

/// Arguments for the capabilities command
#[derive(Args, Debug)]
pub struct CapabilitiesArgs {}

impl CapabilitiesArgs {
    /// Execute the capabilities command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        let config = match load(config_path) {
            Ok(c) => c,
            Err(code) => return Ok(code),
        };

        let mut builder = CapabilityStatementBuilder::new();
        DataStoreCapabilities::new(config.capabilities.resource_types.iter().cloned())
            .build(&mut builder);

        println!("{}", serde_json::to_string_pretty(&builder.to_json())?);
        Ok(EXIT_OK)
    }
}
