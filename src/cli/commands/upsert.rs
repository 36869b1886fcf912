//! Upsert command implementation
//!
//! Writes a resource read from a JSON file.

use super::session::{if_match, load, report, StoreSession, EXIT_CONFIGURATION, EXIT_OK};
use crate::domain::{Cancellation, DataStoreError, ResourceWrapper};
use clap::Args;
use serde_json::Value;
use std::path::PathBuf;
use uuid::Uuid;

/// Arguments for the upsert command
#[derive(Args, Debug)]
pub struct UpsertArgs {
    /// Path to a FHIR resource in JSON
    pub file: PathBuf,

    /// Only write if the current version matches, e.g. W/"3"
    #[arg(long)]
    pub if_match: Option<String>,

    /// Fail instead of creating a resource that does not exist
    #[arg(long)]
    pub no_create: bool,

    /// Overwrite the current version without archiving it
    #[arg(long)]
    pub no_history: bool,
}

impl UpsertArgs {
    /// Execute the upsert command
    pub async fn execute(&self, config_path: &str, cancel: Cancellation) -> anyhow::Result<i32> {
        let config = match load(config_path) {
            Ok(c) => c,
            Err(code) => return Ok(code),
        };

        let wrapper = match self.read_resource() {
            Ok(w) => w,
            Err(e) => return Ok(report("Invalid resource file", &e)),
        };

        let etag = match if_match(self.if_match.as_deref()) {
            Ok(e) => e,
            Err(e) => return Ok(report("Invalid --if-match value", &e)),
        };

        if !config
            .capabilities
            .resource_types
            .contains(&wrapper.resource_type_name)
        {
            println!(
                "❌ Resource type {} is not enabled in [capabilities]",
                wrapper.resource_type_name
            );
            return Ok(EXIT_CONFIGURATION);
        }

        let session = match StoreSession::open(&config).await {
            Ok(s) => s,
            Err(e) => return Ok(report("Failed to open data store", &e)),
        };

        let result = session
            .data_store
            .upsert(
                &wrapper,
                etag.as_ref(),
                !self.no_create,
                !self.no_history,
                &cancel,
            )
            .await;
        session.close().await;

        match result {
            Ok(Some(outcome)) => {
                crate::log_store_operation!(
                    "upsert",
                    format!(
                        "{}/{}",
                        outcome.wrapper.resource_type_name, outcome.wrapper.resource_id
                    ),
                    format!("{} version {}", outcome.outcome_type, outcome.wrapper.version)
                );
                println!(
                    "✅ {} {}/{} version {}",
                    outcome.outcome_type,
                    outcome.wrapper.resource_type_name,
                    outcome.wrapper.resource_id,
                    outcome.wrapper.version
                );
                Ok(EXIT_OK)
            }
            Ok(None) => {
                println!("✔  Nothing to write");
                Ok(EXIT_OK)
            }
            Err(e) => Ok(report("Upsert failed", &e)),
        }
    }

    /// Reads the resource file
    ///
    /// A resource without an id is assigned a random one when it may be
    /// created.
    fn read_resource(&self) -> crate::domain::Result<ResourceWrapper> {
        let content = std::fs::read_to_string(&self.file)?;
        let mut resource: Value = serde_json::from_str(&content)?;

        let may_create = !self.no_create && self.if_match.is_none();
        if may_create && resource.get("id").is_none() {
            if let Some(object) = resource.as_object_mut() {
                object.insert("id".to_string(), Value::String(Uuid::new_v4().to_string()));
            }
        }

        ResourceWrapper::builder()
            .resource(&resource)
            .and_then(|b| b.build())
            .map_err(DataStoreError::Validation)
    }
}
