//! Read command implementation

use super::session::{load, report, resource_key, StoreSession, EXIT_OK};
use crate::domain::{Cancellation, ResourceWrapper};
use clap::Args;
use serde_json::{json, Value};

/// Arguments for the read command
#[derive(Args, Debug)]
pub struct ReadArgs {
    /// Resource type, e.g. Patient
    pub resource_type: String,

    /// Logical id
    pub id: String,

    /// Read a specific version instead of the current one
    #[arg(long)]
    pub version: Option<String>,
}

impl ReadArgs {
    /// Execute the read command
    pub async fn execute(&self, config_path: &str, cancel: Cancellation) -> anyhow::Result<i32> {
        let config = match load(config_path) {
            Ok(c) => c,
            Err(code) => return Ok(code),
        };

        let key = match resource_key(&self.resource_type, &self.id, self.version.as_deref()) {
            Ok(k) => k,
            Err(e) => return Ok(report("Invalid resource key", &e)),
        };

        let session = match StoreSession::open(&config).await {
            Ok(s) => s,
            Err(e) => return Ok(report("Failed to open data store", &e)),
        };

        let result = session.data_store.get(&key, &cancel).await;
        session.close().await;

        match result {
            Ok(Some(wrapper)) => {
                println!("{}", serde_json::to_string_pretty(&render(&wrapper)?)?);
                Ok(EXIT_OK)
            }
            Ok(None) => {
                eprintln!("Resource {key} not found");
                Ok(EXIT_OK)
            }
            Err(e) => Ok(report(&format!("Failed to read {key}"), &e)),
        }
    }
}

/// Stored metadata plus the parsed resource body
pub fn render(wrapper: &ResourceWrapper) -> anyhow::Result<Value> {
    Ok(json!({
        "resourceType": wrapper.resource_type_name,
        "id": wrapper.resource_id,
        "version": wrapper.version,
        "etag": wrapper.weak_etag().map(|e| e.to_string()),
        "lastModified": wrapper.last_modified.to_rfc3339(),
        "isDeleted": wrapper.is_deleted,
        "isHistory": wrapper.is_history,
        "resource": wrapper.raw_resource.to_json()?,
    }))
}
