//! Delete and hard-delete command implementations
//!
//! `delete` writes a delete marker as a new version and keeps history;
//! `hard-delete` removes every version of the resource.

use super::session::{if_match, load, report, resource_key, StoreSession, EXIT_OK};
use crate::domain::{Cancellation, ResourceWrapper};
use clap::Args;

/// Arguments for the delete command
#[derive(Args, Debug)]
pub struct DeleteArgs {
    /// Resource type, e.g. Patient
    pub resource_type: String,

    /// Logical id
    pub id: String,

    /// Only delete if the current version matches, e.g. W/"3"
    #[arg(long)]
    pub if_match: Option<String>,
}

impl DeleteArgs {
    /// Execute the delete command
    pub async fn execute(&self, config_path: &str, cancel: Cancellation) -> anyhow::Result<i32> {
        let config = match load(config_path) {
            Ok(c) => c,
            Err(code) => return Ok(code),
        };

        let (key, etag) = match resource_key(&self.resource_type, &self.id, None)
            .and_then(|k| Ok((k, if_match(self.if_match.as_deref())?)))
        {
            Ok(parsed) => parsed,
            Err(e) => return Ok(report("Invalid arguments", &e)),
        };

        let session = match StoreSession::open(&config).await {
            Ok(s) => s,
            Err(e) => return Ok(report("Failed to open data store", &e)),
        };

        let marker = ResourceWrapper::deleted_marker(&key);
        let result = session
            .data_store
            .upsert(&marker, etag.as_ref(), false, true, &cancel)
            .await;
        session.close().await;

        match result {
            Ok(Some(outcome)) => {
                crate::log_store_operation!(
                    "delete",
                    key,
                    format!("deleted as version {}", outcome.wrapper.version)
                );
                println!("✅ Deleted {key} (version {})", outcome.wrapper.version);
                Ok(EXIT_OK)
            }
            Ok(None) => {
                println!("✔  {key} was already absent");
                Ok(EXIT_OK)
            }
            Err(e) => Ok(report(&format!("Failed to delete {key}"), &e)),
        }
    }
}

/// Arguments for the hard-delete command
#[derive(Args, Debug)]
pub struct HardDeleteArgs {
    /// Resource type, e.g. Patient
    pub resource_type: String,

    /// Logical id
    pub id: String,
}

impl HardDeleteArgs {
    /// Execute the hard-delete command
    pub async fn execute(&self, config_path: &str, cancel: Cancellation) -> anyhow::Result<i32> {
        let config = match load(config_path) {
            Ok(c) => c,
            Err(code) => return Ok(code),
        };

        let key = match resource_key(&self.resource_type, &self.id, None) {
            Ok(k) => k,
            Err(e) => return Ok(report("Invalid resource key", &e)),
        };

        let session = match StoreSession::open(&config).await {
            Ok(s) => s,
            Err(e) => return Ok(report("Failed to open data store", &e)),
        };

        let result = session.data_store.hard_delete(&key, &cancel).await;
        session.close().await;

        match result {
            Ok(()) => {
                crate::log_store_operation!("hard_delete", key, "all versions removed");
                println!("✅ Removed every version of {key}");
                Ok(EXIT_OK)
            }
            Err(e) => {
                if let Some(delay) = e.retry_after() {
                    println!("   Retry after {}ms", delay.as_millis());
                }
                Ok(report(&format!("Failed to hard delete {key}"), &e))
            }
        }
    }
}
