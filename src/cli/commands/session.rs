//! Shared setup for commands that talk to the store

use crate::adapters::database::create_document_store;
use crate::config::{load_config, DataStoreConfig};
use crate::core::{FanOutSink, FhirDataStore, NotificationSink, RetryPolicy, TracingSink};
use crate::domain::{CosmosDbError, DataStoreError, ResourceKey, WeakETag};
use crate::logging::{AzureLogger, AzureMetricsSink};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Exit code for success
pub const EXIT_OK: i32 = 0;
/// Exit code for configuration errors
pub const EXIT_CONFIGURATION: i32 = 2;
/// Exit code for version conflicts and disallowed writes
pub const EXIT_CONFLICT: i32 = 3;
/// Exit code for connection failures and an unavailable store
pub const EXIT_CONNECTION: i32 = 4;
/// Exit code for everything else
pub const EXIT_FATAL: i32 = 5;

const METRICS_FLUSH_TIMEOUT: Duration = Duration::from_secs(5);

/// Maps an error to the process exit code
pub fn exit_code_for(error: &DataStoreError) -> i32 {
    match error {
        DataStoreError::Configuration(_) | DataStoreError::Validation(_) => EXIT_CONFIGURATION,
        DataStoreError::ResourceConflict(_) | DataStoreError::MethodNotAllowed(_) => EXIT_CONFLICT,
        DataStoreError::ServiceUnavailable
        | DataStoreError::RequestRateExceeded(_)
        | DataStoreError::Connection(_)
        | DataStoreError::CosmosDb(CosmosDbError::ConnectionFailed(_))
        | DataStoreError::CosmosDb(CosmosDbError::AuthenticationFailed(_)) => EXIT_CONNECTION,
        _ => EXIT_FATAL,
    }
}

/// Prints an error and returns its exit code
pub fn report(context: &str, error: &DataStoreError) -> i32 {
    tracing::error!(error = %error, context, "Command failed");
    println!("❌ {context}");
    println!("   Error: {error}");
    exit_code_for(error)
}

/// Loads configuration, printing the failure on error
pub fn load(config_path: &str) -> Result<DataStoreConfig, i32> {
    load_config(config_path).map_err(|e| report("Failed to load configuration file", &e))
}

/// Builds a key from command arguments
pub fn resource_key(
    resource_type: &str,
    id: &str,
    version: Option<&str>,
) -> crate::domain::Result<ResourceKey> {
    let key = ResourceKey::new(resource_type, id).map_err(DataStoreError::Validation)?;
    Ok(match version {
        Some(version) => key.with_version(version),
        None => key,
    })
}

/// Parses an `--if-match` value
pub fn if_match(value: Option<&str>) -> crate::domain::Result<Option<WeakETag>> {
    value
        .map(|v| v.parse::<WeakETag>().map_err(DataStoreError::Validation))
        .transpose()
}

/// A data store plus the metrics forwarder feeding Log Analytics
pub struct StoreSession {
    pub data_store: FhirDataStore,
    forwarder: Option<JoinHandle<()>>,
}

impl StoreSession {
    /// Builds the data store described by `config`
    pub async fn open(config: &DataStoreConfig) -> crate::domain::Result<Self> {
        let mut sink = FanOutSink::new().with(Arc::new(TracingSink));
        let mut forwarder = None;

        if config.logging.azure_enabled {
            let logger = AzureLogger::new(&config.logging).await?;
            let (azure_sink, handle) = AzureMetricsSink::spawn(logger);
            sink = sink.with(Arc::new(azure_sink));
            forwarder = Some(handle);
        }

        let store = create_document_store(config).await?;
        let data_store = FhirDataStore::new(
            store,
            RetryPolicy::from_config(&config.retry),
            Arc::new(sink) as Arc<dyn NotificationSink>,
        );

        Ok(Self {
            data_store,
            forwarder,
        })
    }

    /// Drops the data store and waits briefly for queued metrics to be sent
    pub async fn close(self) {
        let Self {
            data_store,
            forwarder,
        } = self;
        drop(data_store);

        if let Some(handle) = forwarder {
            if tokio::time::timeout(METRICS_FLUSH_TIMEOUT, handle)
                .await
                .is_err()
            {
                tracing::warn!("Timed out flushing store request metrics");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::StoreFailure;
    use test_case::test_case;

    #[test_case(DataStoreError::Configuration("x".into()) => EXIT_CONFIGURATION; "configuration")]
    #[test_case(DataStoreError::ResourceConflict(Some(WeakETag::from_version_id("1"))) => EXIT_CONFLICT; "conflict")]
    #[test_case(DataStoreError::MethodNotAllowed("x".into()) => EXIT_CONFLICT; "not allowed")]
    #[test_case(DataStoreError::ServiceUnavailable => EXIT_CONNECTION; "unavailable")]
    #[test_case(DataStoreError::RequestRateExceeded(None) => EXIT_CONNECTION; "throttled")]
    #[test_case(DataStoreError::Store(StoreFailure::new(500, "boom")) => EXIT_FATAL; "store")]
    #[test_case(DataStoreError::Cancelled => EXIT_FATAL; "cancelled")]
    fn test_exit_code_for(error: DataStoreError) -> i32 {
        exit_code_for(&error)
    }

    #[tokio::test]
    async fn test_open_memory_session() {
        let config = crate::config::parse_config("store_target = \"memory\"\n").unwrap();
        let session = StoreSession::open(&config).await.unwrap();
        assert_eq!(
            session.data_store.collection().link(),
            "dbs/memory/colls/resources"
        );
        session.close().await;
    }
}
