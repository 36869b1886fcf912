//! Azure Log Analytics integration
//!
//! Forwards store request notifications to a Log Analytics workspace through
//! the Logs Ingestion API, authenticating with an Azure AD client secret
//! credential against a Data Collection Rule (DCR) and Data Collection
//! Endpoint (DCE).
//!
//! # Example
//!
//! ```no_run
//! use fhir_datastore::config::LoggingConfig;
//! use fhir_datastore::logging::azure::{AzureLogger, AzureMetricsSink};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = LoggingConfig::default();
//! if config.azure_enabled {
//!     let logger = AzureLogger::new(&config).await?;
//!     let (sink, _forwarder) = AzureMetricsSink::spawn(logger);
//!     // Pass `sink` to FhirDataStore::new
//! }
//! # Ok(())
//! # }
//! ```

use crate::config::LoggingConfig;
use crate::core::notification::{NotificationSink, StoreRequestMetrics};
use crate::domain::{DataStoreError, Result};
use azure_core::credentials::TokenCredential;
use azure_identity::ClientSecretCredential;
use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Largest number of records sent in one ingestion request
pub const MAX_BATCH_SIZE: usize = 100;

const MONITOR_SCOPE: &str = "https://monitor.azure.com/.default";

fn required(value: &Option<String>, name: &str) -> Result<String> {
    value.clone().ok_or_else(|| {
        DataStoreError::Configuration(format!(
            "{name} is required when Azure logging is enabled"
        ))
    })
}

/// Azure logger for Log Analytics using the Logs Ingestion API
pub struct AzureLogger {
    credential: Arc<ClientSecretCredential>,
    workspace_id: String,
    dcr_immutable_id: String,
    dce_endpoint: String,
    stream_name: String,
    http_client: reqwest::Client,
}

impl AzureLogger {
    /// Create a new Azure logger from configuration
    ///
    /// # Errors
    ///
    /// Returns an error if Azure logging is not enabled or required settings
    /// are missing
    pub async fn new(config: &LoggingConfig) -> Result<Self> {
        use secrecy::ExposeSecret;

        if !config.azure_enabled {
            return Err(DataStoreError::Configuration(
                "Azure logging is not enabled".to_string(),
            ));
        }

        let tenant_id = required(&config.azure_tenant_id, "azure_tenant_id")?;
        let client_id = required(&config.azure_client_id, "azure_client_id")?;
        let workspace_id = required(
            &config.azure_log_analytics_workspace_id,
            "azure_log_analytics_workspace_id",
        )?;
        let dcr_immutable_id = required(&config.azure_dcr_immutable_id, "azure_dcr_immutable_id")?;
        let dce_endpoint = required(&config.azure_dce_endpoint, "azure_dce_endpoint")?;
        let stream_name = required(&config.azure_stream_name, "azure_stream_name")?;

        let client_secret = config.azure_client_secret.as_ref().ok_or_else(|| {
            DataStoreError::Configuration(
                "azure_client_secret is required when Azure logging is enabled".to_string(),
            )
        })?;
        let secret =
            azure_core::credentials::Secret::new(client_secret.expose_secret().as_ref().to_string());

        let credential = ClientSecretCredential::new(&tenant_id, client_id, secret, None)
            .map_err(|e| {
                DataStoreError::AzureLogging(format!("Failed to create Azure AD credential: {e}"))
            })?;

        let http_client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| {
                DataStoreError::Configuration(format!("Failed to create HTTP client: {e}"))
            })?;

        info!(
            workspace_id = %workspace_id,
            dcr_id = %dcr_immutable_id,
            stream = %stream_name,
            "Azure Log Analytics logger initialized"
        );

        Ok(Self {
            credential,
            workspace_id,
            dcr_immutable_id,
            dce_endpoint,
            stream_name,
            http_client,
        })
    }

    pub fn workspace_id(&self) -> &str {
        &self.workspace_id
    }

    async fn get_access_token(&self) -> Result<String> {
        let token = TokenCredential::get_token(&*self.credential, &[MONITOR_SCOPE], None)
            .await
            .map_err(|e| {
                DataStoreError::AzureLogging(format!("Failed to acquire Azure AD token: {e}"))
            })?;

        Ok(token.token.secret().to_string())
    }

    fn ingestion_url(&self) -> String {
        format!(
            "{}/dataCollectionRules/{}/streams/{}?api-version=2023-01-01",
            self.dce_endpoint.trim_end_matches('/'),
            self.dcr_immutable_id,
            self.stream_name
        )
    }

    /// Send log records to Azure Log Analytics via the Logs Ingestion API
    async fn send_logs(&self, records: Value) -> Result<()> {
        let token = self.get_access_token().await?;
        let url = self.ingestion_url();
        let record_count = records.as_array().map(Vec::len).unwrap_or(0);

        debug!(url = %url, record_count, "Sending logs to Azure Log Analytics");

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(token)
            .json(&records)
            .send()
            .await
            .map_err(|e| {
                DataStoreError::AzureLogging(format!("Failed to send logs to Azure: {e}"))
            })?;

        let status = response.status();
        if status.is_success() {
            debug!(status = %status, record_count, "Sent logs to Azure Log Analytics");
            Ok(())
        } else {
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            error!(
                status = %status,
                error = %error_body,
                "Failed to send logs to Azure Log Analytics"
            );
            Err(DataStoreError::AzureLogging(format!(
                "Azure Log Analytics API returned status {status}: {error_body}"
            )))
        }
    }

    /// Sends a batch of store request notifications
    pub async fn log_store_requests(&self, events: &[StoreRequestMetrics]) -> Result<()> {
        if events.is_empty() {
            return Ok(());
        }
        let records: Vec<Value> = events.iter().map(store_request_record).collect();
        self.send_logs(Value::Array(records)).await
    }

    /// Sends a single error record
    pub async fn log_error(
        &self,
        error_type: &str,
        error_message: &str,
        resource_type: Option<&str>,
    ) -> Result<()> {
        let record = json!([{
            "TimeGenerated": Utc::now().to_rfc3339(),
            "Operation": "error",
            "ResourceType": resource_type.unwrap_or(""),
            "StatusCode": Value::Null,
            "RequestCharge": 0.0,
            "LatencyMs": 0,
            "ErrorMessage": format!("[{error_type}] {error_message}"),
        }]);

        self.send_logs(record).await
    }
}

/// Log Analytics row for one notification
pub fn store_request_record(event: &StoreRequestMetrics) -> Value {
    json!({
        "TimeGenerated": event.timestamp.to_rfc3339(),
        "Operation": event.operation,
        "ResourceType": event.resource_type.as_deref().unwrap_or(""),
        "StatusCode": event.status_code,
        "RequestCharge": event.request_charge,
        "LatencyMs": event.latency.as_millis() as u64,
        "ErrorMessage": "",
    })
}

/// Notification sink that forwards events to Log Analytics
///
/// `publish` only enqueues; a background task drains the queue in batches
/// of up to [`MAX_BATCH_SIZE`]. The task ends once every sink clone is dropped.
#[derive(Clone)]
pub struct AzureMetricsSink {
    tx: mpsc::UnboundedSender<StoreRequestMetrics>,
}

impl AzureMetricsSink {
    /// Starts the forwarding task and returns the sink feeding it
    pub fn spawn(logger: AzureLogger) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::unbounded_channel::<StoreRequestMetrics>();

        let handle = tokio::spawn(async move {
            while let Some(first) = rx.recv().await {
                let mut batch = vec![first];
                while batch.len() < MAX_BATCH_SIZE {
                    match rx.try_recv() {
                        Ok(event) => batch.push(event),
                        Err(_) => break,
                    }
                }

                if let Err(e) = logger.log_store_requests(&batch).await {
                    warn!(error = %e, dropped = batch.len(), "Dropping store request metrics");
                }
            }
        });

        (Self { tx }, handle)
    }
}

impl NotificationSink for AzureMetricsSink {
    fn publish(&self, event: StoreRequestMetrics) {
        let _ = self.tx.send(event);
    }
}
