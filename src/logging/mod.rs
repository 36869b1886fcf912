//! Logging and observability
//!
//! - Console and JSON rolling-file logging via `tracing`
//! - Store request metrics forwarded to Azure Log Analytics
//!
//! # Example
//!
//! ```no_run
//! use fhir_datastore::logging::init_logging;
//! use fhir_datastore::config::LoggingConfig;
//!
//! let config = LoggingConfig::default();
//! let _guard = init_logging("info", &config).expect("Failed to initialize logging");
//!
//! tracing::info!("Data store started");
//! ```

pub mod azure;
pub mod structured;

pub use azure::{AzureLogger, AzureMetricsSink};
pub use structured::{init_logging, LoggingGuard};

/// Log a completed store operation
///
/// # Example
///
/// ```no_run
/// use fhir_datastore::log_store_operation;
///
/// log_store_operation!("upsert", "Patient/p1", "Created version 1");
/// ```
#[macro_export]
macro_rules! log_store_operation {
    ($operation:expr, $resource:expr, $outcome:expr) => {
        tracing::info!(
            operation = $operation,
            resource = %$resource,
            outcome = %$outcome,
            "Store operation completed"
        );
    };
}

/// Log a store failure that is not otherwise classified
///
/// # Example
///
/// ```no_run
/// use fhir_datastore::log_store_failure;
/// use fhir_datastore::domain::StoreFailure;
///
/// let failure = StoreFailure::new(500, "Internal error");
/// log_store_failure!("upsert", "Patient/p1", &failure);
/// ```
#[macro_export]
macro_rules! log_store_failure {
    ($operation:expr, $resource:expr, $failure:expr) => {
        tracing::error!(
            operation = $operation,
            resource = %$resource,
            status = $failure.status,
            sub_status = ?$failure.sub_status,
            error = %$failure,
            "Unhandled store failure"
        );
    };
}

/// Log an error with context
///
/// # Example
///
/// ```no_run
/// use fhir_datastore::log_error_with_context;
/// use fhir_datastore::domain::DataStoreError;
///
/// let error = DataStoreError::Configuration("Invalid config".to_string());
/// log_error_with_context!(&error, "Failed to load configuration");
/// ```
#[macro_export]
macro_rules! log_error_with_context {
    ($error:expr, $context:expr) => {
        tracing::error!(
            error = %$error,
            context = $context,
            "Error occurred"
        );
    };
}
