//! Domain error types
//!
//! This module defines the error hierarchy for the data store.
//! Errors are domain-specific and don't expose third-party types: failures
//! reported by a document store are carried as [`StoreFailure`] values and
//! classified into [`DataStoreError`] kinds exactly once, at the data store
//! boundary.

use super::key::WeakETag;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// HTTP status codes the document store reports that carry domain meaning
pub mod status {
    /// The request was malformed, or a stored procedure raised an error
    pub const BAD_REQUEST: u16 = 400;
    /// The document or resource does not exist
    pub const NOT_FOUND: u16 = 404;
    /// The request timed out inside the store
    pub const REQUEST_TIMEOUT: u16 = 408;
    /// A document with the same id already exists
    pub const CONFLICT: u16 = 409;
    /// A conditional write did not match the current version
    pub const PRECONDITION_FAILED: u16 = 412;
    /// The request exceeded a size or script budget
    pub const REQUEST_ENTITY_TOO_LARGE: u16 = 413;
    /// The request rate exceeded the provisioned throughput
    pub const TOO_MANY_REQUESTS: u16 = 429;
    /// The store asks the client to retry the same request
    pub const RETRY_WITH: u16 = 449;
    /// The store failed internally
    pub const INTERNAL_SERVER_ERROR: u16 = 500;
    /// The store is overloaded or down
    pub const SERVICE_UNAVAILABLE: u16 = 503;
}

/// Main data store error type
///
/// Callers branch on these kinds instead of inspecting store codes.
#[derive(Debug, Error)]
pub enum DataStoreError {
    /// The supplied concurrency token does not match the current version,
    /// or it asserts a version of a resource that does not exist. `None`
    /// when a concurrent writer won without the caller asserting a version.
    #[error("{}", format_conflict(.0))]
    ResourceConflict(Option<WeakETag>),

    /// The request shape is not allowed, e.g. update-only on a missing resource
    #[error("Method not allowed: {0}")]
    MethodNotAllowed(String),

    /// The backend is overloaded or down
    #[error("The data store is currently unavailable")]
    ServiceUnavailable,

    /// The operation exceeded a size or rate limit of the backend
    #[error("Request rate exceeded{}", format_retry_after(.0))]
    RequestRateExceeded(Option<Duration>),

    /// Any other failure reported by the document store, unchanged
    #[error("Document store error: {0}")]
    Store(#[from] StoreFailure),

    /// The caller cancelled the operation
    #[error("Operation was cancelled")]
    Cancelled,

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Cosmos DB provisioning and connection errors
    #[error("Cosmos DB error: {0}")]
    CosmosDb(#[from] CosmosDbError),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Network/connection errors
    #[error("Connection error: {0}")]
    Connection(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// Azure logging errors
    #[error("Azure logging error: {0}")]
    AzureLogging(String),
}

impl DataStoreError {
    /// Whether the caller can recover by re-reading or waiting and retrying
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DataStoreError::ResourceConflict(_)
                | DataStoreError::ServiceUnavailable
                | DataStoreError::RequestRateExceeded(_)
        )
    }

    /// The retry hint carried by a rate-limit error
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            DataStoreError::RequestRateExceeded(retry_after) => *retry_after,
            DataStoreError::Store(failure) => failure.retry_after,
            _ => None,
        }
    }
}

fn format_conflict(etag: &Option<WeakETag>) -> String {
    match etag {
        Some(etag) => format!(
            "Version '{}' of the resource does not match the current version",
            etag.version_id()
        ),
        None => "The resource was modified concurrently".to_string(),
    }
}

fn format_retry_after(retry_after: &Option<Duration>) -> String {
    match retry_after {
        Some(delay) => format!(", retry after {}ms", delay.as_millis()),
        None => String::new(),
    }
}

/// A failure reported by the document store
///
/// Carries the HTTP status code, the optional sub-status, the optional
/// server-supplied retry hint and the request charge consumed by the
/// failed attempt.
#[derive(Debug, Clone, PartialEq, Error)]
pub struct StoreFailure {
    /// HTTP status code
    pub status: u16,

    /// Sub-status code (errors raised inside stored procedures surface here)
    pub sub_status: Option<u16>,

    /// Server-supplied delay before the request may be retried
    pub retry_after: Option<Duration>,

    /// Request units consumed by the failed request
    pub request_charge: f64,

    /// Message reported by the store
    pub message: String,
}

impl StoreFailure {
    /// Creates a failure with the given status and message
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            sub_status: None,
            retry_after: None,
            request_charge: 0.0,
            message: message.into(),
        }
    }

    /// Creates the failure a stored procedure produces when it raises `code`
    ///
    /// Errors raised inside a procedure come back as a bad request whose
    /// sub-status is the raised code.
    pub fn from_procedure(code: u16, message: impl Into<String>) -> Self {
        Self::new(status::BAD_REQUEST, message).with_sub_status(code)
    }

    /// Sets the sub-status
    pub fn with_sub_status(mut self, sub_status: u16) -> Self {
        self.sub_status = Some(sub_status);
        self
    }

    /// Sets the retry hint
    pub fn with_retry_after(mut self, retry_after: Duration) -> Self {
        self.retry_after = Some(retry_after);
        self
    }

    /// Sets the request charge
    pub fn with_request_charge(mut self, request_charge: f64) -> Self {
        self.request_charge = request_charge;
        self
    }

    /// The effective signal of this failure
    ///
    /// Procedure errors are reported as 400 with the meaningful code in the
    /// sub-status; for those the sub-status is the signal, otherwise the
    /// HTTP status is.
    pub fn signal(&self) -> u16 {
        match self.sub_status {
            Some(sub_status) if self.status == status::BAD_REQUEST && sub_status >= 400 => {
                sub_status
            }
            _ => self.status,
        }
    }

    /// Whether the store reported that the target does not exist
    pub fn is_not_found(&self) -> bool {
        self.signal() == status::NOT_FOUND
    }

    /// Whether the store throttled the request
    pub fn is_throttled(&self) -> bool {
        self.signal() == status::TOO_MANY_REQUESTS
    }
}

impl fmt::Display for StoreFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "status {}", self.status)?;
        if let Some(sub_status) = self.sub_status {
            write!(f, "/{sub_status}")?;
        }
        write!(f, ": {}", self.message)
    }
}

/// Cosmos DB-specific errors
///
/// Errors that occur while connecting to or provisioning Azure Cosmos DB.
/// These errors don't expose third-party SDK types.
#[derive(Debug, Error)]
pub enum CosmosDbError {
    /// Failed to connect to Cosmos DB
    #[error("Failed to connect to Cosmos DB: {0}")]
    ConnectionFailed(String),

    /// Authentication failed
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Failed to create database
    #[error("Failed to create database: {0}")]
    DatabaseCreationFailed(String),

    /// Failed to create collection
    #[error("Failed to create collection: {0}")]
    CollectionCreationFailed(String),

    /// Failed to install a stored procedure
    #[error("Failed to install stored procedure {name}: {message}")]
    ProcedureInstallFailed { name: String, message: String },

    /// Invalid request
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

// Conversion from std::io::Error
impl From<std::io::Error> for DataStoreError {
    fn from(err: std::io::Error) -> Self {
        DataStoreError::Io(err.to_string())
    }
}

// Conversion from serde_json::Error
impl From<serde_json::Error> for DataStoreError {
    fn from(err: serde_json::Error) -> Self {
        DataStoreError::Serialization(err.to_string())
    }
}

// Conversion from toml parse errors
impl From<toml::de::Error> for DataStoreError {
    fn from(err: toml::de::Error) -> Self {
        DataStoreError::Configuration(format!("TOML parse error: {err}"))
    }
}
