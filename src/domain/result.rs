//! Result type alias for the data store
//!
//! This module provides a convenient Result type alias that uses
//! [`DataStoreError`] as the error type.

use super::errors::DataStoreError;

/// Result type alias for data store operations
///
/// # Examples
///
/// ```
/// use fhir_datastore::domain::result::Result;
/// use fhir_datastore::domain::errors::DataStoreError;
///
/// fn example_function() -> Result<String> {
///     Ok("success".to_string())
/// }
///
/// fn failing_function() -> Result<()> {
///     Err(DataStoreError::Validation("Invalid input".to_string()))
/// }
/// ```
pub type Result<T> = std::result::Result<T, DataStoreError>;
