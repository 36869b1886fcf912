//! Cosmos DB REST wire models

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Body of a query response
#[derive(Debug, Clone, Deserialize)]
pub struct QueryResponseBody {
    #[serde(rename = "Documents", default)]
    pub documents: Vec<Value>,

    #[serde(rename = "_count", default)]
    pub count: usize,
}

/// Body of a stored procedure create request
#[derive(Debug, Clone, Serialize)]
pub struct StoredProcedureBody {
    pub id: String,
    pub body: String,
}

/// Error body returned with non-success responses
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub code: String,

    #[serde(default)]
    pub message: String,
}
