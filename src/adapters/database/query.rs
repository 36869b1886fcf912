//! Declarative, partition-scoped queries
//!
//! A [`QueryDefinition`] is a conjunction of equality predicates over
//! document fields. It renders to parameterized SQL for the Cosmos DB
//! backend and evaluates directly against JSON for the in-memory one.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A named query parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryParameter {
    pub name: String,
    pub value: Value,
}

/// Parameterized SQL in the shape the store accepts as a request body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SqlQuerySpec {
    pub query: String,
    pub parameters: Vec<QueryParameter>,
}

/// Conjunction of `field = value` predicates
///
/// # Examples
///
/// ```
/// use fhir_datastore::adapters::database::query::QueryDefinition;
///
/// let query = QueryDefinition::new()
///     .where_eq("resourceId", "p1")
///     .where_eq("version", "2");
///
/// let spec = query.to_sql();
/// assert_eq!(
///     spec.query,
///     "SELECT * FROM root r WHERE r.resourceId = @p0 AND r.version = @p1"
/// );
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryDefinition {
    predicates: Vec<(String, Value)>,
}

impl QueryDefinition {
    /// Creates a query matching every document
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an equality predicate
    pub fn where_eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.predicates.push((field.into(), value.into()));
        self
    }

    /// The predicates, in the order they were added
    pub fn predicates(&self) -> &[(String, Value)] {
        &self.predicates
    }

    /// Renders parameterized SQL
    pub fn to_sql(&self) -> SqlQuerySpec {
        let mut query = String::from("SELECT * FROM root r");
        let mut parameters = Vec::with_capacity(self.predicates.len());

        for (i, (field, value)) in self.predicates.iter().enumerate() {
            let name = format!("@p{i}");
            query.push_str(if i == 0 { " WHERE " } else { " AND " });
            query.push_str(&format!("r.{field} = {name}"));
            parameters.push(QueryParameter {
                name,
                value: value.clone(),
            });
        }

        SqlQuerySpec { query, parameters }
    }

    /// Whether a document satisfies every predicate
    pub fn matches(&self, document: &Value) -> bool {
        self.predicates
            .iter()
            .all(|(field, value)| document.get(field) == Some(value))
    }
}

/// Paging and partition options for a query
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryOptions {
    /// Restricts the query to one partition
    pub partition_key: Option<String>,

    /// Maximum number of documents per page
    pub max_item_count: Option<u32>,

    /// Continuation token of the page to draw
    pub continuation: Option<String>,
}

impl QueryOptions {
    /// Options scoped to a single partition
    pub fn for_partition(partition_key: impl Into<String>) -> Self {
        Self {
            partition_key: Some(partition_key.into()),
            ..Default::default()
        }
    }

    /// Sets the page size
    pub fn with_max_item_count(mut self, max_item_count: u32) -> Self {
        self.max_item_count = Some(max_item_count);
        self
    }

    /// Resumes from a continuation token
    pub fn with_continuation(mut self, continuation: impl Into<String>) -> Self {
        self.continuation = Some(continuation.into());
        self
    }
}
