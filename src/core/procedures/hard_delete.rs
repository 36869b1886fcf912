//! Hard delete procedure contract

use super::ProcedureDefinition;
use crate::domain::{DataStoreError, ResourceKey, Result};
use serde_json::{json, Value};

/// A request to remove every version document of a logical resource
///
/// All-or-nothing within the resource's partition. Responds with the ids of
/// the removed documents. Raises 413 when the store's script budget does not
/// admit the whole delete.
#[derive(Debug, Clone)]
pub struct HardDelete {
    resource_type: String,
    resource_id: String,
    partition_key: String,
}

impl HardDelete {
    pub const DEFINITION: ProcedureDefinition = ProcedureDefinition {
        base_name: "hardDelete",
        body: include_str!("js/hard_delete.js"),
    };

    pub fn new(key: &ResourceKey) -> Self {
        Self {
            resource_type: key.resource_type().to_string(),
            resource_id: key.id().to_string(),
            partition_key: key.to_partition_key(),
        }
    }

    pub fn partition_key(&self) -> &str {
        &self.partition_key
    }

    /// Positional parameters: resource type, resource id
    pub fn parameters(&self) -> Vec<Value> {
        vec![json!(self.resource_type), json!(self.resource_id)]
    }

    /// Decodes the removed document ids
    pub fn parse_response(body: Value) -> Result<Vec<String>> {
        serde_json::from_value(body)
            .map_err(|e| DataStoreError::Serialization(format!("hardDelete response: {e}")))
    }
}
