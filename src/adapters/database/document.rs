//! Stored document model
//!
//! This module defines the document structure a [`ResourceWrapper`] is
//! persisted as. The current version of a logical resource is stored under
//! the resource id; retained prior versions under `{id}_{version}`. Every
//! version shares the partition `{resourceType}_{id}`.

use crate::domain::wrapper::ResourceWrapper;
use crate::domain::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Document as stored in the collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceDocument {
    /// Document id
    pub id: String,

    /// Partition key, `{resourceType}_{id}`
    pub partition_key: String,

    /// The persisted resource
    #[serde(flatten)]
    pub wrapper: ResourceWrapper,

    /// Store-assigned entity tag
    #[serde(rename = "_etag", default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
}

impl ResourceDocument {
    /// Document for the current version of a resource
    pub fn current(wrapper: ResourceWrapper) -> Self {
        Self {
            id: wrapper.resource_id.clone(),
            partition_key: wrapper.partition_key(),
            wrapper,
            etag: None,
        }
    }

    /// Document for a retained prior version
    pub fn history(mut wrapper: ResourceWrapper) -> Self {
        wrapper.is_history = true;
        Self {
            id: history_document_id(&wrapper.resource_id, &wrapper.version),
            partition_key: wrapper.partition_key(),
            wrapper,
            etag: None,
        }
    }

    /// Parses a document returned by the store
    pub fn from_value(value: Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }

    /// Serializes the document for the store
    pub fn to_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// Consumes the document and returns the wrapper
    pub fn into_wrapper(self) -> ResourceWrapper {
        self.wrapper
    }
}

/// Document id of a retained prior version
pub fn history_document_id(resource_id: &str, version: &str) -> String {
    format!("{resource_id}_{version}")
}
