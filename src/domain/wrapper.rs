//! Persisted resource model
//!
//! This module defines [`ResourceWrapper`], the persisted form of a domain
//! resource, and the outcome types returned by writes.

use super::key::{partition_key_for, ResourceKey, WeakETag};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Serialization format of a raw resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ResourceFormat {
    #[default]
    Json,
    Xml,
}

/// Serialized resource content together with its format
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawResource {
    /// Serialized resource content
    pub data: String,

    /// Format of `data`
    #[serde(default)]
    pub format: ResourceFormat,
}

impl RawResource {
    /// Serializes a JSON resource
    pub fn from_json(resource: &serde_json::Value) -> Result<Self, serde_json::Error> {
        Ok(Self {
            data: serde_json::to_string(resource)?,
            format: ResourceFormat::Json,
        })
    }

    /// Parses the content back into JSON
    pub fn to_json(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::from_str(&self.data)
    }
}

/// The persisted form of a domain resource
///
/// A wrapper is replaced wholesale on every write; only the transactional
/// procedures assign versions and toggle the history flag.
///
/// # Examples
///
/// ```
/// use fhir_datastore::domain::wrapper::ResourceWrapper;
/// use serde_json::json;
///
/// let wrapper = ResourceWrapper::builder()
///     .resource(&json!({"resourceType": "Patient", "id": "p1"}))
///     .unwrap()
///     .build()
///     .unwrap();
///
/// assert_eq!(wrapper.resource_type_name, "Patient");
/// assert_eq!(wrapper.resource_id, "p1");
/// assert!(!wrapper.is_deleted);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceWrapper {
    /// Resource type, e.g. `Patient`
    pub resource_type_name: String,

    /// Logical id
    pub resource_id: String,

    /// Version id; empty until a procedure assigns one
    #[serde(default)]
    pub version: String,

    /// Serialized resource content
    pub raw_resource: RawResource,

    /// Whether this write marks the resource as deleted
    #[serde(default)]
    pub is_deleted: bool,

    /// Whether this is a retained prior version
    #[serde(default)]
    pub is_history: bool,

    /// Timestamp of the write
    pub last_modified: DateTime<Utc>,
}

impl ResourceWrapper {
    /// Creates a new builder for constructing a ResourceWrapper
    pub fn builder() -> ResourceWrapperBuilder {
        ResourceWrapperBuilder::default()
    }

    /// Creates a delete marker for a logical resource
    pub fn deleted_marker(key: &ResourceKey) -> Self {
        Self {
            resource_type_name: key.resource_type().to_string(),
            resource_id: key.id().to_string(),
            version: String::new(),
            raw_resource: RawResource {
                data: "{}".to_string(),
                format: ResourceFormat::Json,
            },
            is_deleted: true,
            is_history: false,
            last_modified: Utc::now(),
        }
    }

    /// The unversioned key of this resource
    pub fn key(&self) -> Result<ResourceKey, String> {
        ResourceKey::new(&self.resource_type_name, &self.resource_id)
    }

    /// The partition this resource lives in
    pub fn partition_key(&self) -> String {
        partition_key_for(&self.resource_type_name, &self.resource_id)
    }

    /// The concurrency token for the stored version
    pub fn weak_etag(&self) -> Option<WeakETag> {
        if self.version.is_empty() {
            None
        } else {
            Some(WeakETag::from_version_id(&self.version))
        }
    }
}

/// Builder for constructing ResourceWrapper instances
#[derive(Debug, Default)]
pub struct ResourceWrapperBuilder {
    resource_type_name: Option<String>,
    resource_id: Option<String>,
    raw_resource: Option<RawResource>,
    is_deleted: bool,
    last_modified: Option<DateTime<Utc>>,
}

impl ResourceWrapperBuilder {
    /// Creates a new ResourceWrapperBuilder
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes type, id and content from a JSON resource
    ///
    /// # Errors
    ///
    /// Returns an error if the resource lacks `resourceType` or `id`
    pub fn resource(mut self, resource: &serde_json::Value) -> Result<Self, String> {
        let resource_type = resource
            .get("resourceType")
            .and_then(|v| v.as_str())
            .ok_or("resource is missing 'resourceType'")?;
        let id = resource
            .get("id")
            .and_then(|v| v.as_str())
            .ok_or("resource is missing 'id'")?;

        self.resource_type_name = Some(resource_type.to_string());
        self.resource_id = Some(id.to_string());
        self.raw_resource =
            Some(RawResource::from_json(resource).map_err(|e| format!("resource: {e}"))?);
        Ok(self)
    }

    /// Sets the resource type
    pub fn resource_type_name(mut self, resource_type_name: impl Into<String>) -> Self {
        self.resource_type_name = Some(resource_type_name.into());
        self
    }

    /// Sets the logical id
    pub fn resource_id(mut self, resource_id: impl Into<String>) -> Self {
        self.resource_id = Some(resource_id.into());
        self
    }

    /// Sets the raw content
    pub fn raw_resource(mut self, raw_resource: RawResource) -> Self {
        self.raw_resource = Some(raw_resource);
        self
    }

    /// Marks the write as a delete
    pub fn deleted(mut self, is_deleted: bool) -> Self {
        self.is_deleted = is_deleted;
        self
    }

    /// Sets the modification timestamp
    pub fn last_modified(mut self, last_modified: DateTime<Utc>) -> Self {
        self.last_modified = Some(last_modified);
        self
    }

    /// Builds the ResourceWrapper
    ///
    /// # Errors
    ///
    /// Returns an error if any required field is missing
    pub fn build(self) -> Result<ResourceWrapper, String> {
        Ok(ResourceWrapper {
            resource_type_name: self
                .resource_type_name
                .ok_or("resource_type_name is required")?,
            resource_id: self.resource_id.ok_or("resource_id is required")?,
            version: String::new(),
            raw_resource: self.raw_resource.ok_or("raw_resource is required")?,
            is_deleted: self.is_deleted,
            is_history: false,
            last_modified: self.last_modified.unwrap_or_else(Utc::now),
        })
    }
}

/// Whether a write created the resource or updated an existing one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SaveOutcomeType {
    Created,
    Updated,
}

impl fmt::Display for SaveOutcomeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SaveOutcomeType::Created => write!(f, "Created"),
            SaveOutcomeType::Updated => write!(f, "Updated"),
        }
    }
}

/// Result of a successful write
#[derive(Debug, Clone, PartialEq)]
pub struct UpsertOutcome {
    /// The wrapper as stored, with its assigned version
    pub wrapper: ResourceWrapper,

    /// Whether the write created or updated the resource
    pub outcome_type: SaveOutcomeType,
}

impl UpsertOutcome {
    pub fn new(wrapper: ResourceWrapper, outcome_type: SaveOutcomeType) -> Self {
        Self {
            wrapper,
            outcome_type,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_builder_from_resource() {
        let resource = json!({"resourceType": "Observation", "id": "o1", "status": "final"});
        let wrapper = ResourceWrapper::builder()
            .resource(&resource)
            .unwrap()
            .build()
            .unwrap();

        assert_eq!(wrapper.partition_key(), "Observation_o1");
        assert_eq!(wrapper.raw_resource.to_json().unwrap(), resource);
        assert!(wrapper.version.is_empty());
        assert!(wrapper.weak_etag().is_none());
    }

    #[test]
    fn test_builder_requires_identity() {
        let err = ResourceWrapper::builder()
            .resource(&json!({"resourceType": "Patient"}))
            .unwrap_err();
        assert!(err.contains("'id'"));

        assert!(ResourceWrapper::builder().resource_id("x").build().is_err());
    }

    #[test]
    fn test_deleted_marker() {
        let key = ResourceKey::new("Patient", "gone").unwrap();
        let marker = ResourceWrapper::deleted_marker(&key);
        assert!(marker.is_deleted);
        assert_eq!(marker.key().unwrap(), key);
    }

    #[test]
    fn test_camel_case_serialization() {
        let mut wrapper = ResourceWrapper::builder()
            .resource(&json!({"resourceType": "Patient", "id": "p1"}))
            .unwrap()
            .build()
            .unwrap();
        wrapper.version = "2".to_string();

        let value = serde_json::to_value(&wrapper).unwrap();
        assert_eq!(value["resourceTypeName"], "Patient");
        assert_eq!(value["resourceId"], "p1");
        assert_eq!(value["isHistory"], false);
        assert_eq!(value["rawResource"]["format"], "Json");

        let back: ResourceWrapper = serde_json::from_value(value).unwrap();
        assert_eq!(back, wrapper);
    }
}
