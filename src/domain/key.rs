//! Resource identity and concurrency token types
//!
//! A [`ResourceKey`] names a logical resource, optionally pinned to one
//! version. A [`WeakETag`] is the version token a caller supplies to assert
//! which version it last observed.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifies a logical resource, or one historical version of it
///
/// # Examples
///
/// ```
/// use fhir_datastore::domain::key::ResourceKey;
///
/// let key = ResourceKey::new("Patient", "example").unwrap();
/// assert_eq!(key.to_partition_key(), "Patient_example");
/// assert!(key.version_id().is_none());
///
/// let versioned = key.with_version("2");
/// assert_eq!(versioned.version_id(), Some("2"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceKey {
    resource_type: String,
    id: String,
    version_id: Option<String>,
}

impl ResourceKey {
    /// Creates an unversioned key
    ///
    /// # Errors
    ///
    /// Returns an error if the resource type or id is empty
    pub fn new(resource_type: impl Into<String>, id: impl Into<String>) -> Result<Self, String> {
        let resource_type = resource_type.into();
        let id = id.into();

        if resource_type.trim().is_empty() {
            return Err("Resource type cannot be empty".to_string());
        }
        if id.trim().is_empty() {
            return Err("Resource id cannot be empty".to_string());
        }

        Ok(Self {
            resource_type,
            id,
            version_id: None,
        })
    }

    /// Creates a key pinned to a specific version
    pub fn versioned(
        resource_type: impl Into<String>,
        id: impl Into<String>,
        version_id: impl Into<String>,
    ) -> Result<Self, String> {
        Ok(Self::new(resource_type, id)?.with_version(version_id))
    }

    /// Returns a copy of this key pinned to `version_id`
    pub fn with_version(&self, version_id: impl Into<String>) -> Self {
        Self {
            resource_type: self.resource_type.clone(),
            id: self.id.clone(),
            version_id: Some(version_id.into()),
        }
    }

    /// Returns the resource type
    pub fn resource_type(&self) -> &str {
        &self.resource_type
    }

    /// Returns the logical id
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the version, if the key is pinned to one
    pub fn version_id(&self) -> Option<&str> {
        self.version_id.as_deref()
    }

    /// The partition that colocates every version of this logical resource
    pub fn to_partition_key(&self) -> String {
        partition_key_for(&self.resource_type, &self.id)
    }
}

/// Builds the partition key for a logical resource
pub fn partition_key_for(resource_type: &str, id: &str) -> String {
    format!("{resource_type}_{id}")
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version_id {
            Some(version) => write!(f, "{}/{}/_history/{}", self.resource_type, self.id, version),
            None => write!(f, "{}/{}", self.resource_type, self.id),
        }
    }
}

/// Opaque version token used for optimistic concurrency
///
/// Semantically the version id of the resource the caller last saw. It is
/// rendered on the wire in the weak form `W/"<version>"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WeakETag(String);

impl WeakETag {
    /// Creates a token from a bare version id
    pub fn from_version_id(version_id: impl Into<String>) -> Self {
        Self(version_id.into())
    }

    /// Parses a weak ETag header value
    ///
    /// Accepts `W/"<version>"`, and also a bare quoted or unquoted version.
    ///
    /// # Errors
    ///
    /// Returns an error if the token carries no version
    pub fn parse(value: &str) -> Result<Self, String> {
        let trimmed = value.trim();
        let inner = trimmed.strip_prefix("W/").unwrap_or(trimmed);
        let version = inner
            .strip_prefix('"')
            .and_then(|rest| rest.strip_suffix('"'))
            .unwrap_or(inner);

        if version.is_empty() {
            return Err(format!("Invalid weak ETag: '{value}'"));
        }

        Ok(Self(version.to_string()))
    }

    /// The version id this token asserts
    pub fn version_id(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WeakETag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "W/\"{}\"", self.0)
    }
}

impl FromStr for WeakETag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_key_rejects_empty_parts() {
        assert!(ResourceKey::new("", "a").is_err());
        assert!(ResourceKey::new("Patient", "  ").is_err());
    }

    #[test]
    fn test_partition_key() {
        let key = ResourceKey::versioned("Observation", "obs-1", "4").unwrap();
        assert_eq!(key.to_partition_key(), "Observation_obs-1");
    }

    #[test]
    fn test_resource_key_display() {
        let key = ResourceKey::new("Patient", "p1").unwrap();
        assert_eq!(key.to_string(), "Patient/p1");
        assert_eq!(key.with_version("3").to_string(), "Patient/p1/_history/3");
    }

    #[test]
    fn test_weak_etag_parse_forms() {
        assert_eq!(WeakETag::parse("W/\"7\"").unwrap().version_id(), "7");
        assert_eq!(WeakETag::parse("\"7\"").unwrap().version_id(), "7");
        assert_eq!(WeakETag::parse("7").unwrap().version_id(), "7");
        assert!(WeakETag::parse("W/\"\"").is_err());
    }

    #[test]
    fn test_weak_etag_display() {
        let etag = WeakETag::from_version_id("12");
        assert_eq!(etag.to_string(), "W/\"12\"");
        assert_eq!(etag.to_string().parse::<WeakETag>().unwrap(), etag);
    }
}
