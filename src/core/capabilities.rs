//! Capability advertisement
//!
//! Declares, per resource type, the interactions the data store supports,
//! written to a [`CapabilityStatementBuilder`] that renders the
//! `rest.resource` fragment of a FHIR CapabilityStatement

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::{BTreeMap, BTreeSet};

/// Supported FHIR interactions for a resource type
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Interaction {
    /// read - Read the current state of the resource
    Read,
    /// vread - Read a specific version
    Vread,
    /// update - Update an existing resource
    Update,
    /// delete - Delete a resource
    Delete,
    /// history-instance - Retrieve history for a resource instance
    HistoryInstance,
    /// create - Create a new resource
    Create,
}

impl std::fmt::Display for Interaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Interaction::Read => write!(f, "read"),
            Interaction::Vread => write!(f, "vread"),
            Interaction::Update => write!(f, "update"),
            Interaction::Delete => write!(f, "delete"),
            Interaction::HistoryInstance => write!(f, "history-instance"),
            Interaction::Create => write!(f, "create"),
        }
    }
}

/// How a resource type is versioned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum VersioningPolicy {
    #[default]
    NoVersion,
    Versioned,
    VersionedUpdate,
}

impl std::fmt::Display for VersioningPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VersioningPolicy::NoVersion => write!(f, "no-version"),
            VersioningPolicy::Versioned => write!(f, "versioned"),
            VersioningPolicy::VersionedUpdate => write!(f, "versioned-update"),
        }
    }
}

/// Declared capabilities of one resource type
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourceComponent {
    pub interactions: BTreeSet<Interaction>,
    pub versioning: VersioningPolicy,
    pub read_history: bool,
    pub update_create: bool,
}

/// Collects per-resource-type declarations
#[derive(Debug, Clone, Default)]
pub struct CapabilityStatementBuilder {
    resources: BTreeMap<String, ResourceComponent>,
}

impl CapabilityStatementBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies `update` to the component of `resource_type`, creating it if needed
    pub fn apply<F>(&mut self, resource_type: &str, update: F) -> &mut Self
    where
        F: FnOnce(&mut ResourceComponent),
    {
        update(self.resources.entry(resource_type.to_string()).or_default());
        self
    }

    /// Adds supported interactions
    pub fn add_interactions(
        &mut self,
        resource_type: &str,
        interactions: impl IntoIterator<Item = Interaction>,
    ) -> &mut Self {
        self.apply(resource_type, |c| c.interactions.extend(interactions))
    }

    /// The declaration for a resource type, if any
    pub fn resource(&self, resource_type: &str) -> Option<&ResourceComponent> {
        self.resources.get(resource_type)
    }

    /// Renders the `rest.resource` array
    pub fn to_json(&self) -> Value {
        let resources: Vec<Value> = self
            .resources
            .iter()
            .map(|(resource_type, component)| {
                let interactions: Vec<Value> = component
                    .interactions
                    .iter()
                    .map(|i| json!({ "code": i.to_string() }))
                    .collect();

                json!({
                    "type": resource_type,
                    "interaction": interactions,
                    "versioning": component.versioning.to_string(),
                    "readHistory": component.read_history,
                    "updateCreate": component.update_create,
                })
            })
            .collect();

        Value::Array(resources)
    }
}

/// Something that declares capabilities
pub trait CapabilityProvider {
    fn build(&self, builder: &mut CapabilityStatementBuilder);
}

/// Capabilities of the versioned data store
#[derive(Debug, Clone)]
pub struct DataStoreCapabilities {
    resource_types: Vec<String>,
}

impl DataStoreCapabilities {
    /// Interactions every resource type supports
    pub const INTERACTIONS: [Interaction; 6] = [
        Interaction::Read,
        Interaction::Vread,
        Interaction::HistoryInstance,
        Interaction::Create,
        Interaction::Update,
        Interaction::Delete,
    ];

    pub fn new<I, S>(resource_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            resource_types: resource_types.into_iter().map(Into::into).collect(),
        }
    }
}

impl CapabilityProvider for DataStoreCapabilities {
    fn build(&self, builder: &mut CapabilityStatementBuilder) {
        for resource_type in &self.resource_types {
            builder.apply(resource_type, |c| {
                c.interactions.extend(Self::INTERACTIONS);
                c.versioning = VersioningPolicy::Versioned;
                c.read_history = true;
                c.update_create = true;
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interaction_codes() {
        assert_eq!(Interaction::HistoryInstance.to_string(), "history-instance");
        assert_eq!(
            serde_json::to_value(Interaction::HistoryInstance).unwrap(),
            json!("history-instance")
        );
    }

    #[test]
    fn test_data_store_declarations() {
        let mut builder = CapabilityStatementBuilder::new();
        DataStoreCapabilities::new(["Patient", "Observation"]).build(&mut builder);

        let patient = builder.resource("Patient").unwrap();
        assert_eq!(patient.interactions.len(), 6);
        assert!(patient.interactions.contains(&Interaction::Vread));
        assert_eq!(patient.versioning, VersioningPolicy::Versioned);
        assert!(patient.read_history);
        assert!(patient.update_create);
        assert!(builder.resource("Encounter").is_none());
    }

    #[test]
    fn test_render_fragment() {
        let mut builder = CapabilityStatementBuilder::new();
        DataStoreCapabilities::new(["Patient"]).build(&mut builder);

        let json = builder.to_json();
        let patient = &json[0];
        assert_eq!(patient["type"], "Patient");
        assert_eq!(patient["versioning"], "versioned");
        assert_eq!(patient["readHistory"], true);
        assert_eq!(patient["updateCreate"], true);

        let codes: Vec<&str> = patient["interaction"]
            .as_array()
            .unwrap()
            .iter()
            .map(|i| i["code"].as_str().unwrap())
            .collect();
        assert_eq!(
            codes,
            vec!["read", "vread", "update", "delete", "history-instance", "create"]
        );
    }

    #[test]
    fn test_builder_merges_declarations() {
        let mut builder = CapabilityStatementBuilder::new();
        builder.add_interactions("Patient", [Interaction::Read]);
        DataStoreCapabilities::new(["Patient"]).build(&mut builder);
        assert_eq!(builder.resource("Patient").unwrap().interactions.len(), 6);
    }
}
