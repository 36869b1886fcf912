//! Upsert-with-history procedure contract

use super::ProcedureDefinition;
use crate::adapters::database::document::ResourceDocument;
use crate::domain::{
    DataStoreError, ResourceWrapper, Result, SaveOutcomeType, UpsertOutcome, WeakETag,
};
use serde::Deserialize;
use serde_json::{json, Value};

/// A request to write a new current version of a resource
///
/// Within the resource's partition, atomically: checks the asserted version,
/// assigns the next version, optionally archives the prior current version
/// as history and writes the new current document.
///
/// Raised errors:
/// - 412 when `match_version_id` differs from the current version
/// - 404 when the resource is missing and a version was asserted, creation
///   is not allowed, or the write is a delete marker
/// - 404 when deleting an already deleted resource
#[derive(Debug, Clone)]
pub struct UpsertWithHistory {
    document: ResourceDocument,
    match_version_id: Option<String>,
    allow_create: bool,
    keep_history: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProcedureResponse {
    outcome_type: SaveOutcomeType,
    wrapper: ResourceDocument,
}

impl UpsertWithHistory {
    pub const DEFINITION: ProcedureDefinition = ProcedureDefinition {
        base_name: "upsertWithHistory",
        body: include_str!("js/upsert_with_history.js"),
    };

    pub fn new(
        wrapper: &ResourceWrapper,
        weak_etag: Option<&WeakETag>,
        allow_create: bool,
        keep_history: bool,
    ) -> Self {
        Self {
            document: ResourceDocument::current(wrapper.clone()),
            match_version_id: weak_etag.map(|etag| etag.version_id().to_string()),
            allow_create,
            keep_history,
        }
    }

    /// Partition the procedure runs in
    pub fn partition_key(&self) -> &str {
        &self.document.partition_key
    }

    /// Positional parameters: document, match version, allow create, keep history
    pub fn parameters(&self) -> Result<Vec<Value>> {
        Ok(vec![
            self.document.to_value()?,
            json!(self.match_version_id),
            json!(self.allow_create),
            json!(self.keep_history),
        ])
    }

    /// Decodes the procedure's response body
    pub fn parse_response(body: Value) -> Result<UpsertOutcome> {
        let response: ProcedureResponse = serde_json::from_value(body).map_err(|e| {
            DataStoreError::Serialization(format!("upsertWithHistory response: {e}"))
        })?;

        Ok(UpsertOutcome::new(
            response.wrapper.into_wrapper(),
            response.outcome_type,
        ))
    }
}
