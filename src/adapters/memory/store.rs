//! In-memory document store
//!
//! Documents live in per-partition maps behind a single lock. Both
//! transactional procedures are emulated natively: each runs entirely under
//! the lock and validates before it mutates, so a raised error leaves the
//! partition untouched.

use crate::adapters::database::document::history_document_id;
use crate::adapters::database::query::{QueryDefinition, QueryOptions};
use crate::adapters::database::traits::{
    CollectionAddress, DocumentQuery, DocumentStore, FeedPage, ProcedureInstall, StoreResponse,
    StoreResult,
};
use crate::core::procedures::{HardDelete, UpsertWithHistory};
use crate::domain::errors::status;
use crate::domain::StoreFailure;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Request units charged for a point read
pub const READ_CHARGE: f64 = 1.0;
/// Request units charged for a query page
pub const QUERY_CHARGE: f64 = 2.5;
/// Request units charged for a procedure execution
pub const PROCEDURE_CHARGE: f64 = 10.0;

/// Kinds of store call a fault can be injected into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Read,
    Query,
    Procedure,
    Install,
}

#[derive(Debug, Default)]
struct MemoryState {
    /// partition key -> document id -> document
    partitions: HashMap<String, BTreeMap<String, Value>>,
    faults: HashMap<OperationKind, VecDeque<StoreFailure>>,
    procedures: HashSet<String>,
    etag_counter: u64,
}

impl MemoryState {
    fn take_fault(&mut self, kind: OperationKind) -> Option<StoreFailure> {
        self.faults.get_mut(&kind).and_then(VecDeque::pop_front)
    }

    fn next_etag(&mut self) -> String {
        self.etag_counter += 1;
        format!("\"{:08x}\"", self.etag_counter)
    }
}

/// Document store kept in process memory
///
/// Intended for tests and local runs. Clones share the same documents.
#[derive(Debug, Clone)]
pub struct InMemoryDocumentStore {
    collection: CollectionAddress,
    state: Arc<Mutex<MemoryState>>,
    open_cursors: Arc<AtomicUsize>,
}

impl InMemoryDocumentStore {
    pub fn new(database_id: impl Into<String>, collection_id: impl Into<String>) -> Self {
        Self {
            collection: CollectionAddress::new(database_id, collection_id),
            state: Arc::new(Mutex::new(MemoryState::default())),
            open_cursors: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Makes the next call of `kind` fail with `failure`
    ///
    /// Faults queue up: calling this twice fails the next two calls.
    pub fn fail_next(&self, kind: OperationKind, failure: StoreFailure) {
        self.state
            .lock()
            .faults
            .entry(kind)
            .or_default()
            .push_back(failure);
    }

    /// Number of query cursors created and not yet dropped
    pub fn open_cursors(&self) -> usize {
        self.open_cursors.load(Ordering::SeqCst)
    }

    /// Number of documents stored in a partition
    pub fn document_count(&self, partition_key: &str) -> usize {
        self.state
            .lock()
            .partitions
            .get(partition_key)
            .map_or(0, BTreeMap::len)
    }

    /// Ids of the documents stored in a partition, sorted
    pub fn document_ids(&self, partition_key: &str) -> Vec<String> {
        self.state
            .lock()
            .partitions
            .get(partition_key)
            .map(|docs| docs.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Names of installed procedures
    pub fn installed_procedures(&self) -> Vec<String> {
        let mut names: Vec<String> = self.state.lock().procedures.iter().cloned().collect();
        names.sort();
        names
    }

    fn upsert_with_history(
        state: &mut MemoryState,
        partition_key: &str,
        params: &[Value],
    ) -> StoreResult<Value> {
        let mut doc = params
            .first()
            .filter(|d| d.is_object())
            .cloned()
            .ok_or_else(|| StoreFailure::from_procedure(status::BAD_REQUEST, "document is required"))?;
        let match_version = params.get(1).and_then(Value::as_str).map(str::to_string);
        let allow_create = params.get(2).and_then(Value::as_bool).unwrap_or(false);
        let keep_history = params.get(3).and_then(Value::as_bool).unwrap_or(false);

        let id = doc
            .get("id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| StoreFailure::from_procedure(status::BAD_REQUEST, "document id is required"))?;
        let is_deleted = flag(&doc, "isDeleted");

        let current = state
            .partitions
            .get(partition_key)
            .and_then(|docs| docs.get(&id))
            .cloned();

        let (version, outcome_type) = match &current {
            None => {
                if match_version.is_some() {
                    return Err(not_found("Resource not found for the supplied version"));
                }
                if !allow_create {
                    return Err(not_found("Resource not found and creation is not allowed"));
                }
                if is_deleted {
                    return Err(not_found("Resource is already absent"));
                }
                ("1".to_string(), "Created")
            }
            Some(current) => {
                let current_version = current.get("version").and_then(Value::as_str).unwrap_or("0");
                let current_deleted = flag(current, "isDeleted");

                if let Some(expected) = &match_version {
                    if expected != current_version {
                        return Err(StoreFailure::from_procedure(
                            status::PRECONDITION_FAILED,
                            format!("Version mismatch: current version is {current_version}"),
                        ));
                    }
                }
                if current_deleted && is_deleted {
                    return Err(not_found("Resource is already deleted"));
                }
                if current_deleted && match_version.is_none() && !allow_create {
                    return Err(not_found("Resource is deleted and creation is not allowed"));
                }

                let next = current_version.parse::<u64>().unwrap_or(0) + 1;
                let outcome = if current_deleted { "Created" } else { "Updated" };
                (next.to_string(), outcome)
            }
        };

        if keep_history {
            if let Some(mut history) = current {
                let current_version = history
                    .get("version")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                let history_id = history_document_id(&id, &current_version);
                history["id"] = json!(history_id);
                history["isHistory"] = json!(true);
                history["_etag"] = json!(state.next_etag());
                state
                    .partitions
                    .entry(partition_key.to_string())
                    .or_default()
                    .insert(history_id, history);
            }
        }

        doc["version"] = json!(version);
        doc["isHistory"] = json!(false);
        doc["lastModified"] = json!(chrono::Utc::now());
        doc["_etag"] = json!(state.next_etag());

        state
            .partitions
            .entry(partition_key.to_string())
            .or_default()
            .insert(id, doc.clone());

        Ok(json!({ "outcomeType": outcome_type, "wrapper": doc }))
    }

    fn hard_delete(
        state: &mut MemoryState,
        partition_key: &str,
        params: &[Value],
    ) -> StoreResult<Value> {
        let resource_type = params.first().and_then(Value::as_str);
        let resource_id = params.get(1).and_then(Value::as_str);
        let (Some(resource_type), Some(resource_id)) = (resource_type, resource_id) else {
            return Err(StoreFailure::from_procedure(
                status::BAD_REQUEST,
                "resourceTypeName and resourceId are required",
            ));
        };

        let mut removed = Vec::new();
        if let Some(docs) = state.partitions.get_mut(partition_key) {
            docs.retain(|id, doc| {
                let matches = doc.get("resourceTypeName").and_then(Value::as_str) == Some(resource_type)
                    && doc.get("resourceId").and_then(Value::as_str) == Some(resource_id);
                if matches {
                    removed.push(id.clone());
                }
                !matches
            });
            if docs.is_empty() {
                state.partitions.remove(partition_key);
            }
        }

        Ok(json!(removed))
    }
}

fn flag(doc: &Value, field: &str) -> bool {
    doc.get(field).and_then(Value::as_bool).unwrap_or(false)
}

fn not_found(message: &str) -> StoreFailure {
    StoreFailure::from_procedure(status::NOT_FOUND, message)
}

fn charged(failure: StoreFailure) -> StoreFailure {
    if failure.request_charge > 0.0 {
        failure
    } else {
        failure.with_request_charge(READ_CHARGE)
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    fn collection(&self) -> &CollectionAddress {
        &self.collection
    }

    async fn read_document(&self, id: &str, partition_key: &str) -> StoreResult<StoreResponse<Value>> {
        let mut state = self.state.lock();
        if let Some(failure) = state.take_fault(OperationKind::Read) {
            return Err(failure);
        }

        state
            .partitions
            .get(partition_key)
            .and_then(|docs| docs.get(id))
            .cloned()
            .map(|body| StoreResponse {
                body,
                status: 200,
                request_charge: READ_CHARGE,
            })
            .ok_or_else(|| {
                StoreFailure::new(status::NOT_FOUND, format!("Document '{id}' not found"))
                    .with_request_charge(READ_CHARGE)
            })
    }

    fn create_document_query(
        &self,
        query: &QueryDefinition,
        options: &QueryOptions,
    ) -> Box<dyn DocumentQuery> {
        self.open_cursors.fetch_add(1, Ordering::SeqCst);
        Box::new(MemoryQuery {
            state: self.state.clone(),
            open_cursors: self.open_cursors.clone(),
            query: query.clone(),
            options: options.clone(),
            exhausted: false,
        })
    }

    async fn execute_procedure(
        &self,
        name: &str,
        partition_key: &str,
        params: Vec<Value>,
    ) -> StoreResult<StoreResponse<Value>> {
        let mut state = self.state.lock();
        if let Some(failure) = state.take_fault(OperationKind::Procedure) {
            return Err(charged(failure));
        }

        let outcome = if UpsertWithHistory::DEFINITION.matches(name) {
            Self::upsert_with_history(&mut state, partition_key, &params)
        } else if HardDelete::DEFINITION.matches(name) {
            Self::hard_delete(&mut state, partition_key, &params)
        } else {
            Err(StoreFailure::new(
                status::NOT_FOUND,
                format!("Stored procedure '{name}' not found"),
            ))
        };

        outcome
            .map(|body| StoreResponse {
                body,
                status: 200,
                request_charge: PROCEDURE_CHARGE,
            })
            .map_err(charged)
    }

    async fn install_procedure(&self, name: &str, _body: &str) -> StoreResult<ProcedureInstall> {
        let mut state = self.state.lock();
        if let Some(failure) = state.take_fault(OperationKind::Install) {
            return Err(failure);
        }

        if state.procedures.insert(name.to_string()) {
            Ok(ProcedureInstall::Created)
        } else {
            Ok(ProcedureInstall::AlreadyInstalled)
        }
    }
}

/// Cursor over an in-memory query
///
/// Continuation tokens are offsets into the sorted result set.
struct MemoryQuery {
    state: Arc<Mutex<MemoryState>>,
    open_cursors: Arc<AtomicUsize>,
    query: QueryDefinition,
    options: QueryOptions,
    exhausted: bool,
}

impl Drop for MemoryQuery {
    fn drop(&mut self) {
        self.open_cursors.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl DocumentQuery for MemoryQuery {
    fn has_more_results(&self) -> bool {
        !self.exhausted
    }

    async fn next_page(&mut self) -> StoreResult<FeedPage> {
        let mut state = self.state.lock();
        if let Some(failure) = state.take_fault(OperationKind::Query) {
            return Err(failure);
        }

        let offset = match &self.options.continuation {
            Some(token) => token.parse::<usize>().map_err(|_| {
                StoreFailure::new(status::BAD_REQUEST, format!("Invalid continuation token '{token}'"))
            })?,
            None => 0,
        };

        let mut matches: Vec<(&String, &Value)> = match &self.options.partition_key {
            Some(pk) => state
                .partitions
                .get(pk)
                .map(|docs| docs.iter().collect())
                .unwrap_or_default(),
            None => state.partitions.values().flat_map(|docs| docs.iter()).collect(),
        };
        matches.retain(|(_, doc)| self.query.matches(doc));
        matches.sort_by(|a, b| a.0.cmp(b.0));

        let page_size = self
            .options
            .max_item_count
            .map_or(usize::MAX, |n| n.max(1) as usize);
        let end = offset.saturating_add(page_size).min(matches.len());
        let documents: Vec<Value> = matches
            .get(offset..end)
            .unwrap_or_default()
            .iter()
            .map(|(_, doc)| (*doc).clone())
            .collect();
        let continuation = (end < matches.len()).then(|| end.to_string());

        self.exhausted = continuation.is_none();
        if let Some(token) = &continuation {
            self.options.continuation = Some(token.clone());
        }

        Ok(FeedPage {
            documents,
            continuation,
            status: 200,
            request_charge: QUERY_CHARGE,
        })
    }
}
