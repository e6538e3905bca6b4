// crates/docstore-core/src/runtime/store.rs
// ============================================================================
// Module: Docstore In-Memory Store
// Description: In-memory partitioned document store and shared store handle.
// Purpose: Provide a deterministic backend for tests and local tooling.
// Dependencies: crate::{core, interfaces}, serde_json
// ============================================================================

//! ## Overview
//! [`InMemoryDocumentStore`] keeps documents keyed by `(partition_key, id)`
//! and evaluates parsed queries directly against the JSON bodies. It stamps
//! `_ts` and `_etag` metadata on every write the way a hosted store would, and
//! counts calls so tests can probe that an operation performed no writes.
//! [`SharedDocumentStore`] is the cloneable handle passed to access components.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering as AtomicOrdering;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde_json::Value;

use crate::core::CompareOp;
use crate::core::Condition;
use crate::core::Document;
use crate::core::ParsedQuery;
use crate::core::QueryParameters;
use crate::core::SortDirection;
use crate::interfaces::CallContext;
use crate::interfaces::DocumentStore;
use crate::interfaces::StoreError;
use crate::interfaces::StoreQuery;
use crate::interfaces::document_collection;
use crate::interfaces::document_id;
use crate::interfaces::ensure_same_collection;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Store-managed modification timestamp field (unix seconds).
pub const TS_FIELD: &str = "_ts";
/// Store-managed version tag field.
pub const ETAG_FIELD: &str = "_etag";

// ============================================================================
// SECTION: In-Memory Store
// ============================================================================

/// Call counters exposed for tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    /// Query calls.
    pub queries: u64,
    /// Point-read calls.
    pub reads: u64,
    /// Create, upsert, and delete calls, successful or not.
    pub writes: u64,
}

/// Mutable store state behind the mutex.
#[derive(Debug, Default)]
struct MemoryState {
    /// Documents keyed by `(partition_key, id)`.
    documents: BTreeMap<(String, String), Document>,
    /// Call counters.
    stats: StoreStats,
    /// Monotonic version counter for `_etag`.
    version: u64,
}

/// In-memory document store for tests and examples.
#[derive(Debug, Default, Clone)]
pub struct InMemoryDocumentStore {
    /// Store state protected by a mutex.
    state: Arc<Mutex<MemoryState>>,
    /// Set once [`DocumentStore::close`] runs.
    closed: Arc<AtomicBool>,
}

impl InMemoryDocumentStore {
    /// Creates an empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the call counters.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Store`] when the state mutex is poisoned.
    pub fn stats(&self) -> Result<StoreStats, StoreError> {
        Ok(self.lock()?.stats)
    }

    /// Returns the number of stored documents.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Store`] when the state mutex is poisoned.
    pub fn len(&self) -> Result<usize, StoreError> {
        Ok(self.lock()?.documents.len())
    }

    /// Returns true when no documents are stored.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Store`] when the state mutex is poisoned.
    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }

    /// Locks the state.
    fn lock(&self) -> Result<std::sync::MutexGuard<'_, MemoryState>, StoreError> {
        self.state
            .lock()
            .map_err(|_| StoreError::Store("document store mutex poisoned".to_string()))
    }

    /// Locks the state after checking the store is open and the call is in time.
    fn begin(&self, ctx: &CallContext) -> Result<std::sync::MutexGuard<'_, MemoryState>, StoreError> {
        if self.closed.load(AtomicOrdering::SeqCst) {
            return Err(StoreError::Unavailable("document store is closed".to_string()));
        }
        ctx.check()?;
        self.lock()
    }
}

impl DocumentStore for InMemoryDocumentStore {
    fn query(&self, ctx: &CallContext, query: &StoreQuery) -> Result<Vec<Document>, StoreError> {
        let mut guard = self.begin(ctx)?;
        guard.stats.queries += 1;
        if !query.options.enable_cross_partition_query && query.options.partition_key.is_none() {
            return Err(StoreError::Invalid(
                "cross-partition query disabled without a partition key".to_string(),
            ));
        }
        let mut rows = Vec::new();
        for ((partition_key, _), document) in &guard.documents {
            if let Some(scope) = &query.options.partition_key
                && scope != partition_key
            {
                continue;
            }
            if matches_document(&query.parsed, &query.parameters, document)? {
                rows.push(document.clone());
            }
        }
        drop(guard);
        if let Some(order_by) = &query.parsed.order_by {
            rows.sort_by(|left, right| {
                let ordering = compare_for_sort(
                    order_by.path.lookup(left),
                    order_by.path.lookup(right),
                );
                match order_by.direction {
                    SortDirection::Asc => ordering,
                    SortDirection::Desc => ordering.reverse(),
                }
            });
        }
        if let Some(top) = query.parsed.top {
            rows.truncate(usize::try_from(top).unwrap_or(usize::MAX));
        }
        Ok(rows)
    }

    fn read(
        &self,
        ctx: &CallContext,
        id: &str,
        partition_key: &str,
    ) -> Result<Document, StoreError> {
        let mut guard = self.begin(ctx)?;
        guard.stats.reads += 1;
        guard
            .documents
            .get(&(partition_key.to_string(), id.to_string()))
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("{partition_key}/{id}")))
    }

    fn create(
        &self,
        ctx: &CallContext,
        partition_key: &str,
        document: &Document,
    ) -> Result<(), StoreError> {
        let mut guard = self.begin(ctx)?;
        guard.stats.writes += 1;
        let key = (partition_key.to_string(), document_id(document)?.to_string());
        if guard.documents.contains_key(&key) {
            return Err(StoreError::Conflict(format!("{}/{}", key.0, key.1)));
        }
        let stamped = stamp(&mut guard, document);
        guard.documents.insert(key, stamped);
        drop(guard);
        Ok(())
    }

    fn upsert(
        &self,
        ctx: &CallContext,
        partition_key: &str,
        document: &Document,
    ) -> Result<(), StoreError> {
        let mut guard = self.begin(ctx)?;
        guard.stats.writes += 1;
        let key = (partition_key.to_string(), document_id(document)?.to_string());
        if let Some(existing) = guard.documents.get(&key) {
            ensure_same_collection(existing, document, &format!("{}/{}", key.0, key.1))?;
        }
        let stamped = stamp(&mut guard, document);
        guard.documents.insert(key, stamped);
        drop(guard);
        Ok(())
    }

    fn delete(
        &self,
        ctx: &CallContext,
        id: &str,
        partition_key: &str,
        collection_name: &str,
    ) -> Result<(), StoreError> {
        let mut guard = self.begin(ctx)?;
        guard.stats.writes += 1;
        let key = (partition_key.to_string(), id.to_string());
        let tagged = guard
            .documents
            .get(&key)
            .is_some_and(|document| document_collection(document) == Some(collection_name));
        if !tagged {
            return Err(StoreError::NotFound(format!("{partition_key}/{id}")));
        }
        guard.documents.remove(&key);
        drop(guard);
        Ok(())
    }

    fn close(&self) -> Result<(), StoreError> {
        self.closed.store(true, AtomicOrdering::SeqCst);
        Ok(())
    }
}

/// Copies a document and stamps store metadata.
fn stamp(state: &mut MemoryState, document: &Document) -> Document {
    state.version += 1;
    let mut stamped = document.clone();
    let seconds = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs();
    stamped.insert(TS_FIELD.to_string(), Value::from(seconds));
    stamped.insert(ETAG_FIELD.to_string(), Value::String(format!("\"{:016x}\"", state.version)));
    stamped
}

// ============================================================================
// SECTION: Query Evaluation
// ============================================================================

/// Returns true when every condition holds for `document`.
fn matches_document(
    query: &ParsedQuery,
    parameters: &QueryParameters,
    document: &Document,
) -> Result<bool, StoreError> {
    for condition in &query.conditions {
        let holds = match condition {
            Condition::IsNull {
                path,
                negated,
            } => {
                let is_null = matches!(path.lookup(document), Some(Value::Null));
                is_null != *negated
            }
            Condition::Compare {
                path,
                op,
                param,
            } => {
                let expected = parameters
                    .get(param)
                    .ok_or_else(|| StoreError::Invalid(format!("unbound parameter {param}")))?
                    .to_json();
                path.lookup(document).is_some_and(|actual| compare(actual, *op, &expected))
            }
        };
        if !holds {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Applies a comparison between a stored value and a bound value.
///
/// Values of different JSON types never compare equal; `!=` only holds for
/// present values of the same type. Ordering operators never hold for null.
fn compare(actual: &Value, op: CompareOp, expected: &Value) -> bool {
    let Some(ordering) = compare_same_type(actual, expected) else {
        return false;
    };
    match op {
        CompareOp::Eq => ordering == Ordering::Equal,
        CompareOp::Ne => ordering != Ordering::Equal,
        _ if expected.is_null() => false,
        CompareOp::Lt => ordering == Ordering::Less,
        CompareOp::Le => ordering != Ordering::Greater,
        CompareOp::Gt => ordering == Ordering::Greater,
        CompareOp::Ge => ordering != Ordering::Less,
    }
}

/// Orders two scalar values of the same JSON type.
fn compare_same_type(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        (Value::Bool(left), Value::Bool(right)) => Some(left.cmp(right)),
        (Value::Number(left), Value::Number(right)) => left.as_f64()?.partial_cmp(&right.as_f64()?),
        (Value::String(left), Value::String(right)) => Some(left.cmp(right)),
        _ => None,
    }
}

/// Orders optional values for `ORDER BY`: missing, null, bool, number, string.
fn compare_for_sort(left: Option<&Value>, right: Option<&Value>) -> Ordering {
    let rank = |value: Option<&Value>| match value {
        None => 0,
        Some(Value::Null) => 1,
        Some(Value::Bool(_)) => 2,
        Some(Value::Number(_)) => 3,
        Some(Value::String(_)) => 4,
        Some(_) => 5,
    };
    match (left, right) {
        (Some(left_value), Some(right_value)) => compare_same_type(left_value, right_value)
            .unwrap_or_else(|| rank(left).cmp(&rank(right))),
        _ => rank(left).cmp(&rank(right)),
    }
}

// ============================================================================
// SECTION: Shared Store Wrapper
// ============================================================================

/// Shared document store backed by an `Arc` trait object.
#[derive(Clone)]
pub struct SharedDocumentStore {
    /// Inner store implementation.
    inner: Arc<dyn DocumentStore>,
}

impl SharedDocumentStore {
    /// Wraps a document store in a shared, clonable wrapper.
    #[must_use]
    pub fn from_store(store: impl DocumentStore + 'static) -> Self {
        Self {
            inner: Arc::new(store),
        }
    }

    /// Wraps an existing shared store.
    #[must_use]
    pub const fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            inner: store,
        }
    }
}

impl DocumentStore for SharedDocumentStore {
    fn query(&self, ctx: &CallContext, query: &StoreQuery) -> Result<Vec<Document>, StoreError> {
        self.inner.query(ctx, query)
    }

    fn read(
        &self,
        ctx: &CallContext,
        id: &str,
        partition_key: &str,
    ) -> Result<Document, StoreError> {
        self.inner.read(ctx, id, partition_key)
    }

    fn create(
        &self,
        ctx: &CallContext,
        partition_key: &str,
        document: &Document,
    ) -> Result<(), StoreError> {
        self.inner.create(ctx, partition_key, document)
    }

    fn upsert(
        &self,
        ctx: &CallContext,
        partition_key: &str,
        document: &Document,
    ) -> Result<(), StoreError> {
        self.inner.upsert(ctx, partition_key, document)
    }

    fn delete(
        &self,
        ctx: &CallContext,
        id: &str,
        partition_key: &str,
        collection_name: &str,
    ) -> Result<(), StoreError> {
        self.inner.delete(ctx, id, partition_key, collection_name)
    }

    fn close(&self) -> Result<(), StoreError> {
        self.inner.close()
    }
}
