// crates/docstore-core/src/interfaces/mod.rs
// ============================================================================
// Module: Docstore Interfaces
// Description: Backend-agnostic document store contract and call context.
// Purpose: Define the surface every storage backend implements.
// Dependencies: crate::core, thiserror
// ============================================================================

//! ## Overview
//! The access layer talks to storage only through [`DocumentStore`]. A store
//! holds JSON documents addressed by `(partition_key, id)` and evaluates
//! parsed [`StoreQuery`] values. Every call carries a [`CallContext`] with an
//! optional deadline; stores report an elapsed deadline as
//! [`StoreError::Timeout`] instead of blocking past it.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;
use std::time::Instant;

use thiserror::Error;

use crate::core::COLLECTION_FIELD;
use crate::core::Document;
use crate::core::ParsedQuery;
use crate::core::QueryParameters;

// ============================================================================
// SECTION: Call Context
// ============================================================================

/// Per-call deadline propagated to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CallContext {
    /// Instant after which the call must fail with a timeout.
    deadline: Option<Instant>,
}

impl CallContext {
    /// Creates a context without a deadline.
    #[must_use]
    pub const fn unbounded() -> Self {
        Self {
            deadline: None,
        }
    }

    /// Creates a context that expires `timeout` from now.
    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            deadline: Instant::now().checked_add(timeout),
        }
    }

    /// Creates a context with an explicit deadline.
    #[must_use]
    pub const fn with_deadline(deadline: Instant) -> Self {
        Self {
            deadline: Some(deadline),
        }
    }

    /// Returns the deadline, if any.
    #[must_use]
    pub const fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Returns the time left before the deadline; `None` when unbounded.
    #[must_use]
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline.map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// Returns true when the deadline has passed.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }

    /// Fails with [`StoreError::Timeout`] when the deadline has passed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Timeout`] when the context is expired.
    pub fn check(&self) -> Result<(), StoreError> {
        if self.is_expired() {
            return Err(StoreError::Timeout("call deadline elapsed".to_string()));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Store Query
// ============================================================================

/// Options forwarded with every query.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct QueryOptions {
    /// Allows the query to fan out across partitions.
    pub enable_cross_partition_query: bool,
    /// Restricts the query to one partition when set.
    pub partition_key: Option<String>,
}

/// Validated query handed to a store.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreQuery {
    /// Original template text.
    pub text: String,
    /// Parsed template.
    pub parsed: ParsedQuery,
    /// Bound values, including `@collection_name`.
    pub parameters: QueryParameters,
    /// Execution options.
    pub options: QueryOptions,
}

// ============================================================================
// SECTION: Document Store
// ============================================================================

/// Document store errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Addressed document does not exist.
    #[error("document not found: {0}")]
    NotFound(String),
    /// Conditional write found an existing document.
    #[error("document conflict: {0}")]
    Conflict(String),
    /// Call deadline elapsed before the store answered.
    #[error("document store timeout: {0}")]
    Timeout(String),
    /// Store is unreachable or closed.
    #[error("document store unavailable: {0}")]
    Unavailable(String),
    /// Request or stored data is invalid.
    #[error("document store invalid data: {0}")]
    Invalid(String),
    /// Store reported an error.
    #[error("document store error: {0}")]
    Store(String),
}

/// Partitioned JSON document store.
///
/// # Invariants
/// - Documents are addressed by `(partition_key, id)` where `id` is the
///   document's `id` field.
/// - `create` never overwrites; `upsert` always replaces the whole document.
/// - A stored document is only replaced or deleted through its own
///   `collection_name` tag; a write or delete carrying another tag for the
///   same address is rejected.
pub trait DocumentStore: Send + Sync {
    /// Runs a parsed query and returns matching documents.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query cannot be evaluated.
    fn query(&self, ctx: &CallContext, query: &StoreQuery) -> Result<Vec<Document>, StoreError>;

    /// Reads a single document.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when the document does not exist.
    fn read(&self, ctx: &CallContext, id: &str, partition_key: &str)
    -> Result<Document, StoreError>;

    /// Inserts a document that must not exist yet.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Conflict`] when the address is already taken.
    fn create(
        &self,
        ctx: &CallContext,
        partition_key: &str,
        document: &Document,
    ) -> Result<(), StoreError>;

    /// Inserts or fully replaces a document.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Conflict`] when the address holds a document with
    /// a different `collection_name` tag, otherwise [`StoreError`] when the
    /// write fails.
    fn upsert(
        &self,
        ctx: &CallContext,
        partition_key: &str,
        document: &Document,
    ) -> Result<(), StoreError>;

    /// Deletes a document tagged with `collection_name`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when the document does not exist or
    /// carries a different `collection_name` tag.
    fn delete(
        &self,
        ctx: &CallContext,
        id: &str,
        partition_key: &str,
        collection_name: &str,
    ) -> Result<(), StoreError>;

    /// Releases backend resources. Later calls fail with
    /// [`StoreError::Unavailable`].
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when shutdown fails.
    fn close(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Extracts the `id` field a store addresses a document by.
///
/// # Errors
///
/// Returns [`StoreError::Invalid`] when `id` is missing, not a string, or empty.
pub fn document_id(document: &Document) -> Result<&str, StoreError> {
    match document.get("id").and_then(serde_json::Value::as_str) {
        Some(id) if !id.is_empty() => Ok(id),
        _ => Err(StoreError::Invalid("document id must be a non-empty string".to_string())),
    }
}

/// Returns the `collection_name` tag of a document, if any.
#[must_use]
pub fn document_collection(document: &Document) -> Option<&str> {
    document.get(COLLECTION_FIELD).and_then(serde_json::Value::as_str)
}

/// Checks that a write tagged like `incoming` may replace `existing`.
///
/// # Errors
///
/// Returns [`StoreError::Conflict`] when the two tags differ.
pub fn ensure_same_collection(
    existing: &Document,
    incoming: &Document,
    address: &str,
) -> Result<(), StoreError> {
    let stored = document_collection(existing);
    let requested = document_collection(incoming);
    if stored == requested {
        return Ok(());
    }
    Err(StoreError::Conflict(format!(
        "{address} belongs to collection {}, not {}",
        stored.unwrap_or("(untagged)"),
        requested.unwrap_or("(untagged)")
    )))
}
