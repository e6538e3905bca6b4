// crates/docstore-core/src/runtime/executor.rs
// ============================================================================
// Module: Docstore Query Executor
// Description: Parameterized, cross-partition query execution with decoding.
// Purpose: Validate templates, bind parameters, and decode rows fail-fast.
// Dependencies: crate::{core, interfaces, runtime}
// ============================================================================

//! ## Overview
//! [`QueryExecutor`] is the only component that issues queries. A template
//! must contain `c.collection_name = @collection_name`; the executor binds that
//! placeholder itself so a caller cannot read another collection's rows by
//! accident. Every other placeholder must be bound exactly once. Queries always
//! fan out across partitions, and the first row that fails to decode aborts
//! the whole call.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use crate::core::COLLECTION_PARAM;
use crate::core::Collection;
use crate::core::ParamValue;
use crate::core::ParsedQuery;
use crate::core::QueryError;
use crate::core::QueryParameters;
use crate::core::Record;
use crate::core::Schema;
use crate::interfaces::CallContext;
use crate::interfaces::DocumentStore;
use crate::interfaces::QueryOptions;
use crate::interfaces::StoreQuery;
use crate::runtime::audit::AccessAuditEvent;
use crate::runtime::audit::AccessAuditSink;
use crate::runtime::audit::AccessOutcome;
use crate::runtime::audit::NoopAuditSink;
use crate::runtime::error::AccessError;
use crate::runtime::error::ErrorContext;
use crate::runtime::error::Operation;
use crate::runtime::store::SharedDocumentStore;

// ============================================================================
// SECTION: Executor
// ============================================================================

/// Executes collection-scoped query templates.
#[derive(Clone)]
pub struct QueryExecutor {
    /// Backing store.
    store: SharedDocumentStore,
    /// Audit sink for query events.
    audit: Arc<dyn AccessAuditSink>,
}

impl QueryExecutor {
    /// Creates an executor that reports to `audit`.
    #[must_use]
    pub fn new(store: SharedDocumentStore, audit: Arc<dyn AccessAuditSink>) -> Self {
        Self {
            store,
            audit,
        }
    }

    /// Creates an executor without audit output.
    #[must_use]
    pub fn with_store(store: SharedDocumentStore) -> Self {
        Self::new(store, Arc::new(NoopAuditSink))
    }

    /// Runs `template` against `collection` and decodes every row.
    ///
    /// Row order is whatever the store returns unless the template has an
    /// `ORDER BY` clause.
    ///
    /// # Errors
    ///
    /// Returns [`AccessError::InvalidQuery`] when the template or parameters
    /// are rejected, [`AccessError::RecordDecode`] when any row fails to decode,
    /// and store-derived variants for backend failures.
    pub fn execute(
        &self,
        ctx: &CallContext,
        collection: Collection,
        template: &str,
        parameters: &QueryParameters,
    ) -> Result<Vec<Record>, AccessError> {
        let result = self.run(ctx, collection, Operation::Query, template, parameters);
        match &result {
            Ok(records) => self.audit.record(
                &AccessAuditEvent::new(collection, Operation::Query, AccessOutcome::Ok)
                    .with_rows(records.len()),
            ),
            Err(err) => {
                self.audit.record(&AccessAuditEvent::failure(collection, Operation::Query, err));
            }
        }
        result
    }

    /// Runs `template` against the collection named by an untrusted string.
    ///
    /// # Errors
    ///
    /// Returns [`AccessError::UnknownCollection`] when the name is not in the
    /// closed set, otherwise the same errors as [`QueryExecutor::execute`].
    pub fn execute_named(
        &self,
        ctx: &CallContext,
        collection_name: &str,
        template: &str,
        parameters: &QueryParameters,
    ) -> Result<Vec<Record>, AccessError> {
        let collection = crate::core::resolve(collection_name)?;
        self.execute(ctx, collection, template, parameters)
    }

    /// Runs `template` against `T`'s collection and returns typed records.
    ///
    /// # Errors
    ///
    /// Returns the same errors as [`QueryExecutor::execute`].
    pub fn execute_as<T: Schema>(
        &self,
        ctx: &CallContext,
        template: &str,
        parameters: &QueryParameters,
    ) -> Result<Vec<T>, AccessError> {
        let records = self.execute(ctx, T::COLLECTION, template, parameters)?;
        records.into_iter().map(|record| into_schema::<T>(record, Operation::Query)).collect()
    }

    /// Validates, binds, runs, and decodes without emitting audit events.
    pub(crate) fn run(
        &self,
        ctx: &CallContext,
        collection: Collection,
        operation: Operation,
        template: &str,
        parameters: &QueryParameters,
    ) -> Result<Vec<Record>, AccessError> {
        let context = ErrorContext::new(collection, operation);
        let query = prepare(collection, template, parameters).map_err(|source| {
            AccessError::InvalidQuery {
                context: context.clone(),
                source,
            }
        })?;
        let rows = self
            .store
            .query(ctx, &query)
            .map_err(|err| AccessError::from_store(err, context.clone()))?;
        rows.into_iter()
            .map(|row| {
                collection.decode(row).map_err(|err| AccessError::from_decode(&err, context.clone()))
            })
            .collect()
    }
}

// ============================================================================
// SECTION: Preparation
// ============================================================================

/// Parses the template and binds `@collection_name`.
///
/// # Errors
///
/// Returns [`QueryError`] when the template lacks the collection predicate,
/// the caller bound `@collection_name` to another collection, or the
/// placeholders and bound values differ.
pub fn prepare(
    collection: Collection,
    template: &str,
    parameters: &QueryParameters,
) -> Result<StoreQuery, QueryError> {
    let parsed = ParsedQuery::parse(template)?;
    if !parsed.restricts_collection() {
        return Err(QueryError::MissingCollectionPredicate);
    }
    let mut bound = QueryParameters::new();
    for (name, value) in parameters.iter() {
        if name == COLLECTION_PARAM {
            if value.as_text() != Some(collection.as_str()) {
                return Err(QueryError::ConflictingCollectionParameter {
                    expected: collection.as_str().to_string(),
                    found: describe(value),
                });
            }
            continue;
        }
        bound.insert(name, value.clone())?;
    }
    bound.insert(COLLECTION_PARAM, collection.as_str())?;
    parsed.check_bindings(&bound)?;
    Ok(StoreQuery {
        text: template.to_string(),
        parsed,
        parameters: bound,
        options: QueryOptions {
            enable_cross_partition_query: true,
            partition_key: None,
        },
    })
}

/// Renders a parameter value for error messages.
fn describe(value: &ParamValue) -> String {
    value.to_json().to_string()
}

/// Narrows a decoded record to a concrete schema.
pub(crate) fn into_schema<T: Schema>(record: Record, operation: Operation) -> Result<T, AccessError> {
    let id = record.id().to_string();
    record.into_schema::<T>().ok_or_else(|| AccessError::RecordDecode {
        context: ErrorContext::new(T::COLLECTION, operation).with_record(id),
        message: "decoded record does not match the requested schema".to_string(),
    })
}
