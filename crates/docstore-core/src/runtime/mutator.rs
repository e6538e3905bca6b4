// crates/docstore-core/src/runtime/mutator.rs
// ============================================================================
// Module: Docstore Record Mutator
// Description: Full-replace writes and partition-addressed deletes.
// Purpose: Be the only path through which records change in the store.
// Dependencies: crate::{core, interfaces, runtime}
// ============================================================================

//! ## Overview
//! [`RecordMutator`] writes whole records. Before any write it applies the
//! schema's normalization (user emails are lowercased) and checks that the
//! stored partition key equals the one the schema derives. Deletes are
//! addressed by `(id, partition_key)` supplied by the caller, and the delete
//! mode is an explicit argument: [`DeleteMode::Hard`] removes the row,
//! [`DeleteMode::Soft`] stamps `deleted_at` and keeps it.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::core::COLLECTION_FIELD;
use crate::core::Clock;
use crate::core::Collection;
use crate::core::Document;
use crate::core::Record;
use crate::core::Schema;
use crate::core::SystemClock;
use crate::interfaces::CallContext;
use crate::interfaces::DocumentStore;
use crate::interfaces::StoreError;
use crate::interfaces::document_collection;
use crate::runtime::audit::AccessAuditEvent;
use crate::runtime::audit::AccessAuditSink;
use crate::runtime::audit::AccessOutcome;
use crate::runtime::audit::NoopAuditSink;
use crate::runtime::error::AccessError;
use crate::runtime::error::ErrorContext;
use crate::runtime::error::Operation;
use crate::runtime::executor::into_schema;
use crate::runtime::store::SharedDocumentStore;

// ============================================================================
// SECTION: Types
// ============================================================================

/// How a delete treats the stored row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteMode {
    /// Remove the row.
    #[default]
    Hard,
    /// Set `deleted_at` and keep the row.
    Soft,
}

/// Writes and deletes records.
#[derive(Clone)]
pub struct RecordMutator {
    /// Backing store.
    store: SharedDocumentStore,
    /// Audit sink for write events.
    audit: Arc<dyn AccessAuditSink>,
    /// Time source for soft-delete stamps.
    clock: Arc<dyn Clock>,
}

impl RecordMutator {
    /// Creates a mutator.
    #[must_use]
    pub fn new(
        store: SharedDocumentStore,
        audit: Arc<dyn AccessAuditSink>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            audit,
            clock,
        }
    }

    /// Creates a mutator with the system clock and no audit output.
    #[must_use]
    pub fn with_store(store: SharedDocumentStore) -> Self {
        Self::new(store, Arc::new(NoopAuditSink), Arc::new(SystemClock))
    }

    /// Inserts `record` or fully replaces the stored record with the same id.
    ///
    /// Returns the record as written, after normalization.
    ///
    /// # Errors
    ///
    /// Returns [`AccessError::InvalidRecord`] when the record fails validation,
    /// otherwise store-derived variants.
    pub fn upsert(&self, ctx: &CallContext, record: &Record) -> Result<Record, AccessError> {
        self.write(ctx, record, Operation::Upsert)
    }

    /// Inserts `record`; fails if a record with the same id already exists.
    ///
    /// # Errors
    ///
    /// Returns [`AccessError::Conflict`] when the id is taken in the partition,
    /// [`AccessError::InvalidRecord`] when the record fails validation,
    /// otherwise store-derived variants.
    pub fn create(&self, ctx: &CallContext, record: &Record) -> Result<Record, AccessError> {
        self.write(ctx, record, Operation::Create)
    }

    /// Typed form of [`RecordMutator::upsert`].
    ///
    /// # Errors
    ///
    /// Returns the same errors as [`RecordMutator::upsert`].
    pub fn upsert_as<T: Schema>(&self, ctx: &CallContext, record: T) -> Result<T, AccessError> {
        let written = self.upsert(ctx, &record.into_record())?;
        into_schema::<T>(written, Operation::Upsert)
    }

    /// Deletes the record addressed by `(id, partition_key)`.
    ///
    /// A soft delete of a record that is already soft-deleted keeps the
    /// original `deleted_at` and performs no write.
    ///
    /// # Errors
    ///
    /// Returns [`AccessError::NotFound`] when no such record exists,
    /// [`AccessError::RecordDecode`] when a soft delete reads a malformed row,
    /// otherwise store-derived variants.
    pub fn delete(
        &self,
        ctx: &CallContext,
        collection: Collection,
        id: &str,
        partition_key: &str,
        mode: DeleteMode,
    ) -> Result<(), AccessError> {
        let context = ErrorContext::new(collection, Operation::Delete).with_record(id);
        let result = match mode {
            DeleteMode::Hard => self
                .store
                .delete(ctx, id, partition_key, collection.as_str())
                .map_err(|err| AccessError::from_store(err, context)),
            DeleteMode::Soft => self.soft_delete(ctx, collection, id, partition_key, context),
        };
        self.report(collection, Operation::Delete, id, &result);
        result
    }

    /// Validates raw rows against `collection` and upserts each of them.
    ///
    /// Rows without a `collection_name` tag are tagged before validation.
    /// Nothing is written unless every row validates.
    ///
    /// # Errors
    ///
    /// Returns [`AccessError::InvalidRecord`] for the first row that fails
    /// validation, otherwise the first write error.
    pub fn upsert_raw(
        &self,
        ctx: &CallContext,
        collection: Collection,
        rows: Vec<Document>,
    ) -> Result<usize, AccessError> {
        let records = validate_rows(collection, rows, Operation::Upsert)?;
        for record in &records {
            self.upsert(ctx, record)?;
        }
        Ok(records.len())
    }

    /// Validates raw rows against `collection` and hard-deletes each of them.
    ///
    /// # Errors
    ///
    /// Returns [`AccessError::InvalidRecord`] for the first row that fails
    /// validation, otherwise the first delete error (including
    /// [`AccessError::NotFound`]).
    pub fn delete_raw(
        &self,
        ctx: &CallContext,
        collection: Collection,
        rows: Vec<Document>,
    ) -> Result<usize, AccessError> {
        let records = validate_rows(collection, rows, Operation::Delete)?;
        for record in &records {
            self.delete(ctx, collection, record.id(), record.partition_key(), DeleteMode::Hard)?;
        }
        Ok(records.len())
    }

    /// Normalizes, validates, and writes a record.
    fn write(
        &self,
        ctx: &CallContext,
        record: &Record,
        operation: Operation,
    ) -> Result<Record, AccessError> {
        let collection = record.collection();
        let result = prepare_record(record, operation).and_then(|(prepared, document)| {
            let context = ErrorContext::new(collection, operation).with_record(prepared.id());
            let partition_key = prepared.partition_key();
            let written = match operation {
                Operation::Create => self.store.create(ctx, partition_key, &document),
                _ => self.store.upsert(ctx, partition_key, &document),
            };
            written.map_err(|err| AccessError::from_store(err, context))?;
            Ok(prepared)
        });
        self.report(collection, operation, record.id(), &result);
        result
    }

    /// Reads the row, stamps `deleted_at`, and writes it back.
    fn soft_delete(
        &self,
        ctx: &CallContext,
        collection: Collection,
        id: &str,
        partition_key: &str,
        context: ErrorContext,
    ) -> Result<(), AccessError> {
        let document = self
            .store
            .read(ctx, id, partition_key)
            .map_err(|err| AccessError::from_store(err, context.clone()))?;
        if document_collection(&document) != Some(collection.as_str()) {
            let missing = StoreError::NotFound(format!("{partition_key}/{id}"));
            return Err(AccessError::from_store(missing, context));
        }
        let mut record =
            collection.decode(document).map_err(|err| AccessError::from_decode(&err, context.clone()))?;
        if record.meta().is_deleted() {
            return Ok(());
        }
        let now = self.clock.now();
        let meta = record.meta_mut();
        meta.deleted_at = Some(now);
        meta.updated_at = now;
        let document = record.to_document().map_err(|err| AccessError::InvalidRecord {
            context: context.clone(),
            message: err.to_string(),
        })?;
        self.store
            .upsert(ctx, partition_key, &document)
            .map_err(|err| AccessError::from_store(err, context))
    }

    /// Emits the audit event for a write.
    fn report<T>(
        &self,
        collection: Collection,
        operation: Operation,
        id: &str,
        result: &Result<T, AccessError>,
    ) {
        let event = match result {
            Ok(_) => AccessAuditEvent::new(collection, operation, AccessOutcome::Ok).with_record(id),
            Err(err) => AccessAuditEvent::failure(collection, operation, err).with_record(id),
        };
        self.audit.record(&event);
    }
}

// ============================================================================
// SECTION: Validation
// ============================================================================

/// Normalizes a copy of `record`, checks identity, and encodes it.
fn prepare_record(record: &Record, operation: Operation) -> Result<(Record, Document), AccessError> {
    let mut prepared = record.clone();
    prepared.normalize();
    let context = ErrorContext::new(prepared.collection(), operation).with_record(prepared.id());
    if prepared.id().is_empty() {
        return Err(AccessError::InvalidRecord {
            context,
            message: "record id must not be empty".to_string(),
        });
    }
    let derived = prepared.derive_partition_key();
    if derived.is_empty() || prepared.partition_key() != derived {
        return Err(AccessError::InvalidRecord {
            context,
            message: format!(
                "partition key {} does not match derived key {derived}",
                prepared.partition_key()
            ),
        });
    }
    let document = prepared.to_document().map_err(|err| AccessError::InvalidRecord {
        context,
        message: err.to_string(),
    })?;
    Ok((prepared, document))
}

/// Decodes raw rows through the registry, tagging untagged rows.
fn validate_rows(
    collection: Collection,
    rows: Vec<Document>,
    operation: Operation,
) -> Result<Vec<Record>, AccessError> {
    rows.into_iter()
        .enumerate()
        .map(|(index, mut row)| {
            row.entry(COLLECTION_FIELD.to_string())
                .or_insert_with(|| Value::String(collection.as_str().to_string()));
            let id = row.get("id").and_then(Value::as_str).map(str::to_string);
            collection.decode(row).map_err(|err| {
                let mut context = ErrorContext::new(collection, operation);
                context.record_id = id;
                AccessError::InvalidRecord {
                    context,
                    message: format!("row {index}: {err}"),
                }
            })
        })
        .collect()
}
