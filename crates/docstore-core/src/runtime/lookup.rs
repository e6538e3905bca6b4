// crates/docstore-core/src/runtime/lookup.rs
// ============================================================================
// Module: Docstore Lookup Facade
// Description: Business-identifier lookups and collection listings.
// Purpose: Answer common read shapes on top of the query executor.
// Dependencies: crate::{core, interfaces, runtime}
// ============================================================================

//! ## Overview
//! [`LookupFacade::find_by_id`] selects the top row whose business identifier
//! matches within one collection. At most one match is expected; when the
//! store returns more, the first row is returned and a
//! `duplicate_business_id` audit event is recorded. With the duplicate probe
//! enabled the lookup asks for two rows so duplicates are observable.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use crate::core::Collection;
use crate::core::QueryBuilder;
use crate::core::QueryParameters;
use crate::core::Record;
use crate::core::Schema;
use crate::core::SortDirection;
use crate::interfaces::CallContext;
use crate::runtime::audit::AccessAuditEvent;
use crate::runtime::audit::AccessAuditSink;
use crate::runtime::audit::AccessOutcome;
use crate::runtime::audit::EVENT_DUPLICATE_BUSINESS_ID;
use crate::runtime::audit::NoopAuditSink;
use crate::runtime::error::AccessError;
use crate::runtime::error::ErrorContext;
use crate::runtime::error::Operation;
use crate::runtime::executor::QueryExecutor;
use crate::runtime::executor::into_schema;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Placeholder bound to the business identifier.
pub const BUSINESS_ID_PARAM: &str = "@business_id";
/// Soft-delete marker field.
const DELETED_AT_FIELD: &str = "deleted_at";

// ============================================================================
// SECTION: Types
// ============================================================================

/// Row selection for [`LookupFacade::list`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ListFilter {
    /// Rows whose `deleted_at` is null.
    #[default]
    Active,
    /// Every row, soft-deleted included.
    All,
}

/// Read-side façade over the query executor.
#[derive(Clone)]
pub struct LookupFacade {
    /// Query executor.
    executor: QueryExecutor,
    /// Audit sink for lookup events.
    audit: Arc<dyn AccessAuditSink>,
    /// Request two rows so duplicates can be reported.
    duplicate_probe: bool,
}

impl LookupFacade {
    /// Creates a façade that reports to `audit`.
    #[must_use]
    pub fn new(executor: QueryExecutor, audit: Arc<dyn AccessAuditSink>) -> Self {
        Self {
            executor,
            audit,
            duplicate_probe: false,
        }
    }

    /// Creates a façade without audit output.
    #[must_use]
    pub fn with_executor(executor: QueryExecutor) -> Self {
        Self::new(executor, Arc::new(NoopAuditSink))
    }

    /// Enables or disables the duplicate probe.
    #[must_use]
    pub const fn with_duplicate_probe(mut self, enabled: bool) -> Self {
        self.duplicate_probe = enabled;
        self
    }

    /// Finds the record whose business identifier equals `business_id`.
    ///
    /// Returns `None` when no row matches; an empty result is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`AccessError`] when the query or decoding fails.
    pub fn find_by_id(
        &self,
        ctx: &CallContext,
        collection: Collection,
        business_id: &str,
    ) -> Result<Option<Record>, AccessError> {
        let result = self.lookup(ctx, collection, business_id);
        match &result {
            Ok(found) => self.audit.record(
                &AccessAuditEvent::new(collection, Operation::FindById, AccessOutcome::Ok)
                    .with_record(business_id)
                    .with_rows(usize::from(found.is_some())),
            ),
            Err(err) => self.audit.record(
                &AccessAuditEvent::failure(collection, Operation::FindById, err)
                    .with_record(business_id),
            ),
        }
        result
    }

    /// Typed form of [`LookupFacade::find_by_id`].
    ///
    /// # Errors
    ///
    /// Returns the same errors as [`LookupFacade::find_by_id`].
    pub fn find_by_id_as<T: Schema>(
        &self,
        ctx: &CallContext,
        business_id: &str,
    ) -> Result<Option<T>, AccessError> {
        self.find_by_id(ctx, T::COLLECTION, business_id)?
            .map(|record| into_schema::<T>(record, Operation::FindById))
            .transpose()
    }

    /// Lists a collection ordered by `id`.
    ///
    /// # Errors
    ///
    /// Returns [`AccessError`] when the query or decoding fails.
    pub fn list(
        &self,
        ctx: &CallContext,
        collection: Collection,
        filter: ListFilter,
    ) -> Result<Vec<Record>, AccessError> {
        let context = ErrorContext::new(collection, Operation::List);
        let builder = match filter {
            ListFilter::Active => QueryBuilder::for_collection().where_null(DELETED_AT_FIELD),
            ListFilter::All => QueryBuilder::for_collection(),
        };
        let result = builder
            .order_by("id", SortDirection::Asc)
            .build()
            .map_err(|source| AccessError::InvalidQuery {
                context,
                source,
            })
            .and_then(|template| {
                self.executor.run(
                    ctx,
                    collection,
                    Operation::List,
                    &template,
                    &QueryParameters::new(),
                )
            });
        match &result {
            Ok(records) => self.audit.record(
                &AccessAuditEvent::new(collection, Operation::List, AccessOutcome::Ok)
                    .with_rows(records.len()),
            ),
            Err(err) => self.audit.record(&AccessAuditEvent::failure(collection, Operation::List, err)),
        }
        result
    }

    /// Runs the business-identifier query and keeps the first row.
    fn lookup(
        &self,
        ctx: &CallContext,
        collection: Collection,
        business_id: &str,
    ) -> Result<Option<Record>, AccessError> {
        let context = ErrorContext::new(collection, Operation::FindById).with_record(business_id);
        let field = collection.schema().business_id_field;
        let template = QueryBuilder::for_collection()
            .top(if self.duplicate_probe { 2 } else { 1 })
            .where_eq(field, BUSINESS_ID_PARAM)
            .build()
            .map_err(|source| AccessError::InvalidQuery {
                context: context.clone(),
                source,
            })?;
        let parameters = QueryParameters::from_pairs([(BUSINESS_ID_PARAM, business_id)]).map_err(
            |source| AccessError::InvalidQuery {
                context,
                source,
            },
        )?;
        let records =
            self.executor.run(ctx, collection, Operation::FindById, &template, &parameters)?;
        if records.len() > 1 {
            self.audit.record(
                &AccessAuditEvent::new(collection, Operation::FindById, AccessOutcome::Warning)
                    .named(EVENT_DUPLICATE_BUSINESS_ID)
                    .with_record(business_id)
                    .with_rows(records.len())
                    .with_detail(format!("{field} matched more than one row")),
            );
        }
        Ok(records.into_iter().next())
    }
}
