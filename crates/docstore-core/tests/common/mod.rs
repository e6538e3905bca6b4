// crates/docstore-core/tests/common/mod.rs
// ============================================================================
// Module: Common Test Fixtures
// Description: Shared stores, clocks, and component wiring for core tests.
// Purpose: Provide reusable test infrastructure for deterministic testing.
// Dependencies: docstore-core
// ============================================================================

//! ## Overview
//! Fixtures wire the access components to an in-memory store, a pinned clock,
//! and an in-memory audit sink. Store wrappers inject a concurrent writer or
//! a fixed failure so race and transport paths can be exercised.

#![allow(dead_code, reason = "Shared test helpers may be unused in some cases.")]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::Mutex;

use docstore_core::AccessAuditSink;
use docstore_core::BootstrapReconciler;
use docstore_core::CallContext;
use docstore_core::Clock;
use docstore_core::ConflictPolicy;
use docstore_core::Document;
use docstore_core::DocumentStore;
use docstore_core::FixedClock;
use docstore_core::InMemoryDocumentStore;
use docstore_core::LookupFacade;
use docstore_core::MemoryAuditSink;
use docstore_core::QueryExecutor;
use docstore_core::ReconcilerConfig;
use docstore_core::RecordMutator;
use docstore_core::SharedDocumentStore;
use docstore_core::StoreError;
use docstore_core::StoreQuery;
use time::OffsetDateTime;

// ============================================================================
// SECTION: Clock
// ============================================================================

/// Fixed instant used by fixtures (2024-01-01T00:00:00Z).
pub const FIXED_UNIX_SECONDS: i64 = 1_704_067_200;

/// Returns the fixture instant.
pub fn fixed_now() -> OffsetDateTime {
    OffsetDateTime::from_unix_timestamp(FIXED_UNIX_SECONDS).expect("valid timestamp")
}

/// Returns a context without a deadline.
pub const fn ctx() -> CallContext {
    CallContext::unbounded()
}

// ============================================================================
// SECTION: Fixture
// ============================================================================

/// Access components wired to one store.
pub struct Fixture {
    /// Store handle shared by every component.
    pub store: SharedDocumentStore,
    /// Audit events emitted by every component.
    pub audit: Arc<MemoryAuditSink>,
    /// Pinned clock.
    pub clock: Arc<FixedClock>,
    /// Query executor.
    pub executor: QueryExecutor,
    /// Record mutator.
    pub mutator: RecordMutator,
    /// Lookup façade.
    pub lookup: LookupFacade,
}

impl Fixture {
    /// Wires components to `store`.
    pub fn with_store(store: SharedDocumentStore) -> Self {
        let audit = Arc::new(MemoryAuditSink::new());
        let clock = Arc::new(FixedClock::new(fixed_now()));
        let audit_sink: Arc<dyn AccessAuditSink> = audit.clone();
        let clock_handle: Arc<dyn Clock> = clock.clone();
        let executor = QueryExecutor::new(store.clone(), Arc::clone(&audit_sink));
        let mutator = RecordMutator::new(store.clone(), Arc::clone(&audit_sink), clock_handle);
        let lookup = LookupFacade::new(executor.clone(), audit_sink);
        Self {
            store,
            audit,
            clock,
            executor,
            mutator,
            lookup,
        }
    }

    /// Builds a reconciler with the given conflict policy.
    pub fn reconciler(&self, conflict_policy: ConflictPolicy) -> BootstrapReconciler {
        let config = ReconcilerConfig {
            conflict_policy,
            ..ReconcilerConfig::default()
        };
        let audit: Arc<dyn AccessAuditSink> = self.audit.clone();
        BootstrapReconciler::new(
            self.lookup.clone(),
            self.mutator.clone(),
            self.clock.clone(),
            audit,
            config,
        )
    }
}

/// Returns components wired to a fresh in-memory store and the store itself.
pub fn memory_fixture() -> (InMemoryDocumentStore, Fixture) {
    let store = InMemoryDocumentStore::new();
    let fixture = Fixture::with_store(SharedDocumentStore::from_store(store.clone()));
    (store, fixture)
}

/// Returns the number of write calls the store has seen.
pub fn write_count(store: &InMemoryDocumentStore) -> u64 {
    store.stats().expect("stats").writes
}

// ============================================================================
// SECTION: Store Wrappers
// ============================================================================

/// Store that lets a concurrent writer land a document right before the
/// next conditional create.
#[derive(Clone)]
pub struct RacingStore {
    /// Backing store.
    pub inner: InMemoryDocumentStore,
    /// Document the concurrent writer inserts, as `(partition_key, document)`.
    pending: Arc<Mutex<Option<(String, Document)>>>,
}

impl RacingStore {
    /// Wraps an in-memory store.
    pub fn new(inner: InMemoryDocumentStore) -> Self {
        Self {
            inner,
            pending: Arc::new(Mutex::new(None)),
        }
    }

    /// Schedules a concurrent insert ahead of the next create.
    pub fn race_with(&self, partition_key: &str, document: Document) {
        *self.pending.lock().expect("pending lock") = Some((partition_key.to_string(), document));
    }
}

impl DocumentStore for RacingStore {
    fn query(&self, ctx: &CallContext, query: &StoreQuery) -> Result<Vec<Document>, StoreError> {
        self.inner.query(ctx, query)
    }

    fn read(&self, ctx: &CallContext, id: &str, partition_key: &str) -> Result<Document, StoreError> {
        self.inner.read(ctx, id, partition_key)
    }

    fn create(
        &self,
        ctx: &CallContext,
        partition_key: &str,
        document: &Document,
    ) -> Result<(), StoreError> {
        let pending = self.pending.lock().expect("pending lock").take();
        if let Some((winner_key, winner)) = pending {
            self.inner.upsert(ctx, &winner_key, &winner)?;
        }
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
}

/// Store whose every call fails with the same error.
#[derive(Clone)]
pub struct FailingStore {
    /// Error returned by every call.
    pub error: StoreError,
}

impl DocumentStore for FailingStore {
    fn query(&self, _ctx: &CallContext, _query: &StoreQuery) -> Result<Vec<Document>, StoreError> {
        Err(self.error.clone())
    }

    fn read(&self, _ctx: &CallContext, _id: &str, _pk: &str) -> Result<Document, StoreError> {
        Err(self.error.clone())
    }

    fn create(&self, _ctx: &CallContext, _pk: &str, _document: &Document) -> Result<(), StoreError> {
        Err(self.error.clone())
    }

    fn upsert(&self, _ctx: &CallContext, _pk: &str, _document: &Document) -> Result<(), StoreError> {
        Err(self.error.clone())
    }

    fn delete(
        &self,
        _ctx: &CallContext,
        _id: &str,
        _pk: &str,
        _collection_name: &str,
    ) -> Result<(), StoreError> {
        Err(self.error.clone())
    }
}
