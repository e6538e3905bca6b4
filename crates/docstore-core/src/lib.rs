// crates/docstore-core/src/lib.rs
// ============================================================================
// Module: Docstore Core Library
// Description: Public API surface for the typed document access layer.
// Purpose: Expose core types, the store interface, and runtime components.
// Dependencies: crate::{core, interfaces, runtime}
// ============================================================================

//! ## Overview
//! Docstore core maps a closed set of logical collections onto typed record
//! schemas stored together in one partitioned document container. It builds
//! parameterized cross-partition queries, performs partition-addressed writes,
//! and keeps a bootstrap user record in sync with an external identity. It is
//! backend-agnostic: storage plugs in through [`DocumentStore`].

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod core;
pub mod interfaces;
pub mod runtime;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use crate::core::*;

pub use interfaces::CallContext;
pub use interfaces::DocumentStore;
pub use interfaces::QueryOptions;
pub use interfaces::StoreError;
pub use interfaces::StoreQuery;
pub use interfaces::document_collection;
pub use interfaces::document_id;
pub use interfaces::ensure_same_collection;
pub use runtime::AccessAuditEvent;
pub use runtime::AccessAuditSink;
pub use runtime::AccessError;
pub use runtime::AccessOutcome;
pub use runtime::BootstrapIdentity;
pub use runtime::BootstrapReconciler;
pub use runtime::ConflictPolicy;
pub use runtime::DefaultModel;
pub use runtime::DeleteMode;
pub use runtime::ErrorContext;
pub use runtime::FileAuditSink;
pub use runtime::InMemoryDocumentStore;
pub use runtime::ListFilter;
pub use runtime::LookupFacade;
pub use runtime::MemoryAuditSink;
pub use runtime::NoopAuditSink;
pub use runtime::Operation;
pub use runtime::QueryExecutor;
pub use runtime::ReconcileOutcome;
pub use runtime::ReconcilerConfig;
pub use runtime::RecordMutator;
pub use runtime::SharedDocumentStore;
pub use runtime::StderrAuditSink;
pub use runtime::StoreStats;
