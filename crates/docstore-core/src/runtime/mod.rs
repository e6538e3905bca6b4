// crates/docstore-core/src/runtime/mod.rs
// ============================================================================
// Module: Docstore Runtime
// Description: Query executor, record mutator, lookup façade, and reconciler.
// Purpose: Implement the access layer on top of any document store.
// Dependencies: crate::{core, interfaces}
// ============================================================================

//! ## Overview
//! Runtime components layer as follows: the reconciler coordinates the lookup
//! façade and the record mutator; the façade runs on the query executor; the
//! executor and mutator talk to a [`SharedDocumentStore`]. The façade and the
//! mutator never call each other.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod audit;
pub mod error;
pub mod executor;
pub mod lookup;
pub mod mutator;
pub mod reconciler;
pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use audit::AccessAuditEvent;
pub use audit::AccessAuditSink;
pub use audit::AccessOutcome;
pub use audit::FileAuditSink;
pub use audit::MemoryAuditSink;
pub use audit::NoopAuditSink;
pub use audit::StderrAuditSink;
pub use error::AccessError;
pub use error::ErrorContext;
pub use error::Operation;
pub use executor::QueryExecutor;
pub use lookup::ListFilter;
pub use lookup::LookupFacade;
pub use mutator::DeleteMode;
pub use mutator::RecordMutator;
pub use reconciler::BootstrapIdentity;
pub use reconciler::BootstrapReconciler;
pub use reconciler::ConflictPolicy;
pub use reconciler::DefaultModel;
pub use reconciler::ReconcileOutcome;
pub use reconciler::ReconcilerConfig;
pub use store::InMemoryDocumentStore;
pub use store::SharedDocumentStore;
pub use store::StoreStats;
