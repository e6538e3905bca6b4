// crates/docstore-store-sqlite/src/lib.rs
// ============================================================================
// Module: Docstore SQLite Store
// Description: Durable DocumentStore backend using SQLite.
// Purpose: Persist partitioned JSON documents outside the process.
// Dependencies: docstore-core, rusqlite
// ============================================================================

//! ## Overview
//! This crate provides a SQLite-backed [`DocumentStore`] implementation. Each
//! document is stored as a JSON body addressed by `(partition_key, id)`, and
//! parsed queries are translated to `json_extract`/`json_type` predicates
//! that agree with the in-memory store's evaluation rules.
//!
//! [`DocumentStore`]: docstore_core::DocumentStore

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use store::MAX_DOCUMENT_BYTES;
pub use store::SqliteDocumentStore;
pub use store::SqliteStoreConfig;
pub use store::SqliteStoreError;
pub use store::SqliteStoreMode;
pub use store::SqliteSyncMode;
