// crates/docstore-config/src/lib.rs
// ============================================================================
// Module: Docstore Config Library
// Description: Canonical config model, validation, and component wiring.
// Purpose: Single source of truth for docstore.toml semantics.
// Dependencies: docstore-core, docstore-store-sqlite, serde, toml
// ============================================================================

//! ## Overview
//! `docstore-config` defines the configuration model for the document access
//! layer. It provides strict, fail-closed validation and builds the store,
//! audit sink, and access components a process needs at startup.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;
