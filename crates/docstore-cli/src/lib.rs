// crates/docstore-cli/src/lib.rs
// ============================================================================
// Module: Docstore CLI Library
// Description: Shared helpers for the docstore command-line interface.
// Purpose: Provide reusable components (message catalog) for the binary.
// Dependencies: Standard library.
// ============================================================================

//! ## Overview
//! This library houses the CLI message catalog. The binary entry point
//! (`src/main.rs`) routes every user-facing string through [`t!`] so output
//! stays consistent across commands.

// ============================================================================
// SECTION: Modules
// ============================================================================

/// Message catalog and formatting helpers.
pub mod i18n;
