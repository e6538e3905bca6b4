// crates/docstore-cli/src/i18n.rs
// ============================================================================
// Module: CLI Message Catalog
// Description: Provides message catalog and formatting utilities for the CLI.
// Purpose: Centralize user-facing strings for consistent output.
// Dependencies: Standard library collections and formatting utilities.
// ============================================================================

//! ## Overview
//! The docstore CLI stores user-facing strings in a small catalog so messages
//! stay consistent across commands. All runtime output should be routed
//! through the [`t!`](crate::t) macro.
//!
//! ## Invariants
//! - The catalog is initialized once and read-only thereafter.
//! - Missing keys fall back to the key itself to avoid panics.
//! - Placeholder substitutions preserve argument order.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::sync::OnceLock;

// ============================================================================
// SECTION: Types
// ============================================================================

/// A formatted message argument captured by the [`macro@crate::t`] macro.
#[derive(Clone)]
pub struct MessageArg {
    /// The placeholder name used in message templates (e.g., `"path"`).
    pub key: &'static str,
    /// The formatted string value to substitute for this placeholder.
    pub value: String,
}

impl MessageArg {
    /// Constructs a new [`MessageArg`] from a key and displayable value.
    pub fn new(key: &'static str, value: impl Into<String>) -> Self {
        Self {
            key,
            value: value.into(),
        }
    }
}

// ============================================================================
// SECTION: Catalog
// ============================================================================

/// Static catalog entries.
const CATALOG_ITEMS: &[(&str, &str)] = &[
    ("main.version", "docstore {version}"),
    ("output.stream.stdout", "stdout"),
    ("output.stream.stderr", "stderr"),
    ("output.stream.unknown", "output"),
    ("output.write_failed", "Failed to write to {stream}: {error}"),
    ("input.read_failed", "Failed to read {kind} at {path}: {error}"),
    (
        "input.read_too_large",
        "Refusing to read {kind} at {path} because it is {size} bytes (limit {limit}).",
    ),
    ("input.parse_failed", "Failed to parse {kind} at {path}: {error}"),
    ("config.load_failed", "Failed to load config: {error}"),
    ("config.validate.ok", "Config valid."),
    ("store.open_failed", "Failed to open document store: {error}"),
    ("store.close_failed", "Failed to close document store: {error}"),
    ("audit.open_failed", "Failed to open audit sink: {error}"),
    ("collection.resolve_failed", "{error}"),
    ("user.identity_failed", "Bootstrap identity is incomplete: {error}"),
    ("user.outcome.created", "User {user_id} created."),
    ("user.outcome.already_present", "User {user_id} already exists."),
    ("user.outcome.updated", "User {user_id} updated."),
    ("user.outcome.removed", "User {user_id} deleted."),
    ("user.outcome.not_found", "User {user_id} not found."),
    ("user.failed", "User {action} failed: {error}"),
    ("seed.not_array", "Seed file {path} must contain a JSON array of objects."),
    ("seed.ok", "Seeded {count} {collection} record(s)."),
    ("seed.failed", "Seed failed: {error}"),
    ("query.param_invalid", "Invalid --param {param}: expected @name=value."),
    ("query.params_failed", "Invalid query parameters: {error}"),
    ("query.failed", "Query failed: {error}"),
    ("list.failed", "List failed: {error}"),
    ("delete.ok", "Deleted {collection} record {id}."),
    ("delete.soft_ok", "Soft-deleted {collection} record {id}."),
    ("delete.failed", "Delete failed: {error}"),
    ("record.serialize_failed", "Failed to serialize record: {error}"),
];

// ============================================================================
// SECTION: Translation
// ============================================================================

/// Looks up `key` in the catalog while substituting `args`.
#[must_use]
pub fn translate(key: &str, args: Vec<MessageArg>) -> String {
    let template = catalog().get(key).copied().unwrap_or(key);
    if args.is_empty() {
        return template.to_string();
    }

    let mut result = template.to_string();
    for arg in args {
        let placeholder = format!("{{{}}}", arg.key);
        result = result.replace(&placeholder, &arg.value);
    }
    result
}

/// Returns the static catalog used by the CLI.
fn catalog() -> &'static HashMap<&'static str, &'static str> {
    static CATALOG: OnceLock<HashMap<&'static str, &'static str>> = OnceLock::new();

    CATALOG.get_or_init(|| CATALOG_ITEMS.iter().copied().collect())
}

// ============================================================================
// SECTION: Macro
// ============================================================================

/// Formats a catalog message from a key and named arguments.
///
/// # Arguments
///
/// - `$key` must match a catalog entry.
/// - Named arguments are substituted into `{placeholder}` positions.
///
/// # Returns
///
/// A [`String`] with placeholders substituted.
#[macro_export]
macro_rules! t {
    ($key:literal $(, $name:ident = $value:expr )* $(,)?) => {{
        let args = ::std::vec![
            $(
                $crate::i18n::MessageArg::new(stringify!($name), $value.to_string()),
            )*
        ];
        $crate::i18n::translate($key, args)
    }};
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test-only assertions are permitted."
    )]

    use std::collections::BTreeSet;

    use super::CATALOG_ITEMS;
    use super::MessageArg;
    use super::translate;

    #[test]
    fn catalog_keys_are_unique() {
        let keys: BTreeSet<&str> = CATALOG_ITEMS.iter().map(|(key, _)| *key).collect();
        assert_eq!(keys.len(), CATALOG_ITEMS.len());
    }

    #[test]
    fn translate_substitutes_placeholders() {
        let output = translate(
            "delete.ok",
            vec![MessageArg::new("collection", "user"), MessageArg::new("id", "u-1")],
        );
        assert_eq!(output, "Deleted user record u-1.");
    }

    #[test]
    fn unknown_key_falls_back_to_key() {
        assert_eq!(translate("no.such.key", Vec::new()), "no.such.key");
    }

    #[test]
    fn macro_formats_display_values() {
        let output = crate::t!("seed.ok", count = 3, collection = "target");
        assert_eq!(output, "Seeded 3 target record(s).");
    }
}
