// crates/docstore-core/tests/proptest_access.rs
// ============================================================================
// Module: Access Layer Property-Based Tests
// Description: Property tests for parsing, normalization, and write idempotence.
// Purpose: Detect panics and invariant breaks across wide input ranges.
// ============================================================================

//! Property-based tests for access layer invariants.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions and helpers are permitted."
)]

mod common;

use docstore_core::Collection;
use docstore_core::ParsedQuery;
use docstore_core::QueryBuilder;
use docstore_core::QueryParameters;
use docstore_core::User;
use docstore_core::resolve;
use proptest::prelude::*;

use crate::common::ctx;
use crate::common::fixed_now;
use crate::common::memory_fixture;

proptest! {
    #[test]
    fn parser_never_panics(text in ".{0,200}") {
        let _ = ParsedQuery::parse(&text);
    }

    #[test]
    fn resolve_accepts_only_known_names(name in "[a-z_]{0,24}") {
        let known = Collection::ALL.iter().any(|collection| collection.as_str() == name);
        prop_assert_eq!(resolve(&name).is_ok(), known);
    }

    #[test]
    fn builder_output_always_restricts_collection(
        fields in prop::collection::vec("[a-z][a-z0-9_]{0,8}", 0..4),
        top in prop::option::of(1_u64..50),
    ) {
        let mut builder = QueryBuilder::for_collection();
        if let Some(top) = top {
            builder = builder.top(top);
        }
        for (index, field) in fields.iter().enumerate() {
            builder = builder.where_eq(field, &format!("@p{index}"));
        }
        let text = builder.build().unwrap();
        let parsed = ParsedQuery::parse(&text).unwrap();
        prop_assert!(parsed.restricts_collection());
        prop_assert_eq!(parsed.top, top);
        prop_assert_eq!(parsed.conditions.len(), fields.len() + 1);
    }

    #[test]
    fn user_upsert_is_idempotent_and_lowercases(
        id in "[a-z0-9]{1,12}",
        local in "[A-Za-z0-9.]{1,16}",
        domain in "[A-Za-z]{1,12}\\.[A-Za-z]{2,4}",
    ) {
        let (store, fixture) = memory_fixture();
        let email = format!("{local}@{domain}");
        let user = User::new(id.as_str(), "name", &email, "m", fixed_now());
        let first = fixture.mutator.upsert_as(&ctx(), user.clone()).unwrap();
        let second = fixture.mutator.upsert_as(&ctx(), first.clone()).unwrap();
        prop_assert_eq!(&first, &second);
        prop_assert_eq!(first.email.clone(), email.to_lowercase());
        prop_assert_eq!(store.len().unwrap(), 1);

        let parameters =
            QueryParameters::from_pairs([("@email", email.to_lowercase())]).unwrap();
        let rows = fixture
            .executor
            .execute(
                &ctx(),
                Collection::User,
                "SELECT * FROM c WHERE c.collection_name = @collection_name AND c.email = @email",
                &parameters,
            )
            .unwrap();
        prop_assert_eq!(rows.len(), 1);
    }
}
