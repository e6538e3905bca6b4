// crates/docstore-core/tests/executor.rs
// ============================================================================
// Module: Query Executor Tests
// Description: Template validation, collection binding, and fail-fast decoding.
// Purpose: Ensure queries stay collection-scoped and surface drift loudly.
// Dependencies: docstore-core, serde_json
// ============================================================================
//! ## Overview
//! Runs templates through the executor against the in-memory store, covering
//! the mandatory collection predicate, parameter accounting, decode failures,
//! ordering, and transport errors.

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
    reason = "Test-only output and panic-based assertions are permitted."
)]

mod common;

use std::time::Instant;

use docstore_core::AccessError;
use docstore_core::AccessOutcome;
use docstore_core::CallContext;
use docstore_core::Collection;
use docstore_core::DocumentStore;
use docstore_core::Operation;
use docstore_core::QueryError;
use docstore_core::QueryExecutor;
use docstore_core::QueryParameters;
use docstore_core::Schema;
use docstore_core::SharedDocumentStore;
use docstore_core::StoreError;
use docstore_core::Target;
use docstore_core::User;
use serde_json::json;

use crate::common::FailingStore;
use crate::common::Fixture;
use crate::common::ctx;
use crate::common::fixed_now;
use crate::common::memory_fixture;

const ALL_ROWS: &str = "SELECT * FROM c WHERE c.collection_name = @collection_name";

fn seed_users(fixture: &Fixture, ids: &[&str]) {
    for id in ids {
        let user = User::new(*id, format!("name-{id}"), &format!("{id}@x.com"), "m", fixed_now());
        fixture.mutator.upsert(&ctx(), &user.into_record()).unwrap();
    }
}

/// Verifies a template without the collection predicate never reaches the store.
#[test]
fn rejects_template_without_collection_predicate() {
    let (store, fixture) = memory_fixture();
    let err = fixture
        .executor
        .execute(&ctx(), Collection::User, "SELECT * FROM c", &QueryParameters::new())
        .unwrap_err();
    assert!(matches!(
        err,
        AccessError::InvalidQuery { source: QueryError::MissingCollectionPredicate, .. }
    ));
    assert_eq!(err.kind(), "invalid_query");
    assert_eq!(store.stats().unwrap().queries, 0);
}

/// Verifies the executor binds the collection and only returns that collection.
#[test]
fn binds_collection_and_isolates_rows() {
    let (_store, fixture) = memory_fixture();
    seed_users(&fixture, &["u1", "u2"]);
    let target = Target::new("doc-1", "t1", "Kickoff", "u1", fixed_now());
    fixture.mutator.upsert(&ctx(), &target.into_record()).unwrap();

    let users = fixture.executor.execute_as::<User>(&ctx(), ALL_ROWS, &QueryParameters::new()).unwrap();
    assert_eq!(users.len(), 2);
    let targets =
        fixture.executor.execute(&ctx(), Collection::Target, ALL_ROWS, &QueryParameters::new()).unwrap();
    assert_eq!(targets.len(), 1);
    assert_eq!(targets[0].collection(), Collection::Target);
}

/// Verifies a caller-bound collection must agree with the executed collection.
#[test]
fn caller_collection_parameter_must_match() {
    let (_store, fixture) = memory_fixture();
    seed_users(&fixture, &["u1"]);
    let same = QueryParameters::from_pairs([("@collection_name", "user")]).unwrap();
    let rows = fixture.executor.execute(&ctx(), Collection::User, ALL_ROWS, &same).unwrap();
    assert_eq!(rows.len(), 1);

    let other = QueryParameters::from_pairs([("@collection_name", "team")]).unwrap();
    let err = fixture.executor.execute(&ctx(), Collection::User, ALL_ROWS, &other).unwrap_err();
    assert!(matches!(
        err,
        AccessError::InvalidQuery {
            source: QueryError::ConflictingCollectionParameter { .. },
            ..
        }
    ));
}

/// Verifies every placeholder needs exactly one bound value.
#[test]
fn placeholders_and_parameters_must_match() {
    let (_store, fixture) = memory_fixture();
    let template = "SELECT * FROM c WHERE c.collection_name = @collection_name AND c.email = @email";
    let err = fixture
        .executor
        .execute(&ctx(), Collection::User, template, &QueryParameters::new())
        .unwrap_err();
    assert!(matches!(
        err,
        AccessError::InvalidQuery { source: QueryError::MissingParameter(ref name), .. } if name == "@email"
    ));

    let extra = QueryParameters::from_pairs([("@email", "a@x.com"), ("@unused", "x")]).unwrap();
    let err = fixture.executor.execute(&ctx(), Collection::User, template, &extra).unwrap_err();
    assert!(matches!(
        err,
        AccessError::InvalidQuery { source: QueryError::UnusedParameter(ref name), .. } if name == "@unused"
    ));
}

/// Verifies parameter values are compared, never interpreted as query text.
#[test]
fn parameter_values_are_not_query_text() {
    let (_store, fixture) = memory_fixture();
    seed_users(&fixture, &["u1"]);
    let template = "SELECT * FROM c WHERE c.collection_name = @collection_name AND c.id = @id";
    let parameters = QueryParameters::from_pairs([("@id", "u1' OR '1'='1")]).unwrap();
    let rows = fixture.executor.execute(&ctx(), Collection::User, template, &parameters).unwrap();
    assert!(rows.is_empty());
}

/// Verifies one malformed row fails the whole call.
#[test]
fn malformed_row_fails_whole_query() {
    let (store, fixture) = memory_fixture();
    seed_users(&fixture, &["u1", "u3"]);
    let broken = json!({
        "collection_name": "user",
        "id": "u2",
        "partition_key": "u2",
        "username": "broken"
    });
    let serde_json::Value::Object(broken) = broken else { panic!("object") };
    store.upsert(&ctx(), "u2", &broken).unwrap();

    let err = fixture
        .executor
        .execute(&ctx(), Collection::User, ALL_ROWS, &QueryParameters::new())
        .unwrap_err();
    assert!(matches!(err, AccessError::RecordDecode { .. }));
    assert_eq!(err.context().unwrap().operation, Operation::Query);
}

/// Verifies an empty result is not an error.
#[test]
fn empty_result_is_ok() {
    let (_store, fixture) = memory_fixture();
    let rows = fixture
        .executor
        .execute(&ctx(), Collection::Log, ALL_ROWS, &QueryParameters::new())
        .unwrap();
    assert!(rows.is_empty());
}

/// Verifies ORDER BY and TOP are honored.
#[test]
fn order_by_and_top_are_applied() {
    let (_store, fixture) = memory_fixture();
    seed_users(&fixture, &["u2", "u3", "u1"]);
    let template =
        "SELECT TOP 2 * FROM c WHERE c.collection_name = @collection_name ORDER BY c.id DESC";
    let users =
        fixture.executor.execute_as::<User>(&ctx(), template, &QueryParameters::new()).unwrap();
    let ids: Vec<&str> = users.iter().map(Schema::id).collect();
    assert_eq!(ids, vec!["u3", "u2"]);
}

/// Verifies comparison and null checks evaluate against stored fields.
#[test]
fn comparisons_and_null_checks_filter_rows() {
    let (_store, fixture) = memory_fixture();
    seed_users(&fixture, &["u1", "u2", "u3"]);
    let template = "SELECT * FROM c WHERE c.collection_name = @collection_name \
                    AND c.id > @after AND IS_NULL(c.deleted_at)";
    let parameters = QueryParameters::from_pairs([("@after", "u1")]).unwrap();
    let rows = fixture.executor.execute(&ctx(), Collection::User, template, &parameters).unwrap();
    assert_eq!(rows.len(), 2);
}

/// Verifies unknown collection names fail before any store call.
#[test]
fn execute_named_rejects_unknown_collection() {
    let (store, fixture) = memory_fixture();
    let err = fixture
        .executor
        .execute_named(&ctx(), "users", ALL_ROWS, &QueryParameters::new())
        .unwrap_err();
    assert_eq!(err, AccessError::UnknownCollection { name: "users".to_string() });
    assert_eq!(store.stats().unwrap().queries, 0);
}

/// Verifies an elapsed deadline surfaces as a timeout with context.
#[test]
fn elapsed_deadline_is_timeout() {
    let (_store, fixture) = memory_fixture();
    let expired = CallContext::with_deadline(Instant::now());
    let err = fixture
        .executor
        .execute(&expired, Collection::User, ALL_ROWS, &QueryParameters::new())
        .unwrap_err();
    assert!(matches!(err, AccessError::Timeout { .. }));
    let context = err.context().unwrap();
    assert_eq!(context.collection, Collection::User);
    assert_eq!(context.operation, Operation::Query);
}

/// Verifies transport errors map one to one.
#[test]
fn store_errors_map_to_access_errors() {
    let cases = [
        (StoreError::Unavailable("down".to_string()), "store_unavailable"),
        (StoreError::Timeout("slow".to_string()), "timeout"),
        (StoreError::Store("boom".to_string()), "store"),
    ];
    for (error, kind) in cases {
        let executor =
            QueryExecutor::with_store(SharedDocumentStore::from_store(FailingStore { error }));
        let err = executor
            .execute(&ctx(), Collection::Team, ALL_ROWS, &QueryParameters::new())
            .unwrap_err();
        assert_eq!(err.kind(), kind);
    }
}

/// Verifies a closed store reports unavailability.
#[test]
fn closed_store_is_unavailable() {
    let (store, fixture) = memory_fixture();
    store.close().unwrap();
    let err = fixture
        .executor
        .execute(&ctx(), Collection::User, ALL_ROWS, &QueryParameters::new())
        .unwrap_err();
    assert!(matches!(err, AccessError::StoreUnavailable { .. }));
}

/// Verifies successes and failures are audited.
#[test]
fn executions_are_audited() {
    let (_store, fixture) = memory_fixture();
    seed_users(&fixture, &["u1"]);
    fixture.executor.execute(&ctx(), Collection::User, ALL_ROWS, &QueryParameters::new()).unwrap();
    let _ = fixture.executor.execute(&ctx(), Collection::User, "SELECT * FROM c", &QueryParameters::new());

    let queries: Vec<_> = fixture
        .audit
        .events()
        .into_iter()
        .filter(|event| event.operation == Operation::Query)
        .collect();
    assert_eq!(queries.len(), 2);
    assert_eq!(queries[0].outcome, AccessOutcome::Ok);
    assert_eq!(queries[0].row_count, Some(1));
    assert_eq!(queries[1].outcome, AccessOutcome::Error);
    assert_eq!(queries[1].error_kind, Some("invalid_query"));
}
