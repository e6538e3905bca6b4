// crates/docstore-core/tests/reconciler.rs
// ============================================================================
// Module: Bootstrap Reconciler Tests
// Description: ABSENT/PRESENT transitions, write probes, and create races.
// Purpose: Ensure bootstrap is idempotent and never creates implicitly.
// Dependencies: docstore-core
// ============================================================================
//! ## Overview
//! Drives one identity through create, update, and remove, probing store
//! write counts to prove no-op paths write nothing, and injects a concurrent
//! creator to exercise both conflict policies.

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

use std::time::Duration;
use std::time::Instant;

use docstore_core::AccessError;
use docstore_core::AccessOutcome;
use docstore_core::BootstrapIdentity;
use docstore_core::CallContext;
use docstore_core::Collection;
use docstore_core::ConflictPolicy;
use docstore_core::DeleteMode;
use docstore_core::InMemoryDocumentStore;
use docstore_core::Operation;
use docstore_core::ReconcileOutcome;
use docstore_core::Schema;
use docstore_core::SharedDocumentStore;
use docstore_core::User;

use crate::common::Fixture;
use crate::common::RacingStore;
use crate::common::ctx;
use crate::common::fixed_now;
use crate::common::memory_fixture;
use crate::common::write_count;

fn alice() -> BootstrapIdentity {
    BootstrapIdentity::new("u1", "Alice", "A@X.com")
}

/// Verifies the create/remove scenario for a mixed-case email.
#[test]
fn create_then_remove_scenario() {
    let (_store, fixture) = memory_fixture();
    let reconciler = fixture.reconciler(ConflictPolicy::Reread);

    assert_eq!(reconciler.ensure_created(&ctx(), &alice()).unwrap(), ReconcileOutcome::Created);
    let user = fixture.lookup.find_by_id_as::<User>(&ctx(), "u1").unwrap().unwrap();
    assert_eq!(user.email, "a@x.com");
    assert_eq!(user.username, "Alice");
    assert_eq!(user.meta.deleted_at, None);

    assert_eq!(reconciler.ensure_removed(&ctx(), &alice()).unwrap(), ReconcileOutcome::Removed);
    assert!(fixture.lookup.find_by_id(&ctx(), Collection::User, "u1").unwrap().is_none());
}

/// Verifies created records carry the bootstrap defaults.
#[test]
fn created_record_has_defaults() {
    let (_store, fixture) = memory_fixture();
    let reconciler = fixture.reconciler(ConflictPolicy::Reread);
    reconciler.ensure_created(&ctx(), &alice()).unwrap();

    let user = reconciler.show(&ctx(), &alice()).unwrap().unwrap();
    assert_eq!(user.ai_model_id, "gpt-4-mini");
    assert_eq!(user.ai_model_display_name.as_deref(), Some("GPT-4o mini"));
    assert!(user.personal_projects.is_empty());
    assert_eq!(user.meta.created_at, fixed_now());
    assert_eq!(user.meta.updated_at, fixed_now());
    assert_eq!(user.partition_key(), "u1");
}

/// Verifies a second ensure_created writes nothing and changes nothing.
#[test]
fn ensure_created_twice_is_noop() {
    let (store, fixture) = memory_fixture();
    let reconciler = fixture.reconciler(ConflictPolicy::Reread);
    reconciler.ensure_created(&ctx(), &alice()).unwrap();
    let before = reconciler.show(&ctx(), &alice()).unwrap();
    let writes = write_count(&store);

    fixture.clock.advance(Duration::from_secs(5));
    let outcome = reconciler.ensure_created(&ctx(), &alice()).unwrap();
    assert_eq!(outcome, ReconcileOutcome::AlreadyPresent);
    assert_eq!(write_count(&store), writes);
    assert_eq!(reconciler.show(&ctx(), &alice()).unwrap(), before);
}

/// Verifies ensure_updated on an absent identity reports not found with zero writes.
#[test]
fn ensure_updated_absent_writes_nothing() {
    let (store, fixture) = memory_fixture();
    let reconciler = fixture.reconciler(ConflictPolicy::Reread);
    let outcome = reconciler.ensure_updated(&ctx(), &alice()).unwrap();
    assert_eq!(outcome, ReconcileOutcome::NotFound);
    assert_eq!(write_count(&store), 0);
    assert!(store.is_empty().unwrap());
}

/// Verifies ensure_updated rewrites only identity fields and bumps updated_at.
#[test]
fn ensure_updated_rewrites_identity_fields() {
    let (_store, fixture) = memory_fixture();
    let reconciler = fixture.reconciler(ConflictPolicy::Reread);
    reconciler.ensure_created(&ctx(), &alice()).unwrap();
    let mut stored = reconciler.show(&ctx(), &alice()).unwrap().unwrap();
    stored.personal_projects = vec!["t1".to_string()];
    fixture.mutator.upsert_as(&ctx(), stored).unwrap();

    fixture.clock.advance(Duration::from_secs(30));
    let renamed = BootstrapIdentity::new("u1", "Alice Liddell", "Alice@Wonder.LAND");
    assert_eq!(reconciler.ensure_updated(&ctx(), &renamed).unwrap(), ReconcileOutcome::Updated);

    let user = reconciler.show(&ctx(), &renamed).unwrap().unwrap();
    assert_eq!(user.username, "Alice Liddell");
    assert_eq!(user.email, "alice@wonder.land");
    assert_eq!(user.personal_projects, vec!["t1".to_string()]);
    assert_eq!(user.ai_model_id, "gpt-4-mini");
    assert_eq!(user.meta.created_at, fixed_now());
    assert_eq!(user.meta.updated_at, fixed_now() + Duration::from_secs(30));
}

/// Verifies a soft-deleted user still counts as present and stays deleted.
#[test]
fn soft_deleted_user_counts_as_present() {
    let (store, fixture) = memory_fixture();
    let reconciler = fixture.reconciler(ConflictPolicy::Reread);
    reconciler.ensure_created(&ctx(), &alice()).unwrap();
    fixture.mutator.delete(&ctx(), Collection::User, "u1", "u1", DeleteMode::Soft).unwrap();
    let deleted_at = reconciler.show(&ctx(), &alice()).unwrap().unwrap().meta.deleted_at;
    assert_eq!(deleted_at, Some(fixed_now()));

    let writes = write_count(&store);
    let outcome = reconciler.ensure_created(&ctx(), &alice()).unwrap();
    assert_eq!(outcome, ReconcileOutcome::AlreadyPresent);
    assert_eq!(write_count(&store), writes);

    fixture.clock.advance(Duration::from_secs(10));
    let renamed = BootstrapIdentity::new("u1", "Alice Liddell", "alice@x.com");
    assert_eq!(reconciler.ensure_updated(&ctx(), &renamed).unwrap(), ReconcileOutcome::Updated);
    let user = reconciler.show(&ctx(), &renamed).unwrap().unwrap();
    assert_eq!(user.username, "Alice Liddell");
    assert_eq!(user.meta.deleted_at, deleted_at);
}

/// Verifies ensure_removed on an absent identity reports not found with zero writes.
#[test]
fn ensure_removed_absent_writes_nothing() {
    let (store, fixture) = memory_fixture();
    let reconciler = fixture.reconciler(ConflictPolicy::Reread);
    assert_eq!(reconciler.ensure_removed(&ctx(), &alice()).unwrap(), ReconcileOutcome::NotFound);
    assert_eq!(write_count(&store), 0);
}

/// Verifies a lost create race is benign under the re-read policy.
#[test]
fn create_race_rereads_under_reread_policy() {
    let racing = RacingStore::new(InMemoryDocumentStore::new());
    let fixture = Fixture::with_store(SharedDocumentStore::from_store(racing.clone()));
    let reconciler = fixture.reconciler(ConflictPolicy::Reread);
    let winner = reconciler.default_user(&alice());
    racing.race_with("u1", winner.clone().into_record().to_document().unwrap());

    let outcome = reconciler.ensure_created(&ctx(), &alice()).unwrap();
    assert_eq!(outcome, ReconcileOutcome::AlreadyPresent);
    assert_eq!(racing.inner.len().unwrap(), 1);
    assert_eq!(reconciler.show(&ctx(), &alice()).unwrap(), Some(winner));
}

/// Verifies a lost create race surfaces a conflict under the fail policy.
#[test]
fn create_race_fails_under_fail_policy() {
    let racing = RacingStore::new(InMemoryDocumentStore::new());
    let fixture = Fixture::with_store(SharedDocumentStore::from_store(racing.clone()));
    let reconciler = fixture.reconciler(ConflictPolicy::Fail);
    let winner = reconciler.default_user(&alice());
    racing.race_with("u1", winner.into_record().to_document().unwrap());

    let err = reconciler.ensure_created(&ctx(), &alice()).unwrap_err();
    assert!(matches!(err, AccessError::Conflict { .. }));
    assert_eq!(racing.inner.len().unwrap(), 1);

    let failures: Vec<_> = fixture
        .audit
        .events()
        .into_iter()
        .filter(|event| event.operation == Operation::EnsureCreated)
        .collect();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].outcome, AccessOutcome::Error);
    assert_eq!(failures[0].error_kind, Some("conflict"));
}

/// Verifies a timeout propagates and is not retried.
#[test]
fn timeout_propagates_without_retry() {
    let (store, fixture) = memory_fixture();
    let reconciler = fixture.reconciler(ConflictPolicy::Reread);
    let expired = CallContext::with_deadline(Instant::now());
    let err = reconciler.ensure_created(&expired, &alice()).unwrap_err();
    assert!(matches!(err, AccessError::Timeout { .. }));
    assert_eq!(err.context().unwrap().operation, Operation::FindById);
    assert_eq!(store.stats().unwrap(), Default::default());
}

/// Verifies an identity without a user id is rejected.
#[test]
fn blank_identity_is_rejected() {
    let (store, fixture) = memory_fixture();
    let reconciler = fixture.reconciler(ConflictPolicy::Reread);
    let err = reconciler.ensure_created(&ctx(), &BootstrapIdentity::new(" ", "x", "x@x")).unwrap_err();
    assert!(matches!(err, AccessError::InvalidRecord { .. }));
    assert_eq!(store.stats().unwrap(), Default::default());
}

/// Verifies each reconcile operation records its outcome.
#[test]
fn outcomes_are_audited() {
    let (_store, fixture) = memory_fixture();
    let reconciler = fixture.reconciler(ConflictPolicy::Reread);
    reconciler.ensure_created(&ctx(), &alice()).unwrap();
    reconciler.ensure_updated(&ctx(), &alice()).unwrap();
    reconciler.ensure_removed(&ctx(), &alice()).unwrap();
    reconciler.ensure_removed(&ctx(), &alice()).unwrap();

    let outcomes: Vec<AccessOutcome> = fixture
        .audit
        .events()
        .into_iter()
        .filter(|event| {
            matches!(
                event.operation,
                Operation::EnsureCreated | Operation::EnsureUpdated | Operation::EnsureRemoved
            )
        })
        .map(|event| event.outcome)
        .collect();
    assert_eq!(
        outcomes,
        vec![
            AccessOutcome::Created,
            AccessOutcome::Updated,
            AccessOutcome::Removed,
            AccessOutcome::NotFound
        ]
    );
}
