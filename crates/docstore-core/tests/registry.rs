// crates/docstore-core/tests/registry.rs
// ============================================================================
// Module: Schema Registry Tests
// Description: Collection resolution, descriptors, and record decoding.
// Purpose: Ensure the collection-to-schema mapping is total and rejects drift.
// Dependencies: docstore-core, serde_json
// ============================================================================
//! ## Overview
//! Covers resolution of every collection name, rejection of unknown names,
//! and typed decoding of stored documents including tag and shape mismatches.

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

use std::collections::BTreeSet;

use docstore_core::Collection;
use docstore_core::Record;
use docstore_core::RecordMeta;
use docstore_core::Schema;
use docstore_core::SchemaError;
use docstore_core::Summary;
use docstore_core::Target;
use docstore_core::Team;
use docstore_core::User;
use docstore_core::resolve;
use serde_json::Value;
use serde_json::json;

use crate::common::fixed_now;

fn as_document(value: Value) -> docstore_core::Document {
    match value {
        Value::Object(map) => map,
        _ => panic!("expected object"),
    }
}

/// Verifies every collection resolves by its wire name.
#[test]
fn every_collection_resolves_by_name() {
    for collection in Collection::ALL {
        let resolved = resolve(collection.as_str()).expect("known collection");
        assert_eq!(resolved, collection);
        assert_eq!(resolved.schema().collection, collection);
    }
}

/// Verifies the mapping is injective over schema type names.
#[test]
fn schema_types_are_distinct() {
    let names: BTreeSet<&str> =
        Collection::ALL.iter().map(|collection| collection.schema().type_name).collect();
    assert_eq!(names.len(), Collection::ALL.len());
}

/// Verifies names outside the closed set fail with the rejected name.
#[test]
fn unknown_collection_is_rejected() {
    for name in ["", "USER", "users", "User", "target ", "nonexistent"] {
        let err = resolve(name).unwrap_err();
        assert_eq!(err.name, name);
    }
}

/// Verifies target-scoped collections look up by target id.
#[test]
fn business_id_fields_follow_schema() {
    assert_eq!(Collection::Target.schema().business_id_field, "target_id");
    assert_eq!(Collection::Summary.schema().business_id_field, "target_id");
    assert_eq!(Collection::MeetingMinutes.schema().business_id_field, "target_id");
    assert_eq!(Collection::User.schema().business_id_field, "id");
    assert_eq!(Collection::Comment.schema().business_id_field, "id");
}

/// Verifies a user record survives encode and decode with its tag.
#[test]
fn user_document_decodes_to_user() {
    let user = User::new("u1", "Alice", "A@X.com", "gpt-4-mini", fixed_now());
    let document = user.clone().into_record().to_document().unwrap();
    assert_eq!(document.get("collection_name"), Some(&json!("user")));
    assert_eq!(document.get("email"), Some(&json!("a@x.com")));
    assert_eq!(document.get("deleted_at"), Some(&Value::Null));

    let decoded = Collection::User.decode(document).unwrap();
    assert_eq!(decoded.collection(), Collection::User);
    assert_eq!(decoded.into_schema::<User>(), Some(user));
}

/// Verifies store metadata fields are ignored on decode.
#[test]
fn store_metadata_is_ignored() {
    let target = Target::new("t-doc", "t1", "Kickoff", "u1", fixed_now());
    let mut document = target.clone().into_record().to_document().unwrap();
    document.insert("_ts".to_string(), json!(1_704_067_200));
    document.insert("_etag".to_string(), json!("\"0001\""));
    let decoded = Collection::Target.decode(document).unwrap();
    assert_eq!(decoded, Record::Target(target));
}

/// Verifies a document tagged for another collection is rejected.
#[test]
fn decode_rejects_foreign_collection_tag() {
    let user = User::new("u1", "Alice", "a@x.com", "gpt-4-mini", fixed_now());
    let document = user.into_record().to_document().unwrap();
    let err = Collection::Team.decode(document).unwrap_err();
    assert_eq!(
        err,
        SchemaError::CollectionTag {
            expected: Collection::Team,
            found: Some("user".to_string()),
        }
    );
}

/// Verifies an untagged document is rejected.
#[test]
fn decode_rejects_missing_tag() {
    let document = as_document(json!({"id": "x"}));
    let err = Collection::Log.decode(document).unwrap_err();
    assert!(matches!(err, SchemaError::CollectionTag { found: None, .. }));
}

/// Verifies shape drift is a typed decode error.
#[test]
fn decode_rejects_malformed_fields() {
    let document = as_document(json!({
        "collection_name": "user",
        "id": "u1",
        "partition_key": "u1",
        "created_at": "not-a-timestamp",
        "updated_at": "2024-01-01T00:00:00Z",
        "deleted_at": null,
        "username": "Alice",
        "email": "a@x.com",
        "ai_model_id": "gpt-4-mini",
        "ai_model_display_name": null,
        "personal_projects": []
    }));
    let err = Collection::User.decode(document).unwrap_err();
    assert!(matches!(err, SchemaError::Decode(_)));
}

/// Verifies partition keys are derived from schema fields.
#[test]
fn partition_keys_are_schema_derived() {
    let user = User::new("u1", "Alice", "a@x.com", "m", fixed_now());
    assert_eq!(user.derive_partition_key(), "u1");

    let target = Target::new("doc-1", "t1", "Kickoff", "u1", fixed_now());
    assert_eq!(target.derive_partition_key(), "t1");
    assert_eq!(target.business_id(), "t1");
    assert_eq!(target.id(), "doc-1");

    let summary: Summary = serde_json::from_value(json!({
        "id": "s1",
        "partition_key": "t1",
        "created_at": "2024-01-01T00:00:00Z",
        "updated_at": "2024-01-01T00:00:00Z",
        "deleted_at": null,
        "target_id": "t1",
        "content": "notes",
        "ai_model_id": "gpt-4-mini"
    }))
    .unwrap();
    assert_eq!(summary.derive_partition_key(), summary.partition_key());
}

/// Verifies teams are partitioned by their own id.
#[test]
fn team_partition_key_is_its_id() {
    let team = Team {
        meta: RecordMeta::new("team-1", "team-1", fixed_now()),
        name: "Platform".to_string(),
        owner_id: "u1".to_string(),
        member_ids: vec!["u1".to_string(), "u2".to_string()],
    };
    assert_eq!(team.derive_partition_key(), "team-1");
    assert_eq!(team.business_id(), "team-1");
    assert_eq!(Collection::Team.schema().business_id_field, "id");
}

/// Verifies user normalization lowercases the email.
#[test]
fn user_normalization_lowercases_email() {
    let mut record = User::new("u1", "Alice", "a@x.com", "m", fixed_now()).into_record();
    if let Record::User(user) = &mut record {
        user.email = "Mixed@Example.COM".to_string();
    }
    record.normalize();
    let user = record.into_schema::<User>().unwrap();
    assert_eq!(user.email, "mixed@example.com");
}
