//! Config loading and validation tests for docstore-config.
// crates/docstore-config/tests/load_validation.rs
// =============================================================================
// Module: Config Load And Validation Tests
// Description: Validate defaults, limits, overrides, and component wiring.
// Purpose: Ensure configuration fails closed and builds working components.
// =============================================================================

use std::collections::BTreeMap;
use std::path::PathBuf;

use docstore_config::AccessComponents;
use docstore_config::AuditSinkType;
use docstore_config::ConfigError;
use docstore_config::DocstoreConfig;
use docstore_config::StoreType;
use docstore_config::USER_EMAIL_ENV_VAR;
use docstore_config::USER_ID_ENV_VAR;
use docstore_config::USER_NAME_ENV_VAR;
use docstore_core::ConflictPolicy;
use docstore_core::DocumentStore;
use docstore_core::ReconcileOutcome;
use tempfile::TempDir;

mod common;

type TestResult = Result<(), String>;

// ============================================================================
// SECTION: Defaults
// ============================================================================

#[test]
fn empty_config_uses_defaults() -> TestResult {
    let config = common::minimal_config().map_err(|err| err.to_string())?;
    config.validate().map_err(|err| err.to_string())?;
    if config.store.store_type != StoreType::Memory {
        return Err("default store should be memory".to_string());
    }
    if config.access.timeout_ms != 10_000 || config.access.duplicate_probe {
        return Err("unexpected access defaults".to_string());
    }
    if config.access.conflict_policy != ConflictPolicy::Reread {
        return Err("default conflict policy should be reread".to_string());
    }
    if config.audit.sink != AuditSinkType::Stderr {
        return Err("default audit sink should be stderr".to_string());
    }
    let reconciler = config.reconciler_config();
    if reconciler.default_model.id != "gpt-4-mini" {
        return Err(format!("unexpected default model {}", reconciler.default_model.id));
    }
    Ok(())
}

#[test]
fn full_config_parses() -> TestResult {
    let config = common::config_from_toml(
        r#"
        [store]
        type = "sqlite"
        path = "data/docstore.db"
        busy_timeout_ms = 250
        journal_mode = "delete"
        sync_mode = "normal"

        [access]
        timeout_ms = 2000
        conflict_policy = "fail"
        duplicate_probe = true

        [bootstrap]
        user_id = "u-1"
        user_name = "Alice"
        user_email = "Alice@Example.com"

        [bootstrap.default_model]
        id = "gpt-4o"
        display_name = "GPT-4o"

        [audit]
        sink = "none"
        "#,
    )
    .map_err(|err| err.to_string())?;
    config.validate().map_err(|err| err.to_string())?;
    if config.store.path != Some(PathBuf::from("data/docstore.db")) {
        return Err("store path not parsed".to_string());
    }
    let reconciler = config.reconciler_config();
    if reconciler.conflict_policy != ConflictPolicy::Fail || reconciler.default_model.id != "gpt-4o"
    {
        return Err("reconciler settings not carried over".to_string());
    }
    let identity = config.identity().map_err(|err| err.to_string())?;
    if identity.email != "Alice@Example.com" {
        return Err("identity email should be passed through unchanged".to_string());
    }
    Ok(())
}

#[test]
fn unknown_fields_are_rejected() -> TestResult {
    common::assert_invalid(common::config_from_toml("[store]\nkind = \"memory\"\n"), "parse")?;
    common::assert_invalid(common::config_from_toml("[extras]\nx = 1\n"), "parse")?;
    Ok(())
}

#[test]
fn default_model_rejects_unknown_keys() -> TestResult {
    common::assert_invalid(
        common::config_from_toml("[bootstrap.default_model]\nid = \"m\"\ndisplayname = \"M\"\n"),
        "parse",
    )
}

#[test]
fn partial_default_model_keeps_other_defaults() -> TestResult {
    let config = common::config_from_toml("[bootstrap.default_model]\nid = \"gpt-4o\"\n")
        .map_err(|err| err.to_string())?;
    config.validate().map_err(|err| err.to_string())?;
    let model = config.reconciler_config().default_model;
    if model.id != "gpt-4o" {
        return Err(format!("unexpected model id {}", model.id));
    }
    if model.display_name != "GPT-4o mini" {
        return Err(format!("unexpected display name {}", model.display_name));
    }
    Ok(())
}

// ============================================================================
// SECTION: Validation
// ============================================================================

#[test]
fn memory_store_rejects_path() -> TestResult {
    let mut config = common::minimal_config().map_err(|err| err.to_string())?;
    config.store.path = Some(PathBuf::from("docstore.db"));
    common::assert_invalid(config.validate(), "memory store must not set path")
}

#[test]
fn sqlite_store_requires_path() -> TestResult {
    let mut config = common::minimal_config().map_err(|err| err.to_string())?;
    config.store.store_type = StoreType::Sqlite;
    common::assert_invalid(config.validate(), "sqlite store requires path")
}

#[test]
fn sqlite_store_rejects_zero_busy_timeout() -> TestResult {
    let mut config = common::minimal_config().map_err(|err| err.to_string())?;
    config.store.store_type = StoreType::Sqlite;
    config.store.path = Some(PathBuf::from("docstore.db"));
    config.store.busy_timeout_ms = 0;
    common::assert_invalid(config.validate(), "store.busy_timeout_ms must be greater than zero")
}

#[test]
fn access_timeout_must_be_in_range() -> TestResult {
    let mut config = common::minimal_config().map_err(|err| err.to_string())?;
    config.access.timeout_ms = 10;
    common::assert_invalid(config.validate(), "access.timeout_ms must be between")?;
    config.access.timeout_ms = 3_600_000;
    common::assert_invalid(config.validate(), "access.timeout_ms must be between")
}

#[test]
fn bootstrap_fields_are_checked() -> TestResult {
    let mut config = common::minimal_config().map_err(|err| err.to_string())?;
    config.bootstrap.user_id = Some("   ".to_string());
    common::assert_invalid(config.validate(), "bootstrap.user_id must be non-empty")?;
    config.bootstrap.user_id = Some("u-1".to_string());
    config.bootstrap.user_email = Some("not-an-email".to_string());
    common::assert_invalid(config.validate(), "bootstrap.user_email must contain '@'")?;
    config.bootstrap.user_email = Some("a@b.c".to_string());
    config.bootstrap.user_name = Some("line\nbreak".to_string());
    common::assert_invalid(config.validate(), "must not contain control characters")
}

#[test]
fn audit_path_matches_sink() -> TestResult {
    let mut config = common::minimal_config().map_err(|err| err.to_string())?;
    config.audit.sink = AuditSinkType::File;
    common::assert_invalid(config.validate(), "file audit sink requires path")?;
    config.audit.sink = AuditSinkType::Stderr;
    config.audit.path = Some(PathBuf::from("audit.jsonl"));
    common::assert_invalid(config.validate(), "audit.path is only valid")
}

#[test]
fn identity_requires_every_field() -> TestResult {
    let mut config = common::minimal_config().map_err(|err| err.to_string())?;
    config.bootstrap.user_id = Some("u-1".to_string());
    config.bootstrap.user_name = Some("Alice".to_string());
    common::assert_invalid(config.identity(), "bootstrap.user_email is required")?;
    common::assert_invalid(config.identity(), USER_EMAIL_ENV_VAR)
}

#[test]
fn env_overrides_replace_bootstrap_identity() -> TestResult {
    let mut config = common::config_from_toml("[bootstrap]\nuser_id = \"from-file\"\n")
        .map_err(|err| err.to_string())?;
    let env: BTreeMap<&str, &str> = [
        (USER_ID_ENV_VAR, "from-env"),
        (USER_NAME_ENV_VAR, "Env User"),
        (USER_EMAIL_ENV_VAR, "env@example.com"),
    ]
    .into_iter()
    .collect();
    config.apply_env_overrides(|name| env.get(name).map(|value| (*value).to_string()));
    let identity = config.identity().map_err(|err| err.to_string())?;
    if identity.user_id != "from-env" || identity.user_name != "Env User" {
        return Err(format!("overrides not applied: {}", identity.user_id));
    }
    Ok(())
}

// ============================================================================
// SECTION: Loading
// ============================================================================

#[test]
fn load_reads_and_validates_file() -> TestResult {
    let dir = TempDir::new().map_err(|err| err.to_string())?;
    let path = common::write_config(&dir, "[access]\ntimeout_ms = 5000\n")?;
    let config = DocstoreConfig::load(Some(&path)).map_err(|err| err.to_string())?;
    if config.access.timeout_ms != 5_000 {
        return Err("timeout not loaded".to_string());
    }
    let invalid = common::write_config(&dir, "[access]\ntimeout_ms = 1\n")?;
    common::assert_invalid(DocstoreConfig::load(Some(&invalid)), "access.timeout_ms")
}

#[test]
fn load_missing_file_is_io_error() -> TestResult {
    let dir = TempDir::new().map_err(|err| err.to_string())?;
    match DocstoreConfig::load(Some(&dir.path().join("absent.toml"))) {
        Err(ConfigError::Io(_)) => Ok(()),
        Err(other) => Err(format!("expected io error, got {other}")),
        Ok(_) => Err("expected io error, got a config".to_string()),
    }
}

#[test]
fn load_rejects_oversized_file() -> TestResult {
    let dir = TempDir::new().map_err(|err| err.to_string())?;
    let padding = format!("# {}\n", "x".repeat(1024 * 1024));
    let path = common::write_config(&dir, &padding)?;
    common::assert_invalid(DocstoreConfig::load(Some(&path)), "config file exceeds size limit")
}

// ============================================================================
// SECTION: Wiring
// ============================================================================

#[test]
fn sqlite_config_wires_working_components() -> TestResult {
    let dir = TempDir::new().map_err(|err| err.to_string())?;
    let db_path = dir.path().join("db").join("docstore.db");
    let audit_path = dir.path().join("audit.jsonl");
    let content = format!(
        "[store]\ntype = \"sqlite\"\npath = \"{db}\"\n\n[bootstrap]\nuser_id = \"u-1\"\nuser_name \
         = \"Alice\"\nuser_email = \"Alice@Example.com\"\n\n[audit]\nsink = \"file\"\npath = \
         \"{audit}\"\n",
        db = db_path.display(),
        audit = audit_path.display(),
    );
    let path = common::write_config(&dir, &content)?;
    let mut config = DocstoreConfig::from_toml(
        &std::fs::read_to_string(&path).map_err(|err| err.to_string())?,
    )
    .map_err(|err| err.to_string())?;
    config.apply_env_overrides(|_| None);
    config.validate().map_err(|err| err.to_string())?;

    let store = config.open_store().map_err(|err| err.to_string())?;
    let audit = config.audit_sink().map_err(|err| err.to_string())?;
    let components = AccessComponents::build(&config, store, audit);
    let identity = config.identity().map_err(|err| err.to_string())?;
    let ctx = config.call_context();
    let outcome =
        components.reconciler.ensure_created(&ctx, &identity).map_err(|err| err.to_string())?;
    if outcome != ReconcileOutcome::Created {
        return Err(format!("unexpected outcome {}", outcome.as_str()));
    }
    let user = components
        .reconciler
        .show(&ctx, &identity)
        .map_err(|err| err.to_string())?
        .ok_or_else(|| "user missing after create".to_string())?;
    if user.email != "alice@example.com" {
        return Err(format!("email not normalized: {}", user.email));
    }
    components.store.close().map_err(|err| err.to_string())?;

    let audit_lines = std::fs::read_to_string(&audit_path).map_err(|err| err.to_string())?;
    if !audit_lines.lines().any(|line| line.contains("\"ensure_created\"")) {
        return Err("ensure_created audit event missing".to_string());
    }
    if !db_path.exists() {
        return Err("sqlite database not created".to_string());
    }
    Ok(())
}
