// crates/docstore-config/src/config.rs
// ============================================================================
// Module: Docstore Configuration
// Description: Configuration loading, validation, and component wiring.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: docstore-core, docstore-store-sqlite, serde, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path limits.
//! The file path resolves from the explicit argument, then the
//! `DOCSTORE_CONFIG` environment variable, then `docstore.toml`. The
//! bootstrap identity may be overridden from `DOCSTORE_USER_ID`,
//! `DOCSTORE_USER_NAME`, and `DOCSTORE_USER_EMAIL`.
//!
//! A loaded config builds the process-wide store handle and audit sink once
//! at startup; [`AccessComponents`] wires the access layer on top of them.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use docstore_core::AccessAuditSink;
use docstore_core::BootstrapIdentity;
use docstore_core::BootstrapReconciler;
use docstore_core::CallContext;
use docstore_core::Clock;
use docstore_core::ConflictPolicy;
use docstore_core::DefaultModel;
use docstore_core::FileAuditSink;
use docstore_core::InMemoryDocumentStore;
use docstore_core::LookupFacade;
use docstore_core::NoopAuditSink;
use docstore_core::QueryExecutor;
use docstore_core::ReconcilerConfig;
use docstore_core::RecordMutator;
use docstore_core::SharedDocumentStore;
use docstore_core::StderrAuditSink;
use docstore_core::SystemClock;
use docstore_store_sqlite::SqliteDocumentStore;
use docstore_store_sqlite::SqliteStoreConfig;
use docstore_store_sqlite::SqliteStoreMode;
use docstore_store_sqlite::SqliteSyncMode;
use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "docstore.toml";
/// Environment variable used to override the config path.
pub const CONFIG_ENV_VAR: &str = "DOCSTORE_CONFIG";
/// Environment variable overriding `bootstrap.user_id`.
pub const USER_ID_ENV_VAR: &str = "DOCSTORE_USER_ID";
/// Environment variable overriding `bootstrap.user_name`.
pub const USER_NAME_ENV_VAR: &str = "DOCSTORE_USER_NAME";
/// Environment variable overriding `bootstrap.user_email`.
pub const USER_EMAIL_ENV_VAR: &str = "DOCSTORE_USER_EMAIL";
/// Maximum configuration file size in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
pub(crate) const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Maximum length of a bootstrap identity field.
pub(crate) const MAX_IDENTITY_FIELD_LENGTH: usize = 256;
/// Default per-call deadline in milliseconds.
pub(crate) const DEFAULT_ACCESS_TIMEOUT_MS: u64 = 10_000;
/// Minimum per-call deadline in milliseconds.
pub(crate) const MIN_ACCESS_TIMEOUT_MS: u64 = 100;
/// Maximum per-call deadline in milliseconds.
pub(crate) const MAX_ACCESS_TIMEOUT_MS: u64 = 300_000;
/// Default `SQLite` busy timeout in milliseconds.
pub(crate) const DEFAULT_STORE_BUSY_TIMEOUT_MS: u64 = 5_000;

// ============================================================================
// SECTION: Configuration Types
// ============================================================================

/// Docstore configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DocstoreConfig {
    /// Document store configuration.
    #[serde(default)]
    pub store: StoreConfig,
    /// Access-layer behavior.
    #[serde(default)]
    pub access: AccessConfig,
    /// Bootstrap identity and defaults.
    #[serde(default)]
    pub bootstrap: BootstrapConfig,
    /// Audit output.
    #[serde(default)]
    pub audit: AuditConfig,
}

impl DocstoreConfig {
    /// Loads configuration from disk using the default resolution rules,
    /// applies environment overrides, and validates the result.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path)?;
        validate_path(&resolved)?;
        let bytes = fs::read(&resolved).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        let mut config = Self::from_toml(content)?;
        config.apply_env_overrides(|name| env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    /// Parses configuration text without validating it.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the text is not valid config TOML.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Overrides bootstrap identity fields from `lookup`, keyed by the
    /// `DOCSTORE_USER_*` variable names.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(value) = lookup(USER_ID_ENV_VAR) {
            self.bootstrap.user_id = Some(value);
        }
        if let Some(value) = lookup(USER_NAME_ENV_VAR) {
            self.bootstrap.user_name = Some(value);
        }
        if let Some(value) = lookup(USER_EMAIL_ENV_VAR) {
            self.bootstrap.user_email = Some(value);
        }
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.store.validate()?;
        self.access.validate()?;
        self.bootstrap.validate()?;
        self.audit.validate()?;
        Ok(())
    }

    /// Opens the configured document store.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the backend cannot be opened.
    pub fn open_store(&self) -> Result<SharedDocumentStore, ConfigError> {
        match self.store.store_type {
            StoreType::Memory => Ok(SharedDocumentStore::from_store(InMemoryDocumentStore::new())),
            StoreType::Sqlite => {
                let path = self.store.path.clone().ok_or_else(|| {
                    ConfigError::Invalid("sqlite store requires path".to_string())
                })?;
                let store = SqliteDocumentStore::new(SqliteStoreConfig {
                    path,
                    busy_timeout_ms: self.store.busy_timeout_ms,
                    journal_mode: self.store.journal_mode,
                    sync_mode: self.store.sync_mode,
                })
                .map_err(|err| ConfigError::Store(err.to_string()))?;
                Ok(SharedDocumentStore::from_store(store))
            }
        }
    }

    /// Builds the configured audit sink.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] when the audit file cannot be opened.
    pub fn audit_sink(&self) -> Result<Arc<dyn AccessAuditSink>, ConfigError> {
        match self.audit.sink {
            AuditSinkType::None => Ok(Arc::new(NoopAuditSink)),
            AuditSinkType::Stderr => Ok(Arc::new(StderrAuditSink)),
            AuditSinkType::File => {
                let path = self.audit.path.as_ref().ok_or_else(|| {
                    ConfigError::Invalid("file audit sink requires path".to_string())
                })?;
                let sink =
                    FileAuditSink::new(path).map_err(|err| ConfigError::Io(err.to_string()))?;
                Ok(Arc::new(sink))
            }
        }
    }

    /// Returns the bootstrap identity.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when any identity field is unset.
    pub fn identity(&self) -> Result<BootstrapIdentity, ConfigError> {
        let field = |value: &Option<String>, name: &str, env_var: &str| {
            value.clone().ok_or_else(|| {
                ConfigError::Invalid(format!("bootstrap.{name} is required (or set {env_var})"))
            })
        };
        Ok(BootstrapIdentity::new(
            field(&self.bootstrap.user_id, "user_id", USER_ID_ENV_VAR)?,
            field(&self.bootstrap.user_name, "user_name", USER_NAME_ENV_VAR)?,
            field(&self.bootstrap.user_email, "user_email", USER_EMAIL_ENV_VAR)?,
        ))
    }

    /// Returns reconciler settings.
    #[must_use]
    pub fn reconciler_config(&self) -> ReconcilerConfig {
        ReconcilerConfig {
            default_model: self.bootstrap.default_model.clone(),
            conflict_policy: self.access.conflict_policy,
        }
    }

    /// Returns a call context bounded by `access.timeout_ms`.
    #[must_use]
    pub fn call_context(&self) -> CallContext {
        CallContext::with_timeout(Duration::from_millis(self.access.timeout_ms))
    }
}

/// Document store configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    /// Store backend type.
    #[serde(rename = "type", default)]
    pub store_type: StoreType,
    /// `SQLite` database path when using the sqlite backend.
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_store_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteStoreMode,
    /// `SQLite` synchronous mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            store_type: StoreType::default(),
            path: None,
            busy_timeout_ms: default_store_busy_timeout_ms(),
            journal_mode: SqliteStoreMode::default(),
            sync_mode: SqliteSyncMode::default(),
        }
    }
}

impl StoreConfig {
    /// Validates store configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        match self.store_type {
            StoreType::Memory => {
                if self.path.is_some() {
                    return Err(ConfigError::Invalid(
                        "memory store must not set path".to_string(),
                    ));
                }
                Ok(())
            }
            StoreType::Sqlite => {
                let path = self.path.as_ref().ok_or_else(|| {
                    ConfigError::Invalid("sqlite store requires path".to_string())
                })?;
                validate_path_string("store.path", &path.to_string_lossy())?;
                if self.busy_timeout_ms == 0 {
                    return Err(ConfigError::Invalid(
                        "store.busy_timeout_ms must be greater than zero".to_string(),
                    ));
                }
                Ok(())
            }
        }
    }
}

/// Document store backend type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StoreType {
    /// Use the in-memory store.
    #[default]
    Memory,
    /// Use `SQLite`-backed durable store.
    Sqlite,
}

/// Access-layer behavior.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AccessConfig {
    /// Per-call deadline in milliseconds.
    #[serde(default = "default_access_timeout_ms")]
    pub timeout_ms: u64,
    /// Handling of create conflicts during bootstrap.
    #[serde(default)]
    pub conflict_policy: ConflictPolicy,
    /// Request two rows on business-id lookups to report duplicates.
    #[serde(default)]
    pub duplicate_probe: bool,
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_access_timeout_ms(),
            conflict_policy: ConflictPolicy::default(),
            duplicate_probe: false,
        }
    }
}

impl AccessConfig {
    /// Validates access configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if !(MIN_ACCESS_TIMEOUT_MS..=MAX_ACCESS_TIMEOUT_MS).contains(&self.timeout_ms) {
            return Err(ConfigError::Invalid(format!(
                "access.timeout_ms must be between {MIN_ACCESS_TIMEOUT_MS} and \
                 {MAX_ACCESS_TIMEOUT_MS}"
            )));
        }
        Ok(())
    }
}

/// Bootstrap identity and defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BootstrapConfig {
    /// User record id.
    #[serde(default)]
    pub user_id: Option<String>,
    /// Display name.
    #[serde(default)]
    pub user_name: Option<String>,
    /// Email address.
    #[serde(default)]
    pub user_email: Option<String>,
    /// Model assigned to created users.
    #[serde(default)]
    pub default_model: DefaultModel,
}

impl BootstrapConfig {
    /// Validates bootstrap configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("bootstrap.user_id", &self.user_id),
            ("bootstrap.user_name", &self.user_name),
            ("bootstrap.user_email", &self.user_email),
        ] {
            if let Some(value) = value {
                validate_identity_field(field, value)?;
            }
        }
        if let Some(email) = &self.user_email
            && !email.contains('@')
        {
            return Err(ConfigError::Invalid("bootstrap.user_email must contain '@'".to_string()));
        }
        validate_identity_field("bootstrap.default_model.id", &self.default_model.id)?;
        validate_identity_field(
            "bootstrap.default_model.display_name",
            &self.default_model.display_name,
        )?;
        Ok(())
    }
}

/// Audit output configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuditConfig {
    /// Sink type.
    #[serde(default)]
    pub sink: AuditSinkType,
    /// JSON-lines file path for the file sink.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl AuditConfig {
    /// Validates audit configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        match (self.sink, &self.path) {
            (AuditSinkType::File, None) => {
                Err(ConfigError::Invalid("file audit sink requires path".to_string()))
            }
            (AuditSinkType::File, Some(path)) => {
                validate_path_string("audit.path", &path.to_string_lossy())
            }
            (_, Some(_)) => {
                Err(ConfigError::Invalid("audit.path is only valid with sink = \"file\"".to_string()))
            }
            (_, None) => Ok(()),
        }
    }
}

/// Audit sink type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AuditSinkType {
    /// Discard audit events.
    None,
    /// JSON lines on stderr.
    #[default]
    Stderr,
    /// JSON lines appended to a file.
    File,
}

/// Returns the default busy timeout for the sqlite store.
const fn default_store_busy_timeout_ms() -> u64 {
    DEFAULT_STORE_BUSY_TIMEOUT_MS
}

/// Returns the default per-call deadline.
const fn default_access_timeout_ms() -> u64 {
    DEFAULT_ACCESS_TIMEOUT_MS
}

// ============================================================================
// SECTION: Wiring
// ============================================================================

/// Access components sharing one store handle, audit sink, and clock.
#[derive(Clone)]
pub struct AccessComponents {
    /// Shared store handle.
    pub store: SharedDocumentStore,
    /// Query executor.
    pub executor: QueryExecutor,
    /// Record mutator.
    pub mutator: RecordMutator,
    /// Lookup façade.
    pub lookup: LookupFacade,
    /// Bootstrap reconciler.
    pub reconciler: BootstrapReconciler,
}

impl AccessComponents {
    /// Wires every access component to `store` with the system clock.
    #[must_use]
    pub fn build(
        config: &DocstoreConfig,
        store: SharedDocumentStore,
        audit: Arc<dyn AccessAuditSink>,
    ) -> Self {
        Self::with_clock(config, store, audit, Arc::new(SystemClock))
    }

    /// Wires every access component to `store` with an explicit clock.
    #[must_use]
    pub fn with_clock(
        config: &DocstoreConfig,
        store: SharedDocumentStore,
        audit: Arc<dyn AccessAuditSink>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let executor = QueryExecutor::new(store.clone(), Arc::clone(&audit));
        let mutator = RecordMutator::new(store.clone(), Arc::clone(&audit), Arc::clone(&clock));
        let lookup = LookupFacade::new(executor.clone(), Arc::clone(&audit))
            .with_duplicate_probe(config.access.duplicate_probe);
        let reconciler = BootstrapReconciler::new(
            lookup.clone(),
            mutator.clone(),
            clock,
            audit,
            config.reconciler_config(),
        );
        Self {
            store,
            executor,
            mutator,
            lookup,
            reconciler,
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration loading or validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
    /// Configured store could not be opened.
    #[error("config store error: {0}")]
    Store(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the config path from CLI or environment defaults.
fn resolve_path(path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(PathBuf::from(env_path));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_NAME))
}

/// Validates the resolved path against security limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}

/// Validates a path string against length constraints.
fn validate_path_string(field: &str, value: &str) -> Result<(), ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if trimmed.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    let path = Path::new(trimmed);
    for component in path.components() {
        let component_value = component.as_os_str().to_string_lossy();
        if component_value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid(format!("{field} path component too long")));
        }
    }
    Ok(())
}

/// Validates a bootstrap text field.
fn validate_identity_field(field: &str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if value.len() > MAX_IDENTITY_FIELD_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    if value.chars().any(char::is_control) {
        return Err(ConfigError::Invalid(format!("{field} must not contain control characters")));
    }
    Ok(())
}
