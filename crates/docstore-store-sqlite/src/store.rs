// crates/docstore-store-sqlite/src/store.rs
// ============================================================================
// Module: Docstore SQLite Store
// Description: Durable DocumentStore backed by SQLite WAL.
// Purpose: Persist JSON documents and evaluate parsed queries in SQL.
// Dependencies: docstore-core, rusqlite, serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! This module implements a durable [`DocumentStore`] using `SQLite`. Each
//! document body is kept as JSON text in a `documents` table keyed by
//! `(partition_key, id)` together with a per-document revision used for the
//! `_etag` stamp.
//!
//! Parsed queries are translated into SQL over `json_type` and `json_extract`.
//! The translation keeps the in-memory evaluation rules: values of different
//! JSON types never compare, ordering operators never hold for null,
//! `IS_NULL` only matches a present null, and `ORDER BY` ranks missing, null,
//! bool, number, then string, breaking ties on `(partition_key, id)`.
//!
//! Every call checks the caller's deadline first and bounds the `SQLite` busy
//! wait by the time remaining; a busy database surfaces as
//! [`StoreError::Timeout`].

// ============================================================================//
// SECTION: Imports
// ============================================================================//

use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::time::Duration;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use docstore_core::CallContext;
use docstore_core::CompareOp;
use docstore_core::Condition;
use docstore_core::Document;
use docstore_core::DocumentStore;
use docstore_core::FieldPath;
use docstore_core::ParamValue;
use docstore_core::SortDirection;
use docstore_core::StoreError;
use docstore_core::StoreQuery;
use docstore_core::document_collection;
use docstore_core::document_id;
use docstore_core::runtime::store::ETAG_FIELD;
use docstore_core::runtime::store::TS_FIELD;
use rusqlite::Connection;
use rusqlite::ErrorCode;
use rusqlite::OpenFlags;
use rusqlite::OptionalExtension;
use rusqlite::params;
use rusqlite::params_from_iter;
use rusqlite::types::Value as SqlValue;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

// ============================================================================//
// SECTION: Constants
// ============================================================================//

/// `SQLite` schema version for the store.
const SCHEMA_VERSION: i64 = 1;
/// Default busy timeout (ms).
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
/// Maximum length of a single path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Maximum serialized document size accepted by the store.
pub const MAX_DOCUMENT_BYTES: usize = 2 * 1024 * 1024;

// ============================================================================//
// SECTION: Config
// ============================================================================//

/// `SQLite` journal mode configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteStoreMode {
    /// WAL journal mode (recommended).
    #[default]
    Wal,
    /// Delete journal mode (legacy).
    Delete,
}

impl SqliteStoreMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Wal => "wal",
            Self::Delete => "delete",
        }
    }
}

/// `SQLite` sync mode configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteSyncMode {
    /// Full synchronous mode (safest).
    #[default]
    Full,
    /// Normal synchronous mode (balanced).
    Normal,
}

impl SqliteSyncMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Normal => "normal",
        }
    }
}

/// Configuration for the `SQLite` document store.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SqliteStoreConfig {
    /// Path to the `SQLite` database file.
    pub path: PathBuf,
    /// Upper bound on the busy wait in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteStoreMode,
    /// `SQLite` sync mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
}

impl SqliteStoreConfig {
    /// Creates a configuration with default timeouts and modes.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            journal_mode: SqliteStoreMode::default(),
            sync_mode: SqliteSyncMode::default(),
        }
    }
}

/// Returns the default busy timeout for `SQLite` connections.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

// ============================================================================//
// SECTION: Errors
// ============================================================================//

/// `SQLite` store errors.
#[derive(Debug, Error)]
pub enum SqliteStoreError {
    /// Store I/O error.
    #[error("sqlite store io error: {0}")]
    Io(String),
    /// `SQLite` engine error.
    #[error("sqlite store db error: {0}")]
    Db(String),
    /// Database stayed locked past the allowed wait.
    #[error("sqlite store busy: {0}")]
    Busy(String),
    /// Unique key already taken.
    #[error("sqlite store conflict: {0}")]
    Conflict(String),
    /// Addressed document does not exist.
    #[error("sqlite store document not found: {0}")]
    NotFound(String),
    /// Stored body is not a JSON object.
    #[error("sqlite store corruption: {0}")]
    Corrupt(String),
    /// Store schema version mismatch.
    #[error("sqlite store version mismatch: {0}")]
    VersionMismatch(String),
    /// Invalid store input.
    #[error("sqlite store invalid data: {0}")]
    Invalid(String),
    /// Store was closed.
    #[error("sqlite store is closed")]
    Closed,
    /// Document exceeded configured size limits.
    #[error("sqlite store payload too large: {actual_bytes} bytes (max {max_bytes})")]
    TooLarge {
        /// Maximum allowed bytes.
        max_bytes: usize,
        /// Actual payload size in bytes.
        actual_bytes: usize,
    },
}

impl SqliteStoreError {
    /// Classifies a `rusqlite` error.
    fn from_db(error: &rusqlite::Error) -> Self {
        match error.sqlite_error_code() {
            Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked) => {
                Self::Busy(error.to_string())
            }
            Some(ErrorCode::ConstraintViolation) => Self::Conflict(error.to_string()),
            _ => Self::Db(error.to_string()),
        }
    }
}

impl From<rusqlite::Error> for SqliteStoreError {
    fn from(error: rusqlite::Error) -> Self {
        Self::from_db(&error)
    }
}

impl From<SqliteStoreError> for StoreError {
    fn from(error: SqliteStoreError) -> Self {
        match error {
            SqliteStoreError::Io(message) => Self::Unavailable(message),
            SqliteStoreError::Busy(message) => Self::Timeout(message),
            SqliteStoreError::Conflict(message) => Self::Conflict(message),
            SqliteStoreError::NotFound(message) => Self::NotFound(message),
            SqliteStoreError::Invalid(message) => Self::Invalid(message),
            SqliteStoreError::Closed => Self::Unavailable("sqlite store is closed".to_string()),
            SqliteStoreError::Db(message)
            | SqliteStoreError::Corrupt(message)
            | SqliteStoreError::VersionMismatch(message) => Self::Store(message),
            SqliteStoreError::TooLarge {
                max_bytes,
                actual_bytes,
            } => Self::Invalid(format!(
                "document exceeds size limit: {actual_bytes} bytes (max {max_bytes})"
            )),
        }
    }
}

// ============================================================================//
// SECTION: Store
// ============================================================================//

/// `SQLite`-backed document store with WAL support.
///
/// # Invariants
/// - The connection is `None` once [`DocumentStore::close`] has run.
#[derive(Clone)]
pub struct SqliteDocumentStore {
    /// Store configuration.
    config: SqliteStoreConfig,
    /// Shared `SQLite` connection guarded by a mutex.
    connection: Arc<Mutex<Option<Connection>>>,
}

impl SqliteDocumentStore {
    /// Opens an `SQLite`-backed document store.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the database cannot be opened or
    /// initialized.
    pub fn new(config: SqliteStoreConfig) -> Result<Self, SqliteStoreError> {
        validate_store_path(&config.path)?;
        ensure_parent_dir(&config.path)?;
        let mut connection = open_connection(&config)?;
        initialize_schema(&mut connection)?;
        Ok(Self {
            config,
            connection: Arc::new(Mutex::new(Some(connection))),
        })
    }

    /// Returns the store configuration.
    #[must_use]
    pub const fn config(&self) -> &SqliteStoreConfig {
        &self.config
    }

    /// Counts stored documents across all partitions.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the store is closed or the count fails.
    pub fn len(&self) -> Result<usize, SqliteStoreError> {
        let guard = self.lock()?;
        let connection = guard.as_ref().ok_or(SqliteStoreError::Closed)?;
        let count: i64 =
            connection.query_row("SELECT COUNT(*) FROM documents", params![], |row| row.get(0))?;
        drop(guard);
        usize::try_from(count)
            .map_err(|_| SqliteStoreError::Corrupt("negative document count".to_string()))
    }

    /// Returns true when no documents are stored.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the store is closed or the count fails.
    pub fn is_empty(&self) -> Result<bool, SqliteStoreError> {
        Ok(self.len()? == 0)
    }

    /// Locks the connection slot.
    fn lock(&self) -> Result<MutexGuard<'_, Option<Connection>>, SqliteStoreError> {
        self.connection.lock().map_err(|_| SqliteStoreError::Db("mutex poisoned".to_string()))
    }

    /// Checks the deadline, locks the connection, and bounds the busy wait.
    fn begin(
        &self,
        ctx: &CallContext,
    ) -> Result<MutexGuard<'_, Option<Connection>>, SqliteStoreError> {
        if ctx.is_expired() {
            return Err(SqliteStoreError::Busy("call deadline elapsed".to_string()));
        }
        let guard = self.lock()?;
        let connection = guard.as_ref().ok_or(SqliteStoreError::Closed)?;
        let configured = Duration::from_millis(self.config.busy_timeout_ms);
        let wait = ctx.remaining().map_or(configured, |remaining| remaining.min(configured));
        connection.busy_timeout(wait)?;
        Ok(guard)
    }

    /// Runs a translated query.
    fn query_documents(
        &self,
        ctx: &CallContext,
        query: &StoreQuery,
    ) -> Result<Vec<Document>, SqliteStoreError> {
        if !query.options.enable_cross_partition_query && query.options.partition_key.is_none() {
            return Err(SqliteStoreError::Invalid(
                "cross-partition query disabled without a partition key".to_string(),
            ));
        }
        let (sql, values) = translate_query(query)?;
        let guard = self.begin(ctx)?;
        let connection = guard.as_ref().ok_or(SqliteStoreError::Closed)?;
        let mut statement = connection.prepare(&sql)?;
        let bodies = statement
            .query_map(params_from_iter(values), |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        drop(statement);
        drop(guard);
        bodies.iter().map(|body| parse_body(body)).collect()
    }

    /// Reads one document body.
    fn read_document(
        &self,
        ctx: &CallContext,
        id: &str,
        partition_key: &str,
    ) -> Result<Document, SqliteStoreError> {
        let guard = self.begin(ctx)?;
        let connection = guard.as_ref().ok_or(SqliteStoreError::Closed)?;
        let body: Option<String> = connection
            .query_row(
                "SELECT body FROM documents WHERE partition_key = ?1 AND id = ?2",
                params![partition_key, id],
                |row| row.get(0),
            )
            .optional()?;
        drop(guard);
        let body = body.ok_or_else(|| SqliteStoreError::NotFound(format!("{partition_key}/{id}")))?;
        parse_body(&body)
    }

    /// Writes a document; `replace` selects upsert over conditional insert.
    fn write_document(
        &self,
        ctx: &CallContext,
        partition_key: &str,
        document: &Document,
        replace: bool,
    ) -> Result<(), SqliteStoreError> {
        let id = document_id(document)
            .map_err(|err| SqliteStoreError::Invalid(err.to_string()))?
            .to_string();
        let mut guard = self.begin(ctx)?;
        let connection = guard.as_mut().ok_or(SqliteStoreError::Closed)?;
        let tx = connection.transaction()?;
        let current: Option<(i64, Option<String>)> = tx
            .query_row(
                "SELECT revision, json_extract(body, '$.collection_name') FROM documents WHERE \
                 partition_key = ?1 AND id = ?2",
                params![partition_key, id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        if let Some((_, stored)) = &current {
            if !replace {
                return Err(SqliteStoreError::Conflict(format!("{partition_key}/{id}")));
            }
            let requested = document_collection(document);
            if stored.as_deref() != requested {
                return Err(SqliteStoreError::Conflict(format!(
                    "{partition_key}/{id} belongs to collection {}, not {}",
                    stored.as_deref().unwrap_or("(untagged)"),
                    requested.unwrap_or("(untagged)")
                )));
            }
        }
        let current = current.map(|(revision, _)| revision);
        let revision = current.unwrap_or(0).checked_add(1).ok_or_else(|| {
            SqliteStoreError::Corrupt(format!("revision overflow for {partition_key}/{id}"))
        })?;
        let body = stamp_body(document, revision)?;
        if replace {
            tx.execute(
                "INSERT INTO documents (partition_key, id, body, revision) VALUES (?1, ?2, ?3, \
                 ?4) ON CONFLICT(partition_key, id) DO UPDATE SET body = excluded.body, revision \
                 = excluded.revision",
                params![partition_key, id, body, revision],
            )?;
        } else {
            tx.execute(
                "INSERT INTO documents (partition_key, id, body, revision) VALUES (?1, ?2, ?3, ?4)",
                params![partition_key, id, body, revision],
            )?;
        }
        tx.commit()?;
        drop(guard);
        Ok(())
    }

    /// Deletes one document tagged with `collection_name`.
    fn delete_document(
        &self,
        ctx: &CallContext,
        id: &str,
        partition_key: &str,
        collection_name: &str,
    ) -> Result<(), SqliteStoreError> {
        let guard = self.begin(ctx)?;
        let connection = guard.as_ref().ok_or(SqliteStoreError::Closed)?;
        let removed = connection.execute(
            "DELETE FROM documents WHERE partition_key = ?1 AND id = ?2 AND \
             json_extract(body, '$.collection_name') = ?3",
            params![partition_key, id, collection_name],
        )?;
        drop(guard);
        if removed == 0 {
            return Err(SqliteStoreError::NotFound(format!("{partition_key}/{id}")));
        }
        Ok(())
    }

    /// Closes the connection; later calls fail with [`SqliteStoreError::Closed`].
    fn close_connection(&self) -> Result<(), SqliteStoreError> {
        let mut guard = self.lock()?;
        let taken = guard.take();
        drop(guard);
        match taken {
            Some(connection) => connection.close().map_err(|(_, err)| SqliteStoreError::from(err)),
            None => Ok(()),
        }
    }
}

impl DocumentStore for SqliteDocumentStore {
    fn query(&self, ctx: &CallContext, query: &StoreQuery) -> Result<Vec<Document>, StoreError> {
        self.query_documents(ctx, query).map_err(StoreError::from)
    }

    fn read(
        &self,
        ctx: &CallContext,
        id: &str,
        partition_key: &str,
    ) -> Result<Document, StoreError> {
        self.read_document(ctx, id, partition_key).map_err(StoreError::from)
    }

    fn create(
        &self,
        ctx: &CallContext,
        partition_key: &str,
        document: &Document,
    ) -> Result<(), StoreError> {
        self.write_document(ctx, partition_key, document, false).map_err(StoreError::from)
    }

    fn upsert(
        &self,
        ctx: &CallContext,
        partition_key: &str,
        document: &Document,
    ) -> Result<(), StoreError> {
        self.write_document(ctx, partition_key, document, true).map_err(StoreError::from)
    }

    fn delete(
        &self,
        ctx: &CallContext,
        id: &str,
        partition_key: &str,
        collection_name: &str,
    ) -> Result<(), StoreError> {
        self.delete_document(ctx, id, partition_key, collection_name).map_err(StoreError::from)
    }

    fn close(&self) -> Result<(), StoreError> {
        self.close_connection().map_err(StoreError::from)
    }
}

// ============================================================================//
// SECTION: Query Translation
// ============================================================================//

/// Accumulates SQL fragments and positional bind values.
#[derive(Default)]
struct SqlBuilder {
    /// Bound values in placeholder order.
    values: Vec<SqlValue>,
}

impl SqlBuilder {
    /// Binds a value and returns its placeholder.
    fn bind(&mut self, value: SqlValue) -> String {
        self.values.push(value);
        format!("?{}", self.values.len())
    }

    /// Binds a field path and returns `json_type(body, ?)`.
    fn json_type(&mut self, path: &FieldPath) -> String {
        let placeholder = self.bind(SqlValue::Text(path.json_path()));
        format!("json_type(body, {placeholder})")
    }

    /// Binds a field path and returns `json_extract(body, ?)`.
    fn json_extract(&mut self, path: &FieldPath) -> String {
        let placeholder = self.bind(SqlValue::Text(path.json_path()));
        format!("json_extract(body, {placeholder})")
    }
}

/// Translates a parsed query into SQL text and bind values.
fn translate_query(query: &StoreQuery) -> Result<(String, Vec<SqlValue>), SqliteStoreError> {
    let mut builder = SqlBuilder::default();
    let mut clauses = Vec::new();
    if let Some(partition_key) = &query.options.partition_key {
        let placeholder = builder.bind(SqlValue::Text(partition_key.clone()));
        clauses.push(format!("partition_key = {placeholder}"));
    }
    for condition in &query.parsed.conditions {
        let clause = match condition {
            Condition::IsNull {
                path,
                negated,
            } => {
                let json_type = builder.json_type(path);
                let op = if *negated { "<>" } else { "=" };
                format!("IFNULL({json_type}, 'missing') {op} 'null'")
            }
            Condition::Compare {
                path,
                op,
                param,
            } => {
                let value = query.parameters.get(param).ok_or_else(|| {
                    SqliteStoreError::Invalid(format!("unbound parameter {param}"))
                })?;
                compare_clause(&mut builder, path, *op, value)
            }
        };
        clauses.push(clause);
    }
    let mut sql = String::from("SELECT body FROM documents");
    if !clauses.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
    }
    sql.push_str(" ORDER BY ");
    if let Some(order_by) = &query.parsed.order_by {
        let direction = match order_by.direction {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        };
        let rank_type = builder.json_type(&order_by.path);
        let value_type = builder.json_type(&order_by.path);
        let value = builder.json_extract(&order_by.path);
        sql.push_str(&format!(
            "CASE IFNULL({rank_type}, 'missing') WHEN 'missing' THEN 0 WHEN 'null' THEN 1 WHEN \
             'true' THEN 2 WHEN 'false' THEN 2 WHEN 'integer' THEN 3 WHEN 'real' THEN 3 WHEN \
             'text' THEN 4 ELSE 5 END {direction}, CASE WHEN {value_type} IN ('object', \
             'array') THEN NULL ELSE {value} END {direction}, "
        ));
    }
    sql.push_str("partition_key ASC, id ASC");
    if let Some(top) = query.parsed.top {
        let limit = i64::try_from(top).unwrap_or(i64::MAX);
        let placeholder = builder.bind(SqlValue::Integer(limit));
        sql.push_str(&format!(" LIMIT {placeholder}"));
    }
    Ok((sql, builder.values))
}

/// Builds a type-guarded comparison between a field and a bound value.
fn compare_clause(
    builder: &mut SqlBuilder,
    path: &FieldPath,
    op: CompareOp,
    value: &ParamValue,
) -> String {
    let sql_op = sql_operator(op);
    match value {
        ParamValue::Null => {
            if op == CompareOp::Eq {
                let json_type = builder.json_type(path);
                format!("{json_type} = 'null'")
            } else {
                "0".to_string()
            }
        }
        ParamValue::Bool(flag) => {
            let guard = builder.json_type(path);
            let truth = builder.json_type(path);
            let placeholder = builder.bind(SqlValue::Integer(i64::from(*flag)));
            format!("({guard} IN ('true', 'false') AND ({truth} = 'true') {sql_op} {placeholder})")
        }
        ParamValue::Int(number) => {
            typed_compare(builder, path, "('integer', 'real')", sql_op, SqlValue::Integer(*number))
        }
        ParamValue::Float(number) => {
            typed_compare(builder, path, "('integer', 'real')", sql_op, SqlValue::Real(*number))
        }
        ParamValue::Text(text) => {
            typed_compare(builder, path, "('text')", sql_op, SqlValue::Text(text.clone()))
        }
    }
}

/// Compares `json_extract` against a value when the stored type is in `types`.
fn typed_compare(
    builder: &mut SqlBuilder,
    path: &FieldPath,
    types: &str,
    sql_op: &str,
    value: SqlValue,
) -> String {
    let guard = builder.json_type(path);
    let extract = builder.json_extract(path);
    let placeholder = builder.bind(value);
    format!("({guard} IN {types} AND {extract} {sql_op} {placeholder})")
}

/// Maps a comparison operator to SQL.
const fn sql_operator(op: CompareOp) -> &'static str {
    match op {
        CompareOp::Eq => "=",
        CompareOp::Ne => "<>",
        CompareOp::Lt => "<",
        CompareOp::Le => "<=",
        CompareOp::Gt => ">",
        CompareOp::Ge => ">=",
    }
}

// ============================================================================//
// SECTION: Helpers
// ============================================================================//

/// Serializes a document with `_ts` and `_etag` stamps.
fn stamp_body(document: &Document, revision: i64) -> Result<String, SqliteStoreError> {
    let mut stamped = document.clone();
    let seconds = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs();
    stamped.insert(TS_FIELD.to_string(), Value::from(seconds));
    stamped.insert(ETAG_FIELD.to_string(), Value::String(format!("\"{revision:016x}\"")));
    let body = serde_json::to_string(&stamped)
        .map_err(|err| SqliteStoreError::Invalid(err.to_string()))?;
    if body.len() > MAX_DOCUMENT_BYTES {
        return Err(SqliteStoreError::TooLarge {
            max_bytes: MAX_DOCUMENT_BYTES,
            actual_bytes: body.len(),
        });
    }
    Ok(body)
}

/// Parses a stored body into a document.
fn parse_body(body: &str) -> Result<Document, SqliteStoreError> {
    match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(document)) => Ok(document),
        Ok(_) => Err(SqliteStoreError::Corrupt("document body is not an object".to_string())),
        Err(err) => Err(SqliteStoreError::Corrupt(err.to_string())),
    }
}

/// Ensures the parent directory for the store exists.
fn ensure_parent_dir(path: &Path) -> Result<(), SqliteStoreError> {
    let Some(parent) = path.parent() else {
        return Err(SqliteStoreError::Io("store path missing parent directory".to_string()));
    };
    if parent.as_os_str().is_empty() {
        return Ok(());
    }
    std::fs::create_dir_all(parent).map_err(|err| SqliteStoreError::Io(err.to_string()))
}

/// Validates store paths for safety limits.
fn validate_store_path(path: &Path) -> Result<(), SqliteStoreError> {
    let path_string = path.display().to_string();
    if path_string.is_empty() {
        return Err(SqliteStoreError::Invalid("store path must not be empty".to_string()));
    }
    if path_string.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(SqliteStoreError::Invalid("store path exceeds length limit".to_string()));
    }
    for component in path.components() {
        let name = component.as_os_str().to_string_lossy();
        if name.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(SqliteStoreError::Invalid(
                "store path contains an overlong component".to_string(),
            ));
        }
    }
    if path.is_dir() {
        return Err(SqliteStoreError::Invalid(
            "store path must be a file, not a directory".to_string(),
        ));
    }
    Ok(())
}

/// Opens an `SQLite` connection with secure defaults.
fn open_connection(config: &SqliteStoreConfig) -> Result<Connection, SqliteStoreError> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
    let connection = Connection::open_with_flags(&config.path, flags)?;
    apply_pragmas(&connection, config)?;
    Ok(connection)
}

/// Applies `SQLite` pragmas required for durability.
fn apply_pragmas(
    connection: &Connection,
    config: &SqliteStoreConfig,
) -> Result<(), SqliteStoreError> {
    connection.execute_batch(&format!(
        "PRAGMA journal_mode = {};",
        config.journal_mode.pragma_value()
    ))?;
    connection
        .execute_batch(&format!("PRAGMA synchronous = {};", config.sync_mode.pragma_value()))?;
    connection.busy_timeout(Duration::from_millis(config.busy_timeout_ms))?;
    Ok(())
}

/// Initializes the `SQLite` schema or validates existing version.
fn initialize_schema(connection: &mut Connection) -> Result<(), SqliteStoreError> {
    let tx = connection.transaction()?;
    tx.execute_batch("CREATE TABLE IF NOT EXISTS store_meta (version INTEGER NOT NULL);")?;
    let version: Option<i64> = tx
        .query_row("SELECT version FROM store_meta LIMIT 1", params![], |row| row.get(0))
        .optional()?;
    match version {
        None => {
            tx.execute("INSERT INTO store_meta (version) VALUES (?1)", params![SCHEMA_VERSION])?;
            tx.execute_batch(
                "CREATE TABLE IF NOT EXISTS documents (
                    partition_key TEXT NOT NULL,
                    id TEXT NOT NULL,
                    body TEXT NOT NULL,
                    revision INTEGER NOT NULL,
                    PRIMARY KEY (partition_key, id)
                );
                CREATE INDEX IF NOT EXISTS idx_documents_collection
                    ON documents (json_extract(body, '$.collection_name'));",
            )?;
        }
        Some(value) if value == SCHEMA_VERSION => {}
        Some(value) => {
            return Err(SqliteStoreError::VersionMismatch(format!(
                "unsupported schema version: {value}"
            )));
        }
    }
    tx.commit()?;
    Ok(())
}

// ============================================================================//
// SECTION: Tests
// ============================================================================//
