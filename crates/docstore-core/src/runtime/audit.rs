// crates/docstore-core/src/runtime/audit.rs
// ============================================================================
// Module: Docstore Access Audit
// Description: Structured JSON-lines audit events for access operations.
// Purpose: Record every query, write, and reconcile outcome with context.
// Dependencies: crate::runtime::error, serde, serde_json
// ============================================================================

//! ## Overview
//! Access components report each operation to an [`AccessAuditSink`]. Events
//! are flat JSON objects so deployments can route them to any log pipeline.
//! Sinks never fail the operation that emitted the event.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Serialize;

use crate::core::Collection;
use crate::runtime::error::AccessError;
use crate::runtime::error::Operation;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Event name for completed operations.
pub const EVENT_ACCESS: &str = "docstore_access";
/// Event name for a business identifier that matched more than one row.
pub const EVENT_DUPLICATE_BUSINESS_ID: &str = "duplicate_business_id";

/// Operation outcome recorded in audit events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessOutcome {
    /// Operation completed.
    Ok,
    /// Operation failed.
    Error,
    /// Reconciler created the record.
    Created,
    /// Reconciler found the record already present.
    AlreadyPresent,
    /// Reconciler updated the record.
    Updated,
    /// Reconciler removed the record.
    Removed,
    /// Reconciler found no record.
    NotFound,
    /// Data-quality warning.
    Warning,
}

/// Access audit event payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Collection accessed.
    pub collection: Collection,
    /// Operation kind.
    pub operation: Operation,
    /// Operation outcome.
    pub outcome: AccessOutcome,
    /// Record identifier when applicable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record_id: Option<String>,
    /// Rows returned by a query.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row_count: Option<usize>,
    /// Stable error label on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<&'static str>,
    /// Free-form detail.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl AccessAuditEvent {
    /// Creates an event with a consistent timestamp.
    #[must_use]
    pub fn new(collection: Collection, operation: Operation, outcome: AccessOutcome) -> Self {
        let timestamp_ms =
            SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis();
        Self {
            event: EVENT_ACCESS,
            timestamp_ms,
            collection,
            operation,
            outcome,
            record_id: None,
            row_count: None,
            error_kind: None,
            detail: None,
        }
    }

    /// Creates a failure event from an access error.
    #[must_use]
    pub fn failure(collection: Collection, operation: Operation, err: &AccessError) -> Self {
        let mut event = Self::new(collection, operation, AccessOutcome::Error);
        event.error_kind = Some(err.kind());
        event.record_id = err.context().and_then(|context| context.record_id.clone());
        event.detail = Some(err.to_string());
        event
    }

    /// Sets the event name.
    #[must_use]
    pub const fn named(mut self, event: &'static str) -> Self {
        self.event = event;
        self
    }

    /// Sets the record identifier.
    #[must_use]
    pub fn with_record(mut self, record_id: impl Into<String>) -> Self {
        self.record_id = Some(record_id.into());
        self
    }

    /// Sets the returned row count.
    #[must_use]
    pub const fn with_rows(mut self, row_count: usize) -> Self {
        self.row_count = Some(row_count);
        self
    }

    /// Sets the detail text.
    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Audit sink for access events.
pub trait AccessAuditSink: Send + Sync {
    /// Record an audit event.
    fn record(&self, event: &AccessAuditEvent);
}

/// Audit sink that logs JSON lines to stderr.
pub struct StderrAuditSink;

impl AccessAuditSink for StderrAuditSink {
    fn record(&self, event: &AccessAuditEvent) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = writeln!(std::io::stderr(), "{payload}");
        }
    }
}

/// Audit sink that logs JSON lines to a file.
pub struct FileAuditSink {
    /// File handle used for append-only logging.
    file: Mutex<std::fs::File>,
}

impl FileAuditSink {
    /// Opens the audit log file in append mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn new(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }
}

impl AccessAuditSink for FileAuditSink {
    fn record(&self, event: &AccessAuditEvent) {
        if let Ok(payload) = serde_json::to_string(event)
            && let Ok(mut file) = self.file.lock()
        {
            let _ = writeln!(file, "{payload}");
            let _ = file.flush();
        }
    }
}

/// No-op audit sink.
pub struct NoopAuditSink;

impl AccessAuditSink for NoopAuditSink {
    fn record(&self, _event: &AccessAuditEvent) {}
}

/// Audit sink that keeps events in memory for inspection.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    /// Recorded events in emission order.
    events: Mutex<Vec<AccessAuditEvent>>,
}

impl MemoryAuditSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the recorded events.
    #[must_use]
    pub fn events(&self) -> Vec<AccessAuditEvent> {
        self.events.lock().map(|events| events.clone()).unwrap_or_default()
    }

    /// Returns recorded events with the given name.
    #[must_use]
    pub fn events_named(&self, event: &str) -> Vec<AccessAuditEvent> {
        self.events().into_iter().filter(|recorded| recorded.event == event).collect()
    }
}

impl AccessAuditSink for MemoryAuditSink {
    fn record(&self, event: &AccessAuditEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}
