// crates/docstore-core/src/runtime/error.rs
// ============================================================================
// Module: Docstore Access Errors
// Description: Caller-facing error taxonomy for the access layer.
// Purpose: Carry collection, operation, and record context with every failure.
// Dependencies: crate::{core, interfaces}, serde, thiserror
// ============================================================================

//! ## Overview
//! Every operation on the access layer fails with [`AccessError`]. Store
//! failures are mapped one to one onto caller-facing variants and tagged with
//! an [`ErrorContext`] so callers can log and route them without re-deriving
//! which collection, operation, or record was involved. Nothing here retries.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::core::Collection;
use crate::core::QueryError;
use crate::core::SchemaError;
use crate::core::UnknownCollection;
use crate::interfaces::StoreError;

// ============================================================================
// SECTION: Operation
// ============================================================================

/// Access-layer operation kinds used in errors and audit events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    /// Query execution.
    Query,
    /// Business-identifier lookup.
    FindById,
    /// Collection listing.
    List,
    /// Full-replace write.
    Upsert,
    /// Conditional insert.
    Create,
    /// Hard or soft delete.
    Delete,
    /// Bootstrap creation.
    EnsureCreated,
    /// Bootstrap update.
    EnsureUpdated,
    /// Bootstrap removal.
    EnsureRemoved,
    /// Bootstrap read.
    Show,
}

impl Operation {
    /// Returns the stable label for logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Query => "query",
            Self::FindById => "find_by_id",
            Self::List => "list",
            Self::Upsert => "upsert",
            Self::Create => "create",
            Self::Delete => "delete",
            Self::EnsureCreated => "ensure_created",
            Self::EnsureUpdated => "ensure_updated",
            Self::EnsureRemoved => "ensure_removed",
            Self::Show => "show",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Error Context
// ============================================================================

/// Structured context attached to access errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorContext {
    /// Collection being accessed.
    pub collection: Collection,
    /// Operation that failed.
    pub operation: Operation,
    /// Offending record identifier, when known.
    pub record_id: Option<String>,
}

impl ErrorContext {
    /// Creates a context without a record identifier.
    #[must_use]
    pub const fn new(collection: Collection, operation: Operation) -> Self {
        Self {
            collection,
            operation,
            record_id: None,
        }
    }

    /// Attaches the offending record identifier.
    #[must_use]
    pub fn with_record(mut self, record_id: impl Into<String>) -> Self {
        self.record_id = Some(record_id.into());
        self
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} on {}", self.operation, self.collection)?;
        if let Some(record_id) = &self.record_id {
            write!(f, " (id {record_id})")?;
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Access Error
// ============================================================================

/// Access-layer errors returned to callers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccessError {
    /// Collection name outside the closed set.
    #[error("unknown collection: {name}")]
    UnknownCollection {
        /// Rejected name.
        name: String,
    },
    /// Stored row does not conform to its schema.
    #[error("record decode failed for {context}: {message}")]
    RecordDecode {
        /// Failure context.
        context: ErrorContext,
        /// Decoder message.
        message: String,
    },
    /// Addressed record does not exist.
    #[error("record not found for {context}")]
    NotFound {
        /// Failure context.
        context: ErrorContext,
    },
    /// Conditional create found an existing record.
    #[error("record conflict for {context}: {message}")]
    Conflict {
        /// Failure context.
        context: ErrorContext,
        /// Store message.
        message: String,
    },
    /// Store call exceeded the caller's deadline.
    #[error("store timeout for {context}: {message}")]
    Timeout {
        /// Failure context.
        context: ErrorContext,
        /// Store message.
        message: String,
    },
    /// Store is unreachable or closed.
    #[error("store unavailable for {context}: {message}")]
    StoreUnavailable {
        /// Failure context.
        context: ErrorContext,
        /// Store message.
        message: String,
    },
    /// Query template or parameters rejected before reaching the store.
    #[error("invalid query for {context}: {source}")]
    InvalidQuery {
        /// Failure context.
        context: ErrorContext,
        /// Validation failure.
        source: QueryError,
    },
    /// Record rejected before reaching the store.
    #[error("invalid record for {context}: {message}")]
    InvalidRecord {
        /// Failure context.
        context: ErrorContext,
        /// Validation message.
        message: String,
    },
    /// Any other store failure.
    #[error("store error for {context}: {message}")]
    Store {
        /// Failure context.
        context: ErrorContext,
        /// Store message.
        message: String,
    },
}

impl AccessError {
    /// Maps a store error onto the caller-facing taxonomy.
    #[must_use]
    pub fn from_store(err: StoreError, context: ErrorContext) -> Self {
        match err {
            StoreError::NotFound(_) => Self::NotFound {
                context,
            },
            StoreError::Conflict(message) => Self::Conflict {
                context,
                message,
            },
            StoreError::Timeout(message) => Self::Timeout {
                context,
                message,
            },
            StoreError::Unavailable(message) => Self::StoreUnavailable {
                context,
                message,
            },
            StoreError::Invalid(message) => Self::InvalidRecord {
                context,
                message,
            },
            StoreError::Store(message) => Self::Store {
                context,
                message,
            },
        }
    }

    /// Maps a schema error raised while decoding a stored row.
    #[must_use]
    pub fn from_decode(err: &SchemaError, context: ErrorContext) -> Self {
        Self::RecordDecode {
            context,
            message: err.to_string(),
        }
    }

    /// Returns a stable label for logs and CLI output.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::UnknownCollection {
                ..
            } => "unknown_collection",
            Self::RecordDecode {
                ..
            } => "record_decode",
            Self::NotFound {
                ..
            } => "not_found",
            Self::Conflict {
                ..
            } => "conflict",
            Self::Timeout {
                ..
            } => "timeout",
            Self::StoreUnavailable {
                ..
            } => "store_unavailable",
            Self::InvalidQuery {
                ..
            } => "invalid_query",
            Self::InvalidRecord {
                ..
            } => "invalid_record",
            Self::Store {
                ..
            } => "store",
        }
    }

    /// Returns the attached context, if any.
    #[must_use]
    pub const fn context(&self) -> Option<&ErrorContext> {
        match self {
            Self::UnknownCollection {
                ..
            } => None,
            Self::RecordDecode {
                context, ..
            }
            | Self::NotFound {
                context,
            }
            | Self::Conflict {
                context, ..
            }
            | Self::Timeout {
                context, ..
            }
            | Self::StoreUnavailable {
                context, ..
            }
            | Self::InvalidQuery {
                context, ..
            }
            | Self::InvalidRecord {
                context, ..
            }
            | Self::Store {
                context, ..
            } => Some(context),
        }
    }

    /// Returns true for [`AccessError::NotFound`].
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl From<UnknownCollection> for AccessError {
    fn from(err: UnknownCollection) -> Self {
        Self::UnknownCollection {
            name: err.name,
        }
    }
}
