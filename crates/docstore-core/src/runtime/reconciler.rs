// crates/docstore-core/src/runtime/reconciler.rs
// ============================================================================
// Module: Docstore Bootstrap Reconciler
// Description: Idempotent create/update/remove of one well-known user record.
// Purpose: Keep exactly one user record in sync with an external identity.
// Dependencies: crate::{core, interfaces, runtime}, serde
// ============================================================================

//! ## Overview
//! The reconciler drives one identity's user record between ABSENT and
//! PRESENT. It checks existence through the lookup façade and writes through
//! the record mutator; it is the only component that uses both.
//!
//! Existence check and write are not atomic. Creation therefore uses the
//! store's conditional create, so two racing `ensure_created` calls cannot both
//! insert; the loser sees a conflict and handles it per [`ConflictPolicy`].
//! Update and removal never create: an absent identity is reported as
//! [`ReconcileOutcome::NotFound`] without any write.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use serde::Deserialize;
use serde::Serialize;

use crate::core::Clock;
use crate::core::Collection;
use crate::core::Schema;
use crate::core::User;
use crate::interfaces::CallContext;
use crate::runtime::audit::AccessAuditEvent;
use crate::runtime::audit::AccessAuditSink;
use crate::runtime::audit::AccessOutcome;
use crate::runtime::error::AccessError;
use crate::runtime::error::ErrorContext;
use crate::runtime::error::Operation;
use crate::runtime::lookup::LookupFacade;
use crate::runtime::mutator::DeleteMode;
use crate::runtime::mutator::RecordMutator;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Model identifier assigned to newly created users.
pub const DEFAULT_MODEL_ID: &str = "gpt-4-mini";
/// Display name of the default model.
pub const DEFAULT_MODEL_DISPLAY_NAME: &str = "GPT-4o mini";

// ============================================================================
// SECTION: Types
// ============================================================================

/// External identity mirrored into a user record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BootstrapIdentity {
    /// User record id.
    pub user_id: String,
    /// Display name.
    pub user_name: String,
    /// Email as supplied; stored lowercase.
    pub email: String,
}

impl BootstrapIdentity {
    /// Creates an identity.
    #[must_use]
    pub fn new(
        user_id: impl Into<String>,
        user_name: impl Into<String>,
        email: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            user_name: user_name.into(),
            email: email.into(),
        }
    }
}

/// Model assignment for new users. Omitted fields take their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DefaultModel {
    /// Model identifier.
    pub id: String,
    /// Model display name.
    pub display_name: String,
}

impl Default for DefaultModel {
    fn default() -> Self {
        Self {
            id: DEFAULT_MODEL_ID.to_string(),
            display_name: DEFAULT_MODEL_DISPLAY_NAME.to_string(),
        }
    }
}

/// Handling of a conditional-create conflict in `ensure_created`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictPolicy {
    /// Re-read the record and report it as already present.
    #[default]
    Reread,
    /// Surface the conflict to the caller.
    Fail,
}

/// Reconciler settings.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReconcilerConfig {
    /// Model assigned to created users.
    pub default_model: DefaultModel,
    /// Conflict handling on create.
    pub conflict_policy: ConflictPolicy,
}

/// Reported result of a reconcile operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcileOutcome {
    /// Record was inserted.
    Created,
    /// Record already existed; nothing written.
    AlreadyPresent,
    /// Record was rewritten with the identity's fields.
    Updated,
    /// Record was deleted.
    Removed,
    /// No record exists for the identity; nothing written.
    NotFound,
}

impl ReconcileOutcome {
    /// Returns the stable label for output.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::AlreadyPresent => "already_present",
            Self::Updated => "updated",
            Self::Removed => "removed",
            Self::NotFound => "not_found",
        }
    }

    /// Maps the outcome to its audit label.
    const fn audit_outcome(self) -> AccessOutcome {
        match self {
            Self::Created => AccessOutcome::Created,
            Self::AlreadyPresent => AccessOutcome::AlreadyPresent,
            Self::Updated => AccessOutcome::Updated,
            Self::Removed => AccessOutcome::Removed,
            Self::NotFound => AccessOutcome::NotFound,
        }
    }
}

// ============================================================================
// SECTION: Reconciler
// ============================================================================

/// Keeps one identity's user record in the requested state.
#[derive(Clone)]
pub struct BootstrapReconciler {
    /// Existence checks.
    lookup: LookupFacade,
    /// Writes.
    mutator: RecordMutator,
    /// Time source for record timestamps.
    clock: Arc<dyn Clock>,
    /// Audit sink for reconcile events.
    audit: Arc<dyn AccessAuditSink>,
    /// Defaults and conflict policy.
    config: ReconcilerConfig,
}

impl BootstrapReconciler {
    /// Creates a reconciler.
    #[must_use]
    pub fn new(
        lookup: LookupFacade,
        mutator: RecordMutator,
        clock: Arc<dyn Clock>,
        audit: Arc<dyn AccessAuditSink>,
        config: ReconcilerConfig,
    ) -> Self {
        Self {
            lookup,
            mutator,
            clock,
            audit,
            config,
        }
    }

    /// Returns the active settings.
    #[must_use]
    pub const fn config(&self) -> &ReconcilerConfig {
        &self.config
    }

    /// Creates the identity's user record if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`AccessError::Conflict`] when a concurrent create wins and the
    /// policy is [`ConflictPolicy::Fail`], [`AccessError::InvalidRecord`] for an
    /// identity without a user id, otherwise lookup or store errors.
    pub fn ensure_created(
        &self,
        ctx: &CallContext,
        identity: &BootstrapIdentity,
    ) -> Result<ReconcileOutcome, AccessError> {
        let result = self.create_if_absent(ctx, identity);
        self.report(Operation::EnsureCreated, identity, &result);
        result
    }

    /// Rewrites the identity-derived fields of an existing user record.
    ///
    /// Only `username` and `email` change, and `updated_at` is bumped. An
    /// absent record is reported as [`ReconcileOutcome::NotFound`] and nothing
    /// is written.
    ///
    /// # Errors
    ///
    /// Returns lookup or store errors.
    pub fn ensure_updated(
        &self,
        ctx: &CallContext,
        identity: &BootstrapIdentity,
    ) -> Result<ReconcileOutcome, AccessError> {
        let result = self.update_if_present(ctx, identity);
        self.report(Operation::EnsureUpdated, identity, &result);
        result
    }

    /// Hard-deletes the identity's user record if it exists.
    ///
    /// # Errors
    ///
    /// Returns lookup or store errors other than a concurrent removal.
    pub fn ensure_removed(
        &self,
        ctx: &CallContext,
        identity: &BootstrapIdentity,
    ) -> Result<ReconcileOutcome, AccessError> {
        let result = self.remove_if_present(ctx, identity);
        self.report(Operation::EnsureRemoved, identity, &result);
        result
    }

    /// Returns the identity's user record, if present.
    ///
    /// # Errors
    ///
    /// Returns lookup errors.
    pub fn show(
        &self,
        ctx: &CallContext,
        identity: &BootstrapIdentity,
    ) -> Result<Option<User>, AccessError> {
        self.lookup.find_by_id_as::<User>(ctx, &identity.user_id)
    }

    /// Builds the default user record for an identity.
    #[must_use]
    pub fn default_user(&self, identity: &BootstrapIdentity) -> User {
        let mut user = User::new(
            identity.user_id.as_str(),
            identity.user_name.as_str(),
            &identity.email,
            self.config.default_model.id.as_str(),
            self.clock.now(),
        );
        user.ai_model_display_name = Some(self.config.default_model.display_name.clone());
        user
    }

    /// ABSENT -> create; PRESENT -> no-op. A soft-deleted user is present.
    fn create_if_absent(
        &self,
        ctx: &CallContext,
        identity: &BootstrapIdentity,
    ) -> Result<ReconcileOutcome, AccessError> {
        check_identity(identity, Operation::EnsureCreated)?;
        if self.lookup.find_by_id_as::<User>(ctx, &identity.user_id)?.is_some() {
            return Ok(ReconcileOutcome::AlreadyPresent);
        }
        let user = self.default_user(identity);
        match self.mutator.create(ctx, &user.into_record()) {
            Ok(_) => Ok(ReconcileOutcome::Created),
            Err(err @ AccessError::Conflict { .. }) => match self.config.conflict_policy {
                ConflictPolicy::Fail => Err(err),
                ConflictPolicy::Reread => {
                    if self.lookup.find_by_id_as::<User>(ctx, &identity.user_id)?.is_some() {
                        Ok(ReconcileOutcome::AlreadyPresent)
                    } else {
                        Err(err)
                    }
                }
            },
            Err(err) => Err(err),
        }
    }

    /// PRESENT -> rewrite identity fields; ABSENT -> not found.
    fn update_if_present(
        &self,
        ctx: &CallContext,
        identity: &BootstrapIdentity,
    ) -> Result<ReconcileOutcome, AccessError> {
        check_identity(identity, Operation::EnsureUpdated)?;
        let Some(mut user) = self.lookup.find_by_id_as::<User>(ctx, &identity.user_id)? else {
            return Ok(ReconcileOutcome::NotFound);
        };
        user.username.clone_from(&identity.user_name);
        user.email = identity.email.to_lowercase();
        user.meta_mut().updated_at = self.clock.now();
        self.mutator.upsert(ctx, &user.into_record())?;
        Ok(ReconcileOutcome::Updated)
    }

    /// PRESENT -> hard delete; ABSENT -> not found.
    fn remove_if_present(
        &self,
        ctx: &CallContext,
        identity: &BootstrapIdentity,
    ) -> Result<ReconcileOutcome, AccessError> {
        check_identity(identity, Operation::EnsureRemoved)?;
        let Some(user) = self.lookup.find_by_id_as::<User>(ctx, &identity.user_id)? else {
            return Ok(ReconcileOutcome::NotFound);
        };
        match self.mutator.delete(
            ctx,
            Collection::User,
            user.id(),
            user.partition_key(),
            DeleteMode::Hard,
        ) {
            Ok(()) => Ok(ReconcileOutcome::Removed),
            Err(err) if err.is_not_found() => Ok(ReconcileOutcome::NotFound),
            Err(err) => Err(err),
        }
    }

    /// Emits the audit event for a reconcile operation.
    fn report(
        &self,
        operation: Operation,
        identity: &BootstrapIdentity,
        result: &Result<ReconcileOutcome, AccessError>,
    ) {
        let event = match result {
            Ok(outcome) => {
                AccessAuditEvent::new(Collection::User, operation, outcome.audit_outcome())
            }
            Err(err) => AccessAuditEvent::failure(Collection::User, operation, err),
        };
        self.audit.record(&event.with_record(identity.user_id.as_str()));
    }
}

/// Rejects identities that cannot address a record.
fn check_identity(identity: &BootstrapIdentity, operation: Operation) -> Result<(), AccessError> {
    if identity.user_id.trim().is_empty() {
        return Err(AccessError::InvalidRecord {
            context: ErrorContext::new(Collection::User, operation),
            message: "bootstrap identity requires a user id".to_string(),
        });
    }
    Ok(())
}
