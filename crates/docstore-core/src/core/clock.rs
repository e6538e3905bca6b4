// crates/docstore-core/src/core/clock.rs
// ============================================================================
// Module: Docstore Clock
// Description: Clock abstraction and timestamp helpers for record lifecycles.
// Purpose: Keep wall-clock reads behind an injectable handle.
// Dependencies: time
// ============================================================================

//! ## Overview
//! Record timestamps (`created_at`, `updated_at`, `deleted_at`) are RFC 3339
//! values. The access layer never reads wall-clock time directly; mutators and
//! reconcilers receive a [`Clock`] so tests can pin time.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Mutex;
use std::time::Duration;

use time::OffsetDateTime;

// ============================================================================
// SECTION: Clock
// ============================================================================

/// Source of the current time for record timestamps.
pub trait Clock: Send + Sync {
    /// Returns the current time in UTC.
    fn now(&self) -> OffsetDateTime;
}

/// Wall-clock time source.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

/// Manually driven clock for tests and replays.
///
/// # Invariants
/// - Time only moves when [`FixedClock::set`] or [`FixedClock::advance`] is called.
#[derive(Debug)]
pub struct FixedClock {
    /// Current instant.
    now: Mutex<OffsetDateTime>,
}

impl FixedClock {
    /// Creates a clock pinned at `now`.
    #[must_use]
    pub const fn new(now: OffsetDateTime) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    /// Creates a clock pinned at the given unix timestamp in seconds.
    #[must_use]
    pub fn at_unix_seconds(seconds: i64) -> Self {
        let now = OffsetDateTime::from_unix_timestamp(seconds).unwrap_or(OffsetDateTime::UNIX_EPOCH);
        Self::new(now)
    }

    /// Moves the clock to `now`.
    pub fn set(&self, now: OffsetDateTime) {
        if let Ok(mut guard) = self.now.lock() {
            *guard = now;
        }
    }

    /// Moves the clock forward by `delta`.
    pub fn advance(&self, delta: Duration) {
        if let Ok(mut guard) = self.now.lock() {
            *guard = guard.saturating_add(time::Duration::try_from(delta).unwrap_or(time::Duration::MAX));
        }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> OffsetDateTime {
        self.now.lock().map_or(OffsetDateTime::UNIX_EPOCH, |guard| *guard)
    }
}
