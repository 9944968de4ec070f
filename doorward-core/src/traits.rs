//! Common traits for Doorward.
//!
//! These traits are the seams between the decision engine and its
//! collaborators, so stores, audit sinks and clocks can be swapped for tests.

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Local, NaiveDateTime};
use parking_lot::Mutex;

use crate::error::Result;
use crate::types::{AuditRecord, GrantMatch, GrantQuery, Identity};

// ═══════════════════════════════════════════════════════════════════════════════
// SCHEDULE GATEWAY TRAIT
// ═══════════════════════════════════════════════════════════════════════════════

/// Read-only access to the schedule store.
///
/// Implementations might use:
/// - In-memory storage (for testing/development)
/// - libSQL/Turso (for production)
#[async_trait]
pub trait ScheduleGateway: Send + Sync {
    /// Finds the first row authorizing `query.key` at `query.sensor_id` at `query.at`.
    ///
    /// Returns `Ok(None)` when nothing matches; `Err` only for store failures.
    /// When several rows match, the lowest schedule id wins.
    async fn find_grant(&self, query: &GrantQuery) -> Result<Option<GrantMatch>>;

    /// Finds who owns `key` and which room `sensor_id` guards, ignoring
    /// schedules, time windows and suspensions.
    async fn find_identity(&self, sensor_id: &str, key: &str) -> Result<Option<Identity>>;
}

// ═══════════════════════════════════════════════════════════════════════════════
// AUDIT SINK TRAIT
// ═══════════════════════════════════════════════════════════════════════════════

/// Durable, append-only destination for audit records.
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Appends one record. Fails with `DoorwardError::Persistence`.
    async fn record(&self, record: AuditRecord) -> Result<()>;
}

// ═══════════════════════════════════════════════════════════════════════════════
// NOTIFIER TRAIT
// ═══════════════════════════════════════════════════════════════════════════════

/// Post-decision notification hook (e.g. a push topic per room).
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Notifies subscribers of the matched room about a granted entry.
    async fn notify(&self, grant: &GrantMatch) -> Result<()>;
}

// ═══════════════════════════════════════════════════════════════════════════════
// CLOCK TRAIT
// ═══════════════════════════════════════════════════════════════════════════════

/// Source of the local wall-clock time schedules are evaluated against.
pub trait Clock: Send + Sync {
    /// Current local date and time.
    fn now(&self) -> NaiveDateTime;
}

/// The host's local clock.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// A clock frozen at a settable instant.
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<NaiveDateTime>,
}

impl FixedClock {
    /// Creates a clock frozen at `now`.
    pub fn new(now: NaiveDateTime) -> Self {
        Self { now: Mutex::new(now) }
    }

    /// Moves the clock to `now`.
    pub fn set(&self, now: NaiveDateTime) {
        *self.now.lock() = now;
    }

    /// Moves the clock forward by `by`.
    pub fn advance(&self, by: ChronoDuration) {
        let mut now = self.now.lock();
        *now += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        *self.now.lock()
    }
}
