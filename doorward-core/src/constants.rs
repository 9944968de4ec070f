//! Shared constants.
//!
//! Response bodies are part of the sensor firmware contract; change them only
//! together with the readers that parse them.

// ═══════════════════════════════════════════════════════════════════════════════
// RESPONSE BODIES
// ═══════════════════════════════════════════════════════════════════════════════

/// Plain-text body returned on a granted decision.
pub const ACCESS_GRANTED_BODY: &str = "Access granted";

/// Prefix of the greeting body, followed by the subject's display name.
pub const ACCESS_GRANTED_GREETING_PREFIX: &str = "Access Granted#";

/// Plain-text body returned when no schedule matches.
pub const NO_MATCHING_SCHEDULE_BODY: &str = "No matching schedule found";

/// Plain-text body returned after clearing the whole cache.
pub const CACHE_CLEARED_BODY: &str = "Cache cleared";

// ═══════════════════════════════════════════════════════════════════════════════
// DECISION REASONS
// ═══════════════════════════════════════════════════════════════════════════════

/// Reason attached to denied decisions and their audit records.
pub const REASON_NO_MATCHING_SCHEDULE: &str = "no matching schedule";

/// Reason attached to granted decisions (empty, as stored in the audit table).
pub const REASON_GRANTED: &str = "";

// ═══════════════════════════════════════════════════════════════════════════════
// TIME FORMATS
// ═══════════════════════════════════════════════════════════════════════════════

/// Time-of-day format used by schedule windows (`HH:MM`).
pub const TIME_OF_DAY_FORMAT: &str = "%H:%M";

/// Time-of-day format with seconds, accepted on input.
pub const TIME_OF_DAY_SECONDS_FORMAT: &str = "%H:%M:%S";

/// Calendar date format used by suspensions (`YYYY-MM-DD`).
pub const DATE_FORMAT: &str = "%Y-%m-%d";

// ═══════════════════════════════════════════════════════════════════════════════
// SERVER DEFAULTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Default listening port.
pub const DEFAULT_PORT: u16 = 8080;

/// Default per-request timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 3;

/// Default grace period for draining background audit work on shutdown.
pub const DEFAULT_SHUTDOWN_GRACE_SECS: u64 = 5;

/// Maximum accepted request body size in bytes.
pub const MAX_REQUEST_BODY_BYTES: usize = 64 * 1024;
