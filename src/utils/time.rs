//! Millisecond-epoch time helpers
//!
//! The data model (§3) timestamps everything in epoch milliseconds
//! (`grantedAtMs`, `expiresAtMs`, ...) rather than `DateTime<Utc>` directly,
//! since that is what crosses the wire to RPC callers. These helpers
//! convert at the boundary; internal comparisons use `chrono` directly.

use chrono::{DateTime, TimeZone, Utc};

/// Current time as milliseconds since the Unix epoch.
#[must_use]
pub fn unix_now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Convert epoch milliseconds to a `DateTime<Utc>`. Out-of-range values
/// clamp to the nearest representable instant rather than panicking.
#[must_use]
pub fn from_unix_ms(ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms).single().unwrap_or_else(|| {
        if ms < 0 {
            DateTime::<Utc>::MIN_UTC
        } else {
            DateTime::<Utc>::MAX_UTC
        }
    })
}

/// Convert a `DateTime<Utc>` to epoch milliseconds.
#[must_use]
pub fn to_unix_ms(dt: DateTime<Utc>) -> i64 {
    dt.timestamp_millis()
}
