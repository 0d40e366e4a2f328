//! Time utilities for AgenticVault.
//!
//! Fact and key timestamps are RFC 3339 strings in UTC.

use std::time::SystemTime;

/// Return the current time as an RFC 3339 string with microsecond precision.
pub fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}

/// Convert a filesystem timestamp to an RFC 3339 string.
pub fn system_time_to_rfc3339(time: SystemTime) -> String {
    let dt: chrono::DateTime<chrono::Utc> = time.into();
    dt.to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}
