//! Shared timestamp and event-id helpers.

use chrono::{SecondsFormat, Utc};
use ulid::Ulid;

/// RFC 3339 UTC timestamp with second precision (e.g. `2026-10-16T09:30:00Z`).
pub fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Compact stamp used in cold-tier file names (e.g. `20261016_093000`).
pub fn history_stamp() -> String {
    Utc::now().format("%Y%m%d_%H%M%S").to_string()
}

pub fn new_event_id() -> String {
    Ulid::new().to_string()
}
