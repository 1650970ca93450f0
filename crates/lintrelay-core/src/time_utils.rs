use chrono::{DateTime, Duration, Utc};

/// Returns the current Unix timestamp in milliseconds.
pub fn current_unix_timestamp_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis()
        .try_into()
        .unwrap_or(u64::MAX)
}

/// Parses an RFC 3339 timestamp into UTC, returning `None` for malformed input.
pub fn parse_rfc3339_utc(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw.trim())
        .ok()
        .map(|value| value.with_timezone(&Utc))
}

/// Returns true when `instant` falls strictly inside the `window` ending at `now`.
///
/// Instants in the future relative to `now` count as inside the window.
pub fn is_within_trailing_window(
    instant: DateTime<Utc>,
    now: DateTime<Utc>,
    window: Duration,
) -> bool {
    instant > now - window
}
