//! Daily release window arithmetic

use chrono::{DateTime, Duration, NaiveTime, Utc};

/// Parse a `HH:MM` window start.
pub fn parse_window(window: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(window, "%H:%M").ok()
}

/// Seconds from `now` until the next daily window opening at `window` (UTC).
///
/// A window that has already opened today rolls over to tomorrow; exactly on the
/// window returns 0.
pub fn seconds_until_next_window(now: DateTime<Utc>, window: NaiveTime) -> i64 {
    let today = now.date_naive().and_time(window).and_utc();
    let next = if now > today {
        today + Duration::days(1)
    } else {
        today
    };
    (next - now).num_seconds()
}
