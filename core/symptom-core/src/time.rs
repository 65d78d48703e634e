//! Timestamp helpers: epoch milliseconds, day keys, ISO stamps.
//!
//! Every event and record carries an epoch-millisecond timestamp. Day keys
//! bucket those timestamps by the local calendar date.

use chrono::{DateTime, Local, SecondsFormat, TimeZone, Utc};

pub const MS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

/// Current time as epoch milliseconds.
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Converts epoch milliseconds to a UTC datetime, clamping unrepresentable
/// values to the epoch.
pub fn from_ms(ms: i64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp_millis(ms).unwrap_or_default()
}

/// `YYYY-MM-DD` of the local calendar date at `ms`.
pub fn day_key(ms: i64) -> String {
    day_key_in(ms, &Local)
}

/// `YYYY-MM-DD` of the calendar date at `ms` in the given timezone.
pub fn day_key_in<Tz: TimeZone>(ms: i64, tz: &Tz) -> String
where
    Tz::Offset: std::fmt::Display,
{
    from_ms(ms).with_timezone(tz).format("%Y-%m-%d").to_string()
}

/// ISO-8601 UTC timestamp with millisecond precision and a `Z` suffix.
pub fn iso_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;

    // 2026-01-30T23:30:00Z
    const LATE_EVENING_UTC: i64 = 1_769_815_800_000;

    #[test]
    fn day_key_uses_calendar_date_of_timezone() {
        let utc = FixedOffset::east_opt(0).unwrap();
        let tokyo = FixedOffset::east_opt(9 * 3600).unwrap();
        let new_york = FixedOffset::west_opt(5 * 3600).unwrap();

        assert_eq!(day_key_in(LATE_EVENING_UTC, &utc), "2026-01-30");
        assert_eq!(day_key_in(LATE_EVENING_UTC, &tokyo), "2026-01-31");
        assert_eq!(day_key_in(LATE_EVENING_UTC, &new_york), "2026-01-30");
    }

    #[test]
    fn day_key_zero_pads_month_and_day() {
        let utc = FixedOffset::east_opt(0).unwrap();
        // 2026-03-04T12:00:00Z
        assert_eq!(day_key_in(1_772_625_600_000, &utc), "2026-03-04");
    }

    #[test]
    fn iso_timestamp_has_millis_and_z_suffix() {
        let at = from_ms(LATE_EVENING_UTC + 42);
        assert_eq!(iso_timestamp(at), "2026-01-30T23:30:00.042Z");
    }
}
