//! Timestamp helpers for the database layer.
//!
//! Audit columns (`created_at`, `updated_at`, run timestamps) are `INTEGER`
//! Unix epoch milliseconds (UTC).

use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};

/// Current time as Unix epoch milliseconds (UTC).
#[inline]
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

#[inline]
pub fn datetime_to_ms(dt: DateTime<Utc>) -> i64 {
    dt.timestamp_millis()
}

/// Convert Unix epoch milliseconds to `DateTime<Utc>`, clamping values
/// chrono cannot represent.
pub fn ms_to_datetime(ms: i64) -> DateTime<Utc> {
    match Utc.timestamp_millis_opt(ms) {
        chrono::LocalResult::Single(dt) => dt,
        chrono::LocalResult::Ambiguous(dt, _) => dt,
        chrono::LocalResult::None if ms.is_negative() => DateTime::<Utc>::MIN_UTC,
        chrono::LocalResult::None => DateTime::<Utc>::MAX_UTC,
    }
}

/// Retention cutoff: rows last updated strictly before this are stale.
pub fn retention_cutoff_ms(now: DateTime<Utc>, retention: Duration) -> i64 {
    let retention_ms = i64::try_from(retention.as_millis()).unwrap_or(i64::MAX);
    datetime_to_ms(now).saturating_sub(retention_ms)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_preserves_millis() {
        let ms = 1_700_000_000_123;
        assert_eq!(datetime_to_ms(ms_to_datetime(ms)), ms);
    }

    #[test]
    fn test_out_of_range_clamps() {
        assert_eq!(ms_to_datetime(i64::MAX), DateTime::<Utc>::MAX_UTC);
        assert_eq!(ms_to_datetime(i64::MIN), DateTime::<Utc>::MIN_UTC);
    }

    #[test]
    fn test_retention_cutoff() {
        let now = ms_to_datetime(10_000_000);
        assert_eq!(
            retention_cutoff_ms(now, Duration::from_secs(60)),
            10_000_000 - 60_000
        );
        assert_eq!(
            retention_cutoff_ms(now, Duration::MAX),
            10_000_000 - i64::MAX
        );
    }
}
