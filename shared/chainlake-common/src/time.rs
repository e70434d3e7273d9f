//! Deterministic UTC bucket alignment.
//!
//! Base buckets are 4-hour windows aligned to UTC midnight; daily,
//! weekly (ISO, Monday start) and monthly buckets align to their
//! calendar boundaries. Alignment is a pure function of the timestamp,
//! which is what makes rollup recomputation reproducible.

use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, TimeZone, Timelike, Utc};

use crate::error::ChainlakeError;
use crate::types::Resolution;

/// Width of a base bucket in hours.
pub const BASE_BUCKET_HOURS: u32 = 4;

fn midnight(t: DateTime<Utc>) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(t.year(), t.month(), t.day(), 0, 0, 0)
        .single()
        .expect("UTC midnight is always unambiguous")
}

/// Start of the 4-hour base bucket containing `t`:
/// UTC midnight of the day plus `floor(hour / 4) * 4` hours.
pub fn base_bucket_start(t: DateTime<Utc>) -> DateTime<Utc> {
    let aligned_hour = (t.hour() / BASE_BUCKET_HOURS) * BASE_BUCKET_HOURS;
    midnight(t) + Duration::hours(aligned_hour as i64)
}

/// UTC midnight of the day containing `t`.
pub fn day_start(t: DateTime<Utc>) -> DateTime<Utc> {
    midnight(t)
}

/// Monday 00:00 UTC of the ISO week containing `t`.
pub fn week_start(t: DateTime<Utc>) -> DateTime<Utc> {
    let days_from_monday = t.weekday().num_days_from_monday() as i64;
    midnight(t) - Duration::days(days_from_monday)
}

/// First of the month, 00:00 UTC.
pub fn month_start(t: DateTime<Utc>) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(t.year(), t.month(), 1, 0, 0, 0)
        .single()
        .expect("first of month is always valid")
}

/// Align `t` down to the boundary of `resolution`.
pub fn align(resolution: Resolution, t: DateTime<Utc>) -> DateTime<Utc> {
    match resolution {
        Resolution::Base => base_bucket_start(t),
        Resolution::Daily => day_start(t),
        Resolution::Weekly => week_start(t),
        Resolution::Monthly => month_start(t),
    }
}

/// Exclusive end of the period starting at the aligned `period_start`.
pub fn period_end(
    resolution: Resolution,
    period_start: DateTime<Utc>,
) -> Result<DateTime<Utc>, ChainlakeError> {
    match resolution {
        Resolution::Base => Ok(period_start + Duration::hours(BASE_BUCKET_HOURS as i64)),
        Resolution::Daily => Ok(period_start + Duration::days(1)),
        Resolution::Weekly => Ok(period_start + Duration::days(7)),
        Resolution::Monthly => period_start
            .checked_add_months(Months::new(1))
            .ok_or_else(|| {
                ChainlakeError::Config(format!(
                    "unresolvable monthly bucket boundary after {}",
                    period_start
                ))
            }),
    }
}

/// Build a UTC timestamp from date parts, for fixtures and config.
pub fn utc_date(year: i32, month: u32, day: u32) -> Option<DateTime<Utc>> {
    NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    #[test]
    fn test_base_bucket_alignment() {
        assert_eq!(base_bucket_start(ts(2024, 3, 5, 0, 0)), ts(2024, 3, 5, 0, 0));
        assert_eq!(base_bucket_start(ts(2024, 3, 5, 3, 59)), ts(2024, 3, 5, 0, 0));
        assert_eq!(base_bucket_start(ts(2024, 3, 5, 4, 0)), ts(2024, 3, 5, 4, 0));
        assert_eq!(base_bucket_start(ts(2024, 3, 5, 11, 30)), ts(2024, 3, 5, 8, 0));
        assert_eq!(base_bucket_start(ts(2024, 3, 5, 23, 59)), ts(2024, 3, 5, 20, 0));
    }

    #[test]
    fn test_week_starts_on_monday() {
        // 2024-03-05 is a Tuesday; the ISO week starts 2024-03-04.
        assert_eq!(week_start(ts(2024, 3, 5, 15, 0)), ts(2024, 3, 4, 0, 0));
        // A Monday aligns to itself.
        assert_eq!(week_start(ts(2024, 3, 4, 0, 0)), ts(2024, 3, 4, 0, 0));
        // A Sunday aligns back six days.
        assert_eq!(week_start(ts(2024, 3, 10, 23, 0)), ts(2024, 3, 4, 0, 0));
    }

    #[test]
    fn test_month_alignment_and_end() {
        assert_eq!(month_start(ts(2024, 2, 29, 12, 0)), ts(2024, 2, 1, 0, 0));
        let end = period_end(Resolution::Monthly, ts(2024, 2, 1, 0, 0)).unwrap();
        assert_eq!(end, ts(2024, 3, 1, 0, 0));
        // December rolls into the next year.
        let end = period_end(Resolution::Monthly, ts(2024, 12, 1, 0, 0)).unwrap();
        assert_eq!(end, ts(2025, 1, 1, 0, 0));
    }

    #[test]
    fn test_period_ends() {
        assert_eq!(
            period_end(Resolution::Base, ts(2024, 3, 5, 20, 0)).unwrap(),
            ts(2024, 3, 6, 0, 0)
        );
        assert_eq!(
            period_end(Resolution::Daily, ts(2024, 3, 5, 0, 0)).unwrap(),
            ts(2024, 3, 6, 0, 0)
        );
        assert_eq!(
            period_end(Resolution::Weekly, ts(2024, 3, 4, 0, 0)).unwrap(),
            ts(2024, 3, 11, 0, 0)
        );
    }

    #[test]
    fn test_alignment_is_idempotent() {
        let t = ts(2024, 7, 19, 14, 42);
        for res in [
            Resolution::Base,
            Resolution::Daily,
            Resolution::Weekly,
            Resolution::Monthly,
        ] {
            let aligned = align(res, t);
            assert_eq!(align(res, aligned), aligned, "{:?}", res);
        }
    }
}
