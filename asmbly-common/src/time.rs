//! Calendar date utilities
//!
//! All membership logic works on calendar dates in the organization's local
//! time zone; time of day never matters.

use chrono::{Duration, Local, NaiveDate};

/// Today's date in local time
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// The reporting anchor for a run happening on `run_date`: the day before.
pub fn reporting_date(run_date: NaiveDate) -> NaiveDate {
    run_date - Duration::days(1)
}

/// Whole days from `earlier` to `later` (negative when `later` comes first)
pub fn days_between(earlier: NaiveDate, later: NaiveDate) -> i64 {
    (later - earlier).num_days()
}

/// Parse an ISO `YYYY-MM-DD` date
pub fn parse_iso_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok()
}

/// Parse a US-style `MM/DD/YYYY` date (used by CRM custom fields)
pub fn parse_us_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%m/%d/%Y").ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_reporting_date_is_previous_day() {
        assert_eq!(reporting_date(date(2024, 3, 6)), date(2024, 3, 5));
    }

    #[test]
    fn test_reporting_date_crosses_year_boundary() {
        assert_eq!(reporting_date(date(2024, 1, 1)), date(2023, 12, 31));
    }

    #[test]
    fn test_days_between_signed() {
        assert_eq!(days_between(date(2024, 1, 31), date(2024, 2, 2)), 2);
        assert_eq!(days_between(date(2024, 2, 2), date(2024, 1, 31)), -2);
        assert_eq!(days_between(date(2024, 2, 2), date(2024, 2, 2)), 0);
    }

    #[test]
    fn test_days_between_leap_february() {
        assert_eq!(days_between(date(2024, 2, 28), date(2024, 3, 1)), 2);
        assert_eq!(days_between(date(2023, 2, 28), date(2023, 3, 1)), 1);
    }

    #[test]
    fn test_parse_iso_date() {
        assert_eq!(parse_iso_date("2024-03-05"), Some(date(2024, 3, 5)));
        assert_eq!(parse_iso_date(" 2024-03-05 "), Some(date(2024, 3, 5)));
        assert_eq!(parse_iso_date("03/05/2024"), None);
        assert_eq!(parse_iso_date("2024-02-30"), None);
    }

    #[test]
    fn test_parse_us_date() {
        assert_eq!(parse_us_date("03/05/2024"), Some(date(2024, 3, 5)));
        assert_eq!(parse_us_date("2024-03-05"), None);
    }
}
