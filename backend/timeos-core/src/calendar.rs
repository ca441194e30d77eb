// src/calendar.rs
use chrono::{DateTime, Datelike, NaiveDate, Utc};

pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Returns `(week, year)` of the ISO-8601 week containing `date`.
pub fn iso_week(date: NaiveDate) -> (u32, i32) {
    let week = date.iso_week();
    (week.week(), week.year())
}

pub fn current_iso_week() -> (u32, i32) {
    iso_week(Utc::now().date_naive())
}

/// Parses `YYYY-MM-DD`, tolerating a trailing time component.
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    value
        .get(..10)
        .and_then(|day| NaiveDate::parse_from_str(day, DATE_FORMAT).ok())
}

/// Midnight UTC of the given date string.
pub fn parse_date_utc(value: &str) -> Option<DateTime<Utc>> {
    parse_date(value)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

pub fn today() -> String {
    format_date(Utc::now().date_naive())
}

pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

#[cfg(test)]
mod calendar_tests {
    use super::*;

    #[test]
    fn test_iso_week_mid_year() {
        let date = NaiveDate::from_ymd_opt(2026, 2, 18).unwrap();
        assert_eq!(iso_week(date), (8, 2026));
    }

    #[test]
    fn test_iso_week_year_boundaries() {
        // Friday 1 Jan 2021 still belongs to week 53 of 2020.
        let date = NaiveDate::from_ymd_opt(2021, 1, 1).unwrap();
        assert_eq!(iso_week(date), (53, 2020));

        let date = NaiveDate::from_ymd_opt(2024, 12, 30).unwrap();
        assert_eq!(iso_week(date), (1, 2025));
    }

    #[test]
    fn test_parse_date_accepts_timestamps() {
        let expected = NaiveDate::from_ymd_opt(2026, 3, 1);
        assert_eq!(parse_date("2026-03-01"), expected);
        assert_eq!(parse_date("2026-03-01T12:30:00Z"), expected);
        assert_eq!(parse_date("03/01/2026"), None);
        assert_eq!(parse_date("2026"), None);
    }
}
