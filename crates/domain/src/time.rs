//! Time and calendar-date helpers.

use chrono::{DateTime, NaiveDate, Utc};

/// UTC timestamp used for audit records.
pub type Timestamp = DateTime<Utc>;

/// Calendar date used for validity windows and registration periods.
pub type Date = NaiveDate;

/// Return the current UTC time.
#[must_use]
pub fn now() -> Timestamp {
    Utc::now()
}

/// Return today's date in UTC.
#[must_use]
pub fn today() -> Date {
    Utc::now().date_naive()
}

/// Format a date as ISO `YYYY-MM-DD`.
#[must_use]
pub fn format_date(date: Date) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Parse an ISO `YYYY-MM-DD` date.
///
/// # Errors
///
/// Returns [`chrono::ParseError`] when the input is not a valid date.
pub fn parse_date(value: &str) -> Result<Date, chrono::ParseError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_return_current_utc_time() {
        let before = Utc::now();
        let ts = now();
        let after = Utc::now();
        assert!(ts >= before);
        assert!(ts <= after);
    }

    #[test]
    fn should_roundtrip_iso_dates() {
        let date = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
        assert_eq!(format_date(date), "2024-02-29");
        assert_eq!(parse_date("2024-02-29").unwrap(), date);
    }

    #[test]
    fn should_order_iso_strings_like_dates() {
        let a = NaiveDate::from_ymd_opt(2024, 9, 30).unwrap();
        let b = NaiveDate::from_ymd_opt(2024, 10, 1).unwrap();
        assert!(format_date(a) < format_date(b));
    }
}
