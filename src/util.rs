use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::{Date, Month};

pub const DATE_FORMAT: &[BorrowedFormatItem<'_>] = format_description!("[year]-[month]-[day]");

pub fn format_date(date: Date) -> String {
    // The format is infallible for valid dates; fall back to Display just in case.
    date.format(DATE_FORMAT).unwrap_or_else(|_| date.to_string())
}

pub fn parse_date(raw: &str) -> Option<Date> {
    Date::parse(raw, DATE_FORMAT).ok()
}

/// First and last calendar day of a month, or None for an invalid month.
pub fn month_range(year: i32, month: u8) -> Option<(Date, Date)> {
    let month = Month::try_from(month).ok()?;
    let days = time::util::days_in_year_month(year, month);
    let start = Date::from_calendar_date(year, month, 1).ok()?;
    let end = Date::from_calendar_date(year, month, days).ok()?;
    Some((start, end))
}

/// First day of the month `months` before the given date's month.
pub fn months_back(date: Date, months: i32) -> Option<Date> {
    let total = date.year() * 12 + i32::from(u8::from(date.month())) - 1 - months;
    let year = total.div_euclid(12);
    let month = Month::try_from((total.rem_euclid(12) + 1) as u8).ok()?;
    Date::from_calendar_date(year, month, 1).ok()
}

/// Serde adapter for DATE columns rendered as `YYYY-MM-DD` in JSON and query strings.
pub mod date_fmt {
    use serde::{Deserialize, Deserializer, Serializer};
    use time::Date;

    use super::DATE_FORMAT;

    pub fn serialize<S: Serializer>(date: &Date, serializer: S) -> Result<S::Ok, S::Error> {
        let out = date.format(DATE_FORMAT).map_err(serde::ser::Error::custom)?;
        serializer.serialize_str(&out)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Date, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Date::parse(&raw, DATE_FORMAT).map_err(serde::de::Error::custom)
    }

    pub mod option {
        use serde::{Deserialize, Deserializer, Serializer};
        use time::Date;

        use super::DATE_FORMAT;

        pub fn serialize<S: Serializer>(
            date: &Option<Date>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match date {
                Some(date) => super::serialize(date, serializer),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<Date>, D::Error> {
            let raw = Option::<String>::deserialize(deserializer)?;
            match raw.as_deref() {
                None | Some("") => Ok(None),
                Some(raw) => Date::parse(raw, DATE_FORMAT)
                    .map(Some)
                    .map_err(serde::de::Error::custom),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    #[test]
    fn month_range_covers_whole_month() {
        let (start, end) = month_range(2026, 1).unwrap();
        assert_eq!(start, date!(2026 - 01 - 01));
        assert_eq!(end, date!(2026 - 01 - 31));
    }

    #[test]
    fn month_range_handles_short_months() {
        let (_, end) = month_range(2026, 2).unwrap();
        assert_eq!(end, date!(2026 - 02 - 28));
        let (_, end) = month_range(2028, 2).unwrap();
        assert_eq!(end, date!(2028 - 02 - 29));
    }

    #[test]
    fn month_range_rejects_invalid_month() {
        assert!(month_range(2026, 0).is_none());
        assert!(month_range(2026, 13).is_none());
    }

    #[test]
    fn months_back_crosses_year_boundaries() {
        assert_eq!(
            months_back(date!(2026 - 08 - 15), 5),
            Some(date!(2026 - 03 - 01))
        );
        assert_eq!(
            months_back(date!(2026 - 02 - 28), 3),
            Some(date!(2025 - 11 - 01))
        );
        assert_eq!(
            months_back(date!(2026 - 06 - 01), 0),
            Some(date!(2026 - 06 - 01))
        );
    }

    #[test]
    fn date_parse_format_roundtrip() {
        let d = parse_date("2026-01-05").unwrap();
        assert_eq!(format_date(d), "2026-01-05");
        assert!(parse_date("not-a-date").is_none());
    }
}
