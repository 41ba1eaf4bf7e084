//! Timestamps exchanged with the server.
//!
//! Measurement times are local wall-clock values without timezone. The fixed
//! UTC offset is only appended when a request is encoded.

use chrono::{Duration, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};

use crate::errors::{Result, SosError};

const ISO8601_NO_TZ: &str = "%Y-%m-%dT%H:%M:%S";

/// Offset appended to request timestamps unless configured otherwise (JST).
pub const DEFAULT_UTC_OFFSET_SECS: i32 = 9 * 3600;

pub fn default_utc_offset() -> FixedOffset {
    FixedOffset::east_opt(DEFAULT_UTC_OFFSET_SECS).expect("+09:00 is a valid UTC offset")
}

/// Reads `+09:00`, `+0900`, `-05:30` or `Z`.
pub fn parse_utc_offset(text: &str) -> Option<FixedOffset> {
    let text = text.trim();
    if text == "Z" || text == "z" {
        return FixedOffset::east_opt(0);
    }
    let (sign, rest) = match text.chars().next()? {
        '+' => (1, &text[1..]),
        '-' => (-1, &text[1..]),
        _ => (1, text),
    };
    let digits: String = rest.chars().filter(|c| *c != ':').collect();
    if digits.len() != 4 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let hours: i32 = digits[..2].parse().ok()?;
    let minutes: i32 = digits[2..].parse().ok()?;
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

/// Temporal filter of GetObservation and GetResult.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeRange {
    /// `fes:During` between two instants, start strictly before end.
    Between(NaiveDateTime, NaiveDateTime),
    /// `fes:TEquals` on one instant.
    At(NaiveDateTime),
    /// `fes:TEquals` with the `last` position: most recent value.
    Latest,
}

impl TimeRange {
    pub fn between(start: NaiveDateTime, end: NaiveDateTime) -> Result<Self> {
        if start >= end {
            return Err(SosError::invalid_time_range(&format!(
                "start {start} must be before end {end}"
            )));
        }
        Ok(TimeRange::Between(start, end))
    }

    /// Checks a range that may have been built without [`TimeRange::between`].
    pub fn validate(&self) -> Result<()> {
        match self {
            TimeRange::Between(start, end) => Self::between(*start, *end).map(|_| ()),
            TimeRange::At(_) | TimeRange::Latest => Ok(()),
        }
    }

    /// The `minutes` preceding `end`.
    pub fn last_minutes(end: NaiveDateTime, minutes: i64) -> Result<Self> {
        Self::between(end - Duration::minutes(minutes), end)
    }
}

/// `2017-01-01T00:00:00+0900` style encoding.
pub fn encode_timestamp(time: &NaiveDateTime, offset: &FixedOffset) -> String {
    let secs = offset.local_minus_utc();
    let sign = if secs < 0 { '-' } else { '+' };
    let secs = secs.abs();
    format!(
        "{}{}{:02}{:02}",
        time.format(ISO8601_NO_TZ),
        sign,
        secs / 3600,
        (secs % 3600) / 60
    )
}

/// Reads a server timestamp, ignoring a `+hh:mm` or `Z` offset and any
/// fraction. Negative offsets such as `-05:00` are not recognised.
pub fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    let text = text.split('+').next().unwrap_or(text);
    let text = text.trim_end_matches('Z');
    let text = text.split('.').next().unwrap_or(text);
    NaiveDateTime::parse_from_str(text, ISO8601_NO_TZ).ok()
}

const DATETIME_LITERALS: &[&str] = &[
    "%Y%m%d%H%M%S",
    "%Y%m%d%H%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
];

const TIME_LITERALS: &[&str] = &["%H:%M:%S", "%H:%M", "%H%M"];

/// Parses a user-typed time literal. Time-only forms take the date of `now`.
pub fn parse_time_literal(text: &str, now: NaiveDateTime) -> Result<NaiveDateTime> {
    for format in DATETIME_LITERALS {
        if let Ok(time) = NaiveDateTime::parse_from_str(text, format) {
            return Ok(time);
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return Ok(date.and_time(NaiveTime::MIN));
    }
    for format in TIME_LITERALS {
        if let Ok(time) = NaiveTime::parse_from_str(text, format) {
            return Ok(now.date().and_time(time));
        }
    }
    Err(SosError::invalid_time_range(&format!(
        "cannot read '{text}' as a date/time, use e.g. 2016-10-26T00:00:00"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, mo, d)
            .unwrap()
            .and_hms_opt(h, mi, s)
            .unwrap()
    }

    #[test]
    fn encodes_with_fixed_offset() {
        let time = at(2017, 1, 2, 3, 4, 5);
        assert_eq!(
            encode_timestamp(&time, &default_utc_offset()),
            "2017-01-02T03:04:05+0900"
        );
        let west = FixedOffset::west_opt(5 * 3600 + 30 * 60).unwrap();
        assert_eq!(encode_timestamp(&time, &west), "2017-01-02T03:04:05-0530");
    }

    #[test]
    fn parses_configured_offsets() {
        assert_eq!(parse_utc_offset("+09:00"), Some(default_utc_offset()));
        assert_eq!(parse_utc_offset("+0900"), Some(default_utc_offset()));
        assert_eq!(
            parse_utc_offset("-05:30"),
            FixedOffset::west_opt(5 * 3600 + 30 * 60)
        );
        assert_eq!(parse_utc_offset("Z"), FixedOffset::east_opt(0));
        assert_eq!(parse_utc_offset("nine"), None);
        assert_eq!(parse_utc_offset(""), None);
    }

    #[test]
    fn parses_server_timestamps() {
        let expected = Some(at(2017, 1, 1, 0, 5, 0));
        assert_eq!(parse_timestamp("2017-01-01T00:05:00+09:00"), expected);
        assert_eq!(parse_timestamp("2017-01-01T00:05:00"), expected);
        assert_eq!(parse_timestamp(" 2017-01-01T00:05:00Z "), expected);
        assert_eq!(parse_timestamp("2017-01-01T00:05:00.000+0900"), expected);
        assert_eq!(parse_timestamp("yesterday"), None);
        assert_eq!(parse_timestamp("2017-01-01T00:05:00-05:00"), None);
    }

    #[test]
    fn between_rejects_inverted_ranges() {
        let start = at(2017, 1, 1, 0, 0, 0);
        let end = at(2017, 1, 1, 0, 10, 0);
        assert!(TimeRange::between(start, end).is_ok());
        assert!(matches!(
            TimeRange::between(end, start),
            Err(SosError::InvalidTimeRange(_))
        ));
        assert!(TimeRange::between(start, start).is_err());
        assert!(TimeRange::Between(end, start).validate().is_err());
        assert!(TimeRange::Between(start, end).validate().is_ok());
        assert!(TimeRange::Latest.validate().is_ok());
        assert_eq!(
            TimeRange::last_minutes(end, 10).unwrap(),
            TimeRange::Between(start, end)
        );
    }

    #[test]
    fn reads_shell_literals() {
        let now = at(2020, 5, 6, 12, 0, 0);
        assert_eq!(
            parse_time_literal("20161026123456", now).unwrap(),
            at(2016, 10, 26, 12, 34, 56)
        );
        assert_eq!(
            parse_time_literal("201610261234", now).unwrap(),
            at(2016, 10, 26, 12, 34, 0)
        );
        assert_eq!(
            parse_time_literal("2016-10-26T01:02:03", now).unwrap(),
            at(2016, 10, 26, 1, 2, 3)
        );
        assert_eq!(
            parse_time_literal("2016-10-26T01:02", now).unwrap(),
            at(2016, 10, 26, 1, 2, 0)
        );
        assert_eq!(
            parse_time_literal("2016-10-26", now).unwrap(),
            at(2016, 10, 26, 0, 0, 0)
        );
        assert_eq!(
            parse_time_literal("08:15:30", now).unwrap(),
            at(2020, 5, 6, 8, 15, 30)
        );
        assert_eq!(
            parse_time_literal("0815", now).unwrap(),
            at(2020, 5, 6, 8, 15, 0)
        );
        assert!(parse_time_literal("soon", now).is_err());
    }
}
