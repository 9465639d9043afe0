use chrono::{DateTime, FixedOffset, Local, NaiveDateTime, TimeZone};
use regex::Regex;
use thiserror::Error;

/// First bracketed token on a line, e.g. `[2024-01-01T00:00:00+09:00]`.
pub const BRACKETED_PATTERN: &str = r"\[(?P<ts>[^\[\]]*)\]";

/// Formats carrying an explicit offset, tried after RFC 3339.
const OFFSET_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%d %H:%M:%S%.f %:z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M:%S%.f %z",
    "%Y/%m/%d %H:%M:%S%.f %:z",
];

/// Offset-less formats, interpreted in the local time zone.
const LOCAL_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y/%m/%d %H:%M:%S%.f",
];

#[derive(Debug, Error)]
pub enum TimestampError {
    #[error("regex compilation failed: {0}")]
    InvalidRegex(#[from] regex::Error),

    #[error("pattern missing 'ts' capture group")]
    MissingTsGroup,

    #[error("failed to parse timestamp '{value}'")]
    ParseError { value: String },
}

/// A line split into its embedded timestamp and the remaining text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StampedLine {
    pub timestamp: DateTime<FixedOffset>,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct TimestampExtractor {
    pattern: Regex,
}

impl TimestampExtractor {
    /// Create an extractor from a pattern with a named `ts` capture group.
    /// The whole match is removed from the line when a record is emitted.
    pub fn new(pattern: &str) -> Result<Self, TimestampError> {
        let regex = Regex::new(pattern)?;

        if regex.capture_names().all(|name| name != Some("ts")) {
            return Err(TimestampError::MissingTsGroup);
        }

        Ok(Self { pattern: regex })
    }

    /// Extractor for the `[<timestamp>] message` layout written by the
    /// monitored products.
    pub fn bracketed() -> Self {
        Self::new(BRACKETED_PATTERN).expect("bracketed timestamp pattern is valid")
    }

    /// Returns `Ok(None)` when the line carries no bracketed token at all.
    pub fn extract(&self, line: &str) -> Result<Option<StampedLine>, TimestampError> {
        let Some(captures) = self.pattern.captures(line) else {
            return Ok(None);
        };

        let (Some(whole), Some(ts)) = (captures.get(0), captures.name("ts")) else {
            return Ok(None);
        };
        let ts_value = ts.as_str();

        let timestamp = parse_timestamp(ts_value)?;

        let mut message = String::with_capacity(line.len() - whole.len());
        message.push_str(&line[..whole.start()]);
        message.push_str(&line[whole.end()..]);

        Ok(Some(StampedLine {
            timestamp,
            message: message.trim().to_string(),
        }))
    }
}

/// Parse a timestamp that either carries an offset or is taken as local time.
pub fn parse_timestamp(value: &str) -> Result<DateTime<FixedOffset>, TimestampError> {
    let value = value.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt);
    }

    for format in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(value, format) {
            return Ok(dt);
        }
    }

    for format in LOCAL_FORMATS {
        if let Ok(ndt) = NaiveDateTime::parse_from_str(value, format) {
            if let Some(local) = Local.from_local_datetime(&ndt).earliest() {
                return Ok(local.fixed_offset());
            }
        }
    }

    Err(TimestampError::ParseError {
        value: value.to_string(),
    })
}

/// Half-open window test: `start < t <= end`.
pub fn is_between<Tz: TimeZone>(t: &DateTime<Tz>, start: &DateTime<Tz>, end: &DateTime<Tz>) -> bool {
    start < t && t <= end
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(value: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(value).unwrap()
    }

    #[test]
    fn test_bracketed_rfc3339() {
        let extractor = TimestampExtractor::bracketed();

        let line = extractor
            .extract("[2024-01-01T00:00:00+00:00] hello world")
            .unwrap()
            .unwrap();

        assert_eq!(line.timestamp, ts("2024-01-01T00:00:00+00:00"));
        assert_eq!(line.message, "hello world");
    }

    #[test]
    fn test_offset_is_preserved() {
        let extractor = TimestampExtractor::bracketed();

        let line = extractor
            .extract("[2025-12-04 02:42:11.011 +09:00]   camera connected  ")
            .unwrap()
            .unwrap();

        assert_eq!(line.timestamp.offset().local_minus_utc(), 9 * 3600);
        assert_eq!(line.timestamp, ts("2025-12-03T17:42:11.011+00:00"));
        assert_eq!(line.message, "camera connected");
    }

    #[test]
    fn test_token_in_middle_is_removed() {
        let extractor = TimestampExtractor::bracketed();

        let line = extractor
            .extract("INFO [2024-05-05T10:00:00Z] started")
            .unwrap()
            .unwrap();

        assert_eq!(line.message, "INFO  started");
    }

    #[test]
    fn test_no_bracket_returns_none() {
        let extractor = TimestampExtractor::bracketed();
        assert!(extractor.extract("plain line").unwrap().is_none());
    }

    #[test]
    fn test_non_timestamp_bracket_is_parse_error() {
        let extractor = TimestampExtractor::bracketed();

        let result = extractor.extract("[INFO] something happened");

        assert!(matches!(result, Err(TimestampError::ParseError { .. })));
    }

    #[test]
    fn test_naive_timestamp_is_local() {
        let parsed = parse_timestamp("2024-03-01 12:30:00").unwrap();
        let expected = Local
            .from_local_datetime(
                &NaiveDateTime::parse_from_str("2024-03-01 12:30:00", "%Y-%m-%d %H:%M:%S").unwrap(),
            )
            .earliest()
            .unwrap();
        assert_eq!(parsed, expected.fixed_offset());
    }

    #[test]
    fn test_missing_ts_group_error() {
        let result = TimestampExtractor::new(r"\[(.*?)\]");
        assert!(matches!(result, Err(TimestampError::MissingTsGroup)));
    }

    #[test]
    fn test_invalid_regex() {
        let result = TimestampExtractor::new(r"(?P<ts>[invalid");
        assert!(matches!(result, Err(TimestampError::InvalidRegex(_))));
    }

    #[test]
    fn test_is_between_excludes_start_includes_end() {
        let start = ts("2024-01-01T00:00:00Z");
        let end = ts("2024-01-02T00:00:00Z");

        assert!(!is_between(&start, &start, &end));
        assert!(is_between(&end, &start, &end));
        assert!(is_between(&ts("2024-01-01T12:00:00Z"), &start, &end));
        assert!(!is_between(&ts("2023-12-31T23:59:59Z"), &start, &end));
        assert!(!is_between(&ts("2024-01-02T00:00:01Z"), &start, &end));
    }

    #[test]
    fn test_is_between_compares_instants_across_offsets() {
        let start = ts("2024-01-01T00:00:00+00:00");
        let end = ts("2024-01-01T09:00:00+09:00");

        // `end` is the same instant as `start`, so the window is empty.
        assert!(!is_between(&ts("2024-01-01T00:00:00Z"), &start, &end));
        assert!(is_between(&ts("2024-01-01T08:59:59+09:00"), &ts("2023-12-31T00:00:00Z"), &end));
    }
}
