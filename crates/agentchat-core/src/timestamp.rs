//! Display normalization for backend timestamps.
//!
//! Backends report times as epoch seconds, epoch milliseconds or ISO-8601
//! strings. Everything is funnelled into [`DisplayTimestamp`], which never
//! fails: unreadable input becomes [`DisplayTimestamp::Unknown`].

use std::fmt;

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Numbers above this magnitude are read as epoch milliseconds.
const MILLIS_THRESHOLD: f64 = 1e12;

const DISPLAY_FORMAT: &str = "%d/%m %H:%M";

const NAIVE_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"];

/// A timestamp exactly as the backend sent it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawTimestamp {
    Number(f64),
    Text(String),
    Other(serde_json::Value),
}

/// A normalized, displayable instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DisplayTimestamp {
    Unknown,
    At(DateTime<FixedOffset>),
}

impl DisplayTimestamp {
    pub fn instant(&self) -> Option<DateTime<FixedOffset>> {
        match self {
            DisplayTimestamp::At(dt) => Some(*dt),
            DisplayTimestamp::Unknown => None,
        }
    }
}

impl fmt::Display for DisplayTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisplayTimestamp::At(dt) => write!(f, "{}", dt.format(DISPLAY_FORMAT)),
            DisplayTimestamp::Unknown => f.write_str("Unknown"),
        }
    }
}

pub fn normalize(raw: &RawTimestamp) -> DisplayTimestamp {
    let parsed = match raw {
        RawTimestamp::Number(value) => from_epoch(*value),
        RawTimestamp::Text(text) => from_iso(text),
        RawTimestamp::Other(serde_json::Value::Number(n)) => n.as_f64().and_then(from_epoch),
        RawTimestamp::Other(_) => None,
    };
    parsed.map_or(DisplayTimestamp::Unknown, DisplayTimestamp::At)
}

/// Normalize an optional raw timestamp; a missing one is `Unknown`.
pub fn normalize_opt(raw: Option<&RawTimestamp>) -> DisplayTimestamp {
    raw.map_or(DisplayTimestamp::Unknown, normalize)
}

fn from_epoch(value: f64) -> Option<DateTime<FixedOffset>> {
    if !value.is_finite() {
        return None;
    }
    let secs = if value.abs() > MILLIS_THRESHOLD {
        value / 1000.0
    } else {
        value
    };
    let whole = secs.floor();
    if whole < i64::MIN as f64 || whole > i64::MAX as f64 {
        return None;
    }
    let nanos = ((secs - whole) * 1e9) as u32;
    DateTime::<Utc>::from_timestamp(whole as i64, nanos.min(999_999_999)).map(|dt| dt.fixed_offset())
}

fn from_iso(text: &str) -> Option<DateTime<FixedOffset>> {
    let trimmed = text.trim();
    let normalized = match trimmed.strip_suffix('Z') {
        Some(head) => format!("{}+00:00", head),
        None => trimmed.to_string(),
    };
    if let Ok(dt) = DateTime::parse_from_rfc3339(&normalized) {
        return Some(dt);
    }
    if let Ok(dt) = DateTime::parse_from_str(&normalized, "%Y-%m-%d %H:%M:%S%.f%:z") {
        return Some(dt);
    }
    NAIVE_FORMATS.iter().find_map(|format| {
        NaiveDateTime::parse_from_str(&normalized, format)
            .ok()
            .map(|naive| Utc.from_utc_datetime(&naive).fixed_offset())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn number(value: f64) -> RawTimestamp {
        RawTimestamp::Number(value)
    }

    fn text(value: &str) -> RawTimestamp {
        RawTimestamp::Text(value.to_string())
    }

    mod numeric {
        use super::*;

        #[test]
        fn epoch_seconds() {
            // 2024-03-05T14:07:00Z
            assert_eq!(normalize(&number(1_709_647_620.0)).to_string(), "05/03 14:07");
        }

        #[test]
        fn fractional_seconds_are_accepted() {
            assert_eq!(normalize(&number(1_709_647_620.75)).to_string(), "05/03 14:07");
        }

        #[test]
        fn milliseconds_match_seconds() {
            for ms in [1_709_647_620_123.0, 1_000_000_000_001.0, 1_999_999_999_999.0] {
                assert_eq!(normalize(&number(ms)), normalize(&number(ms / 1000.0)));
                assert_eq!(
                    normalize(&number(ms)).to_string(),
                    normalize(&number((ms / 1000.0).floor())).to_string()
                );
            }
        }

        #[test]
        fn zero_is_the_epoch() {
            assert_eq!(normalize(&number(0.0)).to_string(), "01/01 00:00");
        }

        #[test]
        fn non_finite_is_unknown() {
            assert_eq!(normalize(&number(f64::NAN)), DisplayTimestamp::Unknown);
            assert_eq!(normalize(&number(f64::INFINITY)), DisplayTimestamp::Unknown);
        }

        #[test]
        fn out_of_range_is_unknown() {
            assert_eq!(normalize(&number(1e300)), DisplayTimestamp::Unknown);
        }
    }

    mod strings {
        use super::*;

        #[test]
        fn trailing_z_is_utc() {
            assert_eq!(normalize(&text("2024-03-05T14:07:09Z")).to_string(), "05/03 14:07");
        }

        #[test]
        fn explicit_offset_is_kept() {
            let ts = normalize(&text("2024-03-05T14:07:09+02:00"));
            assert_eq!(ts.to_string(), "05/03 14:07");
            assert_eq!(ts.instant().unwrap().offset().local_minus_utc(), 7200);
        }

        #[test]
        fn fractional_seconds_with_offset() {
            assert_eq!(
                normalize(&text("2024-12-31T23:59:59.123456+00:00")).to_string(),
                "31/12 23:59"
            );
        }

        #[test]
        fn naive_datetime_is_read_as_utc() {
            assert_eq!(normalize(&text("2024-03-05T14:07:09")).to_string(), "05/03 14:07");
            assert_eq!(normalize(&text("2024-03-05 14:07:09.5")).to_string(), "05/03 14:07");
        }

        #[test]
        fn garbage_is_unknown() {
            assert_eq!(normalize(&text("yesterday")).to_string(), "Unknown");
            assert_eq!(normalize(&text("")).to_string(), "Unknown");
        }
    }

    mod raw {
        use super::*;

        #[test]
        fn deserializes_numbers_strings_and_others() {
            let n: RawTimestamp = serde_json::from_value(json!(1700000000)).unwrap();
            assert_eq!(n, RawTimestamp::Number(1_700_000_000.0));

            let s: RawTimestamp = serde_json::from_value(json!("2024-01-01T00:00:00Z")).unwrap();
            assert!(matches!(s, RawTimestamp::Text(_)));

            let o: RawTimestamp = serde_json::from_value(json!({"seconds": 1})).unwrap();
            assert!(matches!(o, RawTimestamp::Other(_)));
        }

        #[test]
        fn unsupported_types_are_unknown() {
            assert_eq!(normalize(&RawTimestamp::Other(json!(true))), DisplayTimestamp::Unknown);
            assert_eq!(normalize(&RawTimestamp::Other(json!([1, 2]))), DisplayTimestamp::Unknown);
        }

        #[test]
        fn missing_is_unknown() {
            assert_eq!(normalize_opt(None), DisplayTimestamp::Unknown);
        }

        #[test]
        fn unknown_sorts_first() {
            let known = normalize(&number(10.0));
            assert!(DisplayTimestamp::Unknown < known);
            assert!(normalize(&number(10.0)) < normalize(&number(20.0)));
        }
    }
}
