//! Timestamps embedded in archive filenames.
//!
//! Recorder output is named `prefix_YYYYMMDD_HHMMSS.json`, stamped in UTC.
//! Display time is always US Pacific regardless of the host timezone.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use chrono_tz::America::Los_Angeles;
use chrono_tz::Tz;

/// Parse the UTC instant out of a `prefix_YYYYMMDD_HHMMSS.json` filename.
///
/// Returns `None` for fewer than three `_` segments, fields that are not
/// exactly 8 / 6 ASCII digits, or calendar values that do not exist.
pub fn parse_filename_timestamp(filename: &str) -> Option<DateTime<Utc>> {
    let stem = filename.strip_suffix(".json").unwrap_or(filename);
    let mut parts = stem.split('_');
    let _prefix = parts.next()?;
    let date = parts.next()?;
    let time = parts.next()?;

    let year = digits(date, 0..4, 8)?;
    let month = digits(date, 4..6, 8)?;
    let day = digits(date, 6..8, 8)?;
    let hour = digits(time, 0..2, 6)?;
    let minute = digits(time, 2..4, 6)?;
    let second = digits(time, 4..6, 6)?;

    let naive = NaiveDate::from_ymd_opt(year as i32, month, day)?
        .and_hms_opt(hour, minute, second)?;
    Some(Utc.from_utc_datetime(&naive))
}

fn digits(field: &str, range: std::ops::Range<usize>, expected_len: usize) -> Option<u32> {
    if field.len() != expected_len || !field.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    field[range].parse().ok()
}

pub fn to_pacific(instant: DateTime<Utc>) -> DateTime<Tz> {
    instant.with_timezone(&Los_Angeles)
}

/// `MM/DD/YYYY, HH:MM:SS` (24-hour) in America/Los_Angeles.
pub fn format_pacific(instant: DateTime<Utc>) -> String {
    to_pacific(instant).format("%m/%d/%Y, %H:%M:%S").to_string()
}

/// Parse and localize in one step.
pub fn filename_display_time(filename: &str) -> Option<String> {
    parse_filename_timestamp(filename).map(format_pacific)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_utc_components() {
        let ts = parse_filename_timestamp("call_20240315_143022.json").unwrap();
        assert_eq!(ts.to_rfc3339(), "2024-03-15T14:30:22+00:00");
    }

    #[test]
    fn pacific_display_during_pdt() {
        assert_eq!(
            filename_display_time("call_20240315_143022.json").as_deref(),
            Some("03/15/2024, 07:30:22")
        );
    }

    #[test]
    fn pacific_display_during_pst() {
        // UTC-8 in January
        assert_eq!(
            filename_display_time("law1_20240110_050000.json").as_deref(),
            Some("01/09/2024, 21:00:00")
        );
    }

    #[test]
    fn dst_transitions_follow_tz_database() {
        // 2024-03-10 02:00 PST jumps to 03:00 PDT (10:00 UTC)
        assert_eq!(
            filename_display_time("x_20240310_095959.json").as_deref(),
            Some("03/10/2024, 01:59:59")
        );
        assert_eq!(
            filename_display_time("x_20240310_100000.json").as_deref(),
            Some("03/10/2024, 03:00:00")
        );
        // 2024-11-03 02:00 PDT falls back to 01:00 PST (09:00 UTC)
        assert_eq!(
            filename_display_time("x_20241103_085959.json").as_deref(),
            Some("11/03/2024, 01:59:59")
        );
        assert_eq!(
            filename_display_time("x_20241103_090000.json").as_deref(),
            Some("11/03/2024, 01:00:00")
        );
    }

    #[test]
    fn decoding_is_deterministic() {
        let name = "fire1_20231231_235959.json";
        let a = filename_display_time(name);
        let b = filename_display_time(name);
        assert_eq!(a, b);
        assert_eq!(a.as_deref(), Some("12/31/2023, 15:59:59"));
    }

    #[test]
    fn suffix_is_optional() {
        assert!(parse_filename_timestamp("call_20240315_143022").is_some());
    }

    #[test]
    fn malformed_names_are_absent() {
        for name in [
            "",
            "call.json",
            "call_20240315.json",
            "call_2024031_143022.json",
            "call_20240315_14302.json",
            "call_2024O315_143022.json",
            "call_20240315_14302x.json",
            "call_20241315_143022.json",
            "call_20240230_143022.json",
            "call_20240315_256000.json",
            "call_+2024031_143022.json",
            "index.html",
        ] {
            assert!(
                parse_filename_timestamp(name).is_none(),
                "expected {name:?} to be rejected"
            );
        }
    }

    #[test]
    fn non_ascii_digits_do_not_panic() {
        assert!(parse_filename_timestamp("call_２０２４0315_143022.json").is_none());
        assert!(parse_filename_timestamp("call_20240315_１43022.json").is_none());
    }
}
