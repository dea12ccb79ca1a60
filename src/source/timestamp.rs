use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use thiserror::Error;

#[derive(Debug, Error)]
#[error("unrecognized timestamp format: '{raw}'")]
pub struct NormalizeError {
    pub raw: String,
}

/// Canonicalize a source timestamp into UTC ISO-8601 with an explicit
/// `+00:00` offset.
///
/// Accepted inputs: RFC 3339 with a `Z` suffix or numeric offset, the same
/// with a space instead of the `T` separator, and zone-less variants (with or
/// without fractional seconds) which are assumed to already be UTC. Values
/// carrying an offset are converted, preserving the absolute instant.
///
/// On unparseable input the caller gets the original text back inside the
/// error and should store it as-is; the returned text is then best-effort,
/// not guaranteed canonical.
pub fn normalize(raw: &str) -> Result<String, NormalizeError> {
    let trimmed = raw.trim();

    // RFC 3339 covers "2023-10-27T10:00:00Z" and "...+02:00"
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.with_timezone(&Utc).to_rfc3339());
    }

    // Space separator with an explicit offset
    if let Ok(dt) = DateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S%.f%:z") {
        return Ok(dt.with_timezone(&Utc).to_rfc3339());
    }

    // No zone information: treated as already UTC (assumption, not detected)
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(Utc.from_utc_datetime(&naive).to_rfc3339());
        }
    }

    Err(NormalizeError {
        raw: raw.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zulu_suffix() {
        assert_eq!(
            normalize("2023-10-27T10:00:00Z").unwrap(),
            "2023-10-27T10:00:00+00:00"
        );
    }

    #[test]
    fn test_space_separator_no_zone_assumes_utc() {
        assert_eq!(
            normalize("2023-10-27 10:00:00").unwrap(),
            "2023-10-27T10:00:00+00:00"
        );
    }

    #[test]
    fn test_t_separator_no_zone_assumes_utc() {
        assert_eq!(
            normalize("2023-10-27T10:00:00").unwrap(),
            "2023-10-27T10:00:00+00:00"
        );
    }

    #[test]
    fn test_offset_converted_to_utc() {
        assert_eq!(
            normalize("2023-10-27T10:00:00+02:00").unwrap(),
            "2023-10-27T08:00:00+00:00"
        );
    }

    #[test]
    fn test_negative_offset_converted_to_utc() {
        assert_eq!(
            normalize("2023-10-27T10:00:00-05:30").unwrap(),
            "2023-10-27T15:30:00+00:00"
        );
    }

    #[test]
    fn test_fractional_seconds_preserved() {
        assert_eq!(
            normalize("2023-10-27T10:00:00.250Z").unwrap(),
            "2023-10-27T10:00:00.250+00:00"
        );
    }

    #[test]
    fn test_space_separator_with_offset() {
        assert_eq!(
            normalize("2023-10-27 10:00:00+02:00").unwrap(),
            "2023-10-27T08:00:00+00:00"
        );
    }

    #[test]
    fn test_unparseable_input_reports_original() {
        let err = normalize("last tuesday").unwrap_err();
        assert_eq!(err.raw, "last tuesday");
    }

    #[test]
    fn test_surrounding_whitespace_tolerated() {
        assert_eq!(
            normalize("  2023-10-27T10:00:00Z  ").unwrap(),
            "2023-10-27T10:00:00+00:00"
        );
    }
}
