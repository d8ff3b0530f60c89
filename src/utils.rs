//! Small helpers shared across the pipeline: the timestamp format used by
//! every persisted file, and string truncation for logging.

use chrono::NaiveDateTime;

use crate::error::Result;

/// Format shared by the headline snapshot, the summary digest, and the
/// subscriber registry.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Render a timestamp as `YYYY-MM-DD HH:MM:SS`.
pub fn format_timestamp(value: NaiveDateTime) -> String {
    value.format(TIMESTAMP_FORMAT).to_string()
}

/// Parse a `YYYY-MM-DD HH:MM:SS` timestamp back into a [`NaiveDateTime`].
pub fn parse_timestamp(value: &str) -> Result<NaiveDateTime> {
    Ok(NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT)?)
}

/// Truncate a string for logging purposes.
///
/// Long strings are truncated to `max` bytes with an ellipsis and byte count
/// indicator appended. Used when logging unparsable model output so a broken
/// reply never floods the log.
pub fn truncate_for_log(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        let mut end = max;
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}…(+{} bytes)", &s[..end], s.len() - end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_round_trip() {
        let parsed = parse_timestamp("2024-03-01 07:45:00").unwrap();
        assert_eq!(format_timestamp(parsed), "2024-03-01 07:45:00");
    }

    #[test]
    fn test_timestamp_ordering() {
        let older = parse_timestamp("1900-01-01 00:00:00").unwrap();
        let newer = parse_timestamp("2024-03-01 07:45:00").unwrap();
        assert!(older < newer);
    }

    #[test]
    fn test_parse_timestamp_rejects_garbage() {
        assert!(parse_timestamp("yesterday-ish").is_err());
        assert!(parse_timestamp("2024-03-01").is_err());
    }

    #[test]
    fn test_truncate_for_log_short_string() {
        assert_eq!(truncate_for_log("Hello, world!", 100), "Hello, world!");
    }

    #[test]
    fn test_truncate_for_log_long_string() {
        let s = "a".repeat(500);
        let result = truncate_for_log(&s, 100);
        assert!(result.starts_with(&"a".repeat(100)));
        assert!(result.contains("…(+400 bytes)"));
    }

    #[test]
    fn test_truncate_for_log_multibyte_boundary() {
        // 3-byte characters; a cut at byte 4 must back up to a char boundary
        let s = "新聞標題";
        let result = truncate_for_log(s, 4);
        assert!(result.starts_with('新'));
    }
}
