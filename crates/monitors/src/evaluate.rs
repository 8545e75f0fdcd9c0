//! Threshold helpers shared by several probes.

use std::time::Instant;

use statusboard_core::Severity;

/// Milliseconds elapsed since `start`, saturating at `i64::MAX`.
pub fn elapsed_ms(start: Instant) -> i64 {
    i64::try_from(start.elapsed().as_millis()).unwrap_or(i64::MAX)
}

/// Classify a response time against warning/error thresholds.
///
/// A threshold of `0` disables that level.
pub fn response_time_severity(elapsed_ms: i64, warning_ms: i64, error_ms: i64) -> Severity {
    if error_ms > 0 && elapsed_ms >= error_ms {
        Severity::Error
    } else if warning_ms > 0 && elapsed_ms >= warning_ms {
        Severity::Warning
    } else {
        Severity::Ok
    }
}

/// Return the first expected snippet missing from `body`, if any.
pub fn missing_content<'a>(body: &str, expected: &'a [String]) -> Option<&'a str> {
    expected
        .iter()
        .map(String::as_str)
        .find(|snippet| !body.contains(snippet))
}

/// Whole days in a span of seconds, truncated toward zero.
pub fn whole_days(seconds: i64) -> i64 {
    seconds / 86_400
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_time_levels() {
        assert_eq!(response_time_severity(100, 2000, 5000), Severity::Ok);
        assert_eq!(response_time_severity(2000, 2000, 5000), Severity::Warning);
        assert_eq!(response_time_severity(7000, 2000, 5000), Severity::Error);
    }

    #[test]
    fn zero_threshold_disables_level() {
        assert_eq!(response_time_severity(60_000, 0, 0), Severity::Ok);
        assert_eq!(response_time_severity(60_000, 0, 5000), Severity::Error);
    }

    #[test]
    fn missing_content_reports_first_absent_snippet() {
        let expected = vec!["Welcome".to_string(), "Login".to_string()];
        assert_eq!(missing_content("<h1>Welcome</h1> Login", &expected), None);
        assert_eq!(missing_content("<h1>Welcome</h1>", &expected), Some("Login"));
        assert_eq!(missing_content("", &[]), None);
    }

    #[test]
    fn whole_days_truncates() {
        assert_eq!(whole_days(86_400 * 3 + 100), 3);
        assert_eq!(whole_days(-86_400 - 5), -1);
    }
}
