use std::time::Duration;

/// Parses a `retry-after` header expressed in whole seconds.
pub fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
    let raw = headers.get("retry-after")?.to_str().ok()?;
    let seconds = raw.trim().parse::<u64>().ok()?;
    Some(Duration::from_secs(seconds))
}

/// Exponential backoff capped at 30s; a server-provided delay wins when longer than the base.
pub fn retry_delay(base_delay_ms: u64, attempt: usize, retry_after: Option<Duration>) -> Duration {
    if let Some(delay) = retry_after {
        return delay.max(Duration::from_millis(base_delay_ms));
    }
    let exponent = attempt.saturating_sub(1).min(10) as u32;
    let scaled = base_delay_ms.saturating_mul(2_u64.saturating_pow(exponent));
    Duration::from_millis(scaled.min(30_000))
}

pub fn is_retryable_transport_error(error: &reqwest::Error) -> bool {
    error.is_timeout() || error.is_connect() || error.is_request()
}

pub fn is_retryable_github_status(status: u16) -> bool {
    status == 429 || status >= 500
}

pub fn truncate_for_error(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut truncated = text.chars().take(max_chars).collect::<String>();
    truncated.push_str("...");
    truncated
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{is_retryable_github_status, parse_retry_after, retry_delay, truncate_for_error};

    #[test]
    fn unit_retry_delay_doubles_per_attempt_and_caps() {
        assert_eq!(retry_delay(100, 1, None), Duration::from_millis(100));
        assert_eq!(retry_delay(100, 3, None), Duration::from_millis(400));
        assert_eq!(retry_delay(10_000, 9, None), Duration::from_millis(30_000));
    }

    #[test]
    fn functional_retry_delay_prefers_retry_after_when_longer() {
        assert_eq!(
            retry_delay(100, 1, Some(Duration::from_secs(2))),
            Duration::from_secs(2)
        );
        assert_eq!(
            retry_delay(5_000, 1, Some(Duration::from_secs(1))),
            Duration::from_millis(5_000)
        );
    }

    #[test]
    fn unit_parse_retry_after_reads_seconds() {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert("retry-after", reqwest::header::HeaderValue::from_static(" 7 "));
        assert_eq!(parse_retry_after(&headers), Some(Duration::from_secs(7)));
        headers.insert(
            "retry-after",
            reqwest::header::HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT"),
        );
        assert_eq!(parse_retry_after(&headers), None);
    }

    #[test]
    fn regression_is_retryable_github_status_only_for_throttle_and_server_errors() {
        assert!(is_retryable_github_status(429));
        assert!(is_retryable_github_status(502));
        assert!(!is_retryable_github_status(404));
        assert!(!is_retryable_github_status(422));
    }

    #[test]
    fn unit_truncate_for_error_appends_ellipsis() {
        assert_eq!(truncate_for_error("abcdef", 3), "abc...");
        assert_eq!(truncate_for_error("abc", 3), "abc");
    }
}
