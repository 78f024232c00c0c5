//! Rate-limit response headers

use reqwest::header::HeaderMap;
use std::time::Duration;
use tokio::time::Instant;

pub const HEADER_BUCKET: &str = "x-ratelimit-bucket";
pub const HEADER_LIMIT: &str = "x-ratelimit-limit";
pub const HEADER_REMAINING: &str = "x-ratelimit-remaining";
pub const HEADER_RESET_AFTER: &str = "x-ratelimit-reset-after";
pub const HEADER_GLOBAL: &str = "x-ratelimit-global";

/// Rate-limit information carried by a response
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RateLimitHeaders {
    /// Server-side bucket hash
    pub bucket: Option<String>,
    pub limit: Option<u32>,
    pub remaining: Option<u32>,
    pub reset_after: Option<Duration>,
    /// The limit hit was the global one
    pub global: bool,
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

/// Longest wait any rate-limit hint may impose
pub const MAX_RATE_LIMIT_WAIT: Duration = Duration::from_secs(60 * 60);

/// Fractional seconds as sent by the service, capped at [`MAX_RATE_LIMIT_WAIT`]
pub(crate) fn parse_seconds(raw: f64) -> Option<Duration> {
    (raw.is_finite() && raw >= 0.0)
        .then(|| Duration::from_secs_f64(raw.min(MAX_RATE_LIMIT_WAIT.as_secs_f64())))
}

/// `now + wait` with the wait capped; never overflows
pub(crate) fn deadline(now: Instant, wait: Duration) -> Instant {
    now.checked_add(wait.min(MAX_RATE_LIMIT_WAIT)).unwrap_or(now)
}

impl RateLimitHeaders {
    pub fn parse(headers: &HeaderMap) -> Self {
        Self {
            bucket: header_str(headers, HEADER_BUCKET).map(str::to_owned),
            limit: header_str(headers, HEADER_LIMIT).and_then(|v| v.parse().ok()),
            remaining: header_str(headers, HEADER_REMAINING).and_then(|v| v.parse().ok()),
            reset_after: header_str(headers, HEADER_RESET_AFTER)
                .and_then(|v| v.parse::<f64>().ok())
                .and_then(parse_seconds),
            global: header_str(headers, HEADER_GLOBAL).is_some_and(|v| v.eq_ignore_ascii_case("true")),
        }
    }

    /// No rate-limit header was present
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn test_parse_all_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(HEADER_BUCKET, HeaderValue::from_static("abcd1234"));
        headers.insert(HEADER_LIMIT, HeaderValue::from_static("5"));
        headers.insert(HEADER_REMAINING, HeaderValue::from_static("0"));
        headers.insert(HEADER_RESET_AFTER, HeaderValue::from_static("1.25"));
        headers.insert(HEADER_GLOBAL, HeaderValue::from_static("true"));

        let parsed = RateLimitHeaders::parse(&headers);
        assert_eq!(parsed.bucket.as_deref(), Some("abcd1234"));
        assert_eq!(parsed.limit, Some(5));
        assert_eq!(parsed.remaining, Some(0));
        assert_eq!(parsed.reset_after, Some(Duration::from_millis(1250)));
        assert!(parsed.global);
    }

    #[test]
    fn test_garbage_values_are_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(HEADER_REMAINING, HeaderValue::from_static("many"));
        headers.insert(HEADER_RESET_AFTER, HeaderValue::from_static("-3"));

        let parsed = RateLimitHeaders::parse(&headers);
        assert!(parsed.is_empty());
    }

    #[test]
    fn test_huge_reset_is_capped() {
        let mut headers = HeaderMap::new();
        headers.insert(HEADER_RESET_AFTER, HeaderValue::from_static("1e19"));

        let parsed = RateLimitHeaders::parse(&headers);
        assert_eq!(parsed.reset_after, Some(MAX_RATE_LIMIT_WAIT));
        assert_eq!(parse_seconds(f64::MAX), Some(MAX_RATE_LIMIT_WAIT));
    }

    #[test]
    fn test_deadline_never_overflows() {
        let now = Instant::now();
        assert_eq!(deadline(now, Duration::MAX), now + MAX_RATE_LIMIT_WAIT);
        assert_eq!(deadline(now, Duration::from_secs(2)), now + Duration::from_secs(2));
    }
}
