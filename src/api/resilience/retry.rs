//! Response classification for bulk update requests
//!
//! Decides whether a response is a success, a recoverable rate-limit signal
//! or a hard failure, and reads the server's suggested wait.

/// How the dispatcher should treat a response status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseClass {
    /// 2xx
    Success,
    /// HTTP 429 Too Many Requests
    RateLimited,
    /// Anything else; never retried
    Failed(u16),
}

impl ResponseClass {
    pub fn from_status_code(status: u16) -> Self {
        match status {
            200..=299 => ResponseClass::Success,
            429 => ResponseClass::RateLimited,
            other => ResponseClass::Failed(other),
        }
    }

    pub fn should_retry(&self) -> bool {
        matches!(self, ResponseClass::RateLimited)
    }
}

/// Parse a `Retry-After` header value given in whole seconds.
///
/// Returns `None` for a missing value or anything that is not a
/// non-negative integer (including the HTTP-date form), so callers fall back
/// to their default wait.
pub fn parse_retry_after(value: Option<&str>) -> Option<u64> {
    value?.trim().parse::<u64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_code_classification() {
        assert_eq!(ResponseClass::from_status_code(200), ResponseClass::Success);
        assert_eq!(ResponseClass::from_status_code(204), ResponseClass::Success);
        assert_eq!(ResponseClass::from_status_code(429), ResponseClass::RateLimited);
        assert_eq!(ResponseClass::from_status_code(400), ResponseClass::Failed(400));
        assert_eq!(ResponseClass::from_status_code(500), ResponseClass::Failed(500));
        assert_eq!(ResponseClass::from_status_code(302), ResponseClass::Failed(302));
    }

    #[test]
    fn test_only_rate_limit_is_retryable() {
        assert!(ResponseClass::RateLimited.should_retry());
        assert!(!ResponseClass::Success.should_retry());
        assert!(!ResponseClass::Failed(503).should_retry());
    }

    #[test]
    fn test_parse_retry_after() {
        assert_eq!(parse_retry_after(Some("7")), Some(7));
        assert_eq!(parse_retry_after(Some(" 2 ")), Some(2));
        assert_eq!(parse_retry_after(Some("0")), Some(0));
        assert_eq!(parse_retry_after(Some("-1")), None);
        assert_eq!(parse_retry_after(Some("1.5")), None);
        assert_eq!(parse_retry_after(Some("Wed, 21 Oct 2015 07:28:00 GMT")), None);
        assert_eq!(parse_retry_after(None), None);
    }
}
