//! Status and transport error mapping shared by the providers.

use std::time::Duration;

use pipeline::ProviderError;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::StatusCode;

/// Longest error body carried into a [`ProviderError`] message.
const MAX_ERROR_BODY_CHARS: usize = 300;

/// Seconds form of `Retry-After`. HTTP-date values are ignored.
pub(crate) fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    let raw = headers.get(RETRY_AFTER)?.to_str().ok()?;
    let seconds = raw.trim().parse::<f64>().ok()?;
    (seconds.is_finite() && seconds >= 0.0).then(|| Duration::from_secs_f64(seconds))
}

/// Maps a non-success response to an error.
pub(crate) fn status_error(
    status: StatusCode,
    retry_after: Option<Duration>,
    body: &str,
) -> ProviderError {
    let message: String = body.trim().chars().take(MAX_ERROR_BODY_CHARS).collect();
    if status == StatusCode::TOO_MANY_REQUESTS {
        ProviderError::RateLimited { retry_after }
    } else if status.is_server_error() {
        ProviderError::Unavailable {
            message: format!("{status}: {message}"),
        }
    } else {
        ProviderError::Rejected {
            status: status.as_u16(),
            message,
        }
    }
}

pub(crate) fn transport_error(e: &reqwest::Error, timeout: Duration) -> ProviderError {
    if e.is_timeout() {
        ProviderError::Timeout { after: timeout }
    } else {
        ProviderError::Unavailable {
            message: e.to_string(),
        }
    }
}

pub(crate) fn malformed(e: impl std::fmt::Display) -> ProviderError {
    ProviderError::MalformedResponse {
        message: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use reqwest::header::HeaderValue;

    use super::*;

    #[test]
    fn statuses_map_to_error_kinds() {
        assert_eq!(
            status_error(StatusCode::TOO_MANY_REQUESTS, Some(Duration::from_secs(2)), ""),
            ProviderError::RateLimited {
                retry_after: Some(Duration::from_secs(2))
            }
        );
        assert!(matches!(
            status_error(StatusCode::BAD_GATEWAY, None, "upstream"),
            ProviderError::Unavailable { .. }
        ));
        assert_eq!(
            status_error(StatusCode::UNAUTHORIZED, None, " bad key "),
            ProviderError::Rejected {
                status: 401,
                message: "bad key".into()
            }
        );
    }

    #[test]
    fn retry_after_reads_seconds_only() {
        let mut headers = HeaderMap::new();
        assert_eq!(retry_after(&headers), None);
        headers.insert(RETRY_AFTER, HeaderValue::from_static("1.5"));
        assert_eq!(retry_after(&headers), Some(Duration::from_millis(1500)));
        headers.insert(
            RETRY_AFTER,
            HeaderValue::from_static("Wed, 21 Oct 2026 07:28:00 GMT"),
        );
        assert_eq!(retry_after(&headers), None);
    }
}
