//! HTTP Request Tracing
//!
//! Request spans following HTTP semantic conventions.

use hyper::header::{HeaderMap, CONTENT_LENGTH, CONTENT_TYPE};
use tracing::Span;

/// Create the root span for an HTTP request
///
/// `http.status_code` and `relay.route` are recorded once known.
pub fn request_span(method: &str, path: &str, headers: &HeaderMap) -> Span {
    let content_type = header_str(headers, CONTENT_TYPE.as_str()).unwrap_or("");
    let content_length = header_str(headers, CONTENT_LENGTH.as_str())
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(0);

    tracing::info_span!(
        "http.request",
        http.method = %method,
        http.target = %path,
        http.scheme = "http",
        http.request.content_type = %content_type,
        http.request.content_length = content_length,
        http.status_code = tracing::field::Empty,
        relay.route = tracing::field::Empty,
        otel.kind = "server",
    )
}

/// Record the final status on `span`, logging server errors
pub fn record_response(span: &Span, status: u16) {
    span.record("http.status_code", status);
    let _entered = span.enter();
    if status >= 500 {
        tracing::error!(status_code = status, "HTTP request failed");
    } else if status >= 400 {
        tracing::warn!(status_code = status, "HTTP request rejected");
    } else {
        tracing::debug!(status_code = status, "HTTP request completed");
    }
}

/// Get a header as `&str`, case-insensitively
pub fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyper::header::HeaderValue;

    #[test]
    fn test_header_str_is_case_insensitive() {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("video/mp4"));

        assert_eq!(header_str(&headers, "content-type"), Some("video/mp4"));
        assert_eq!(header_str(&headers, "Content-Type"), Some("video/mp4"));
        assert_eq!(header_str(&headers, "missing"), None);
    }

    #[test]
    fn test_request_span_without_subscriber() {
        let span = request_span("POST", "/api/upload", &HeaderMap::new());
        record_response(&span, 200);
    }
}
