//! Response outcome taxonomy.
//!
//! Every call the engine makes ends in exactly one [`Outcome`]. The tags form a
//! closed set, so callers can `match` on them exhaustively instead of inspecting
//! a status code, an optional error and an optional body separately.
//!
//! | Tag | Meaning |
//! |-----|---------|
//! | `Success` | transmitted, no content expected |
//! | `TypedSuccess` | content parsed (or `None` for a non-structured body) |
//! | `TypedEither` | content or error document parsed |
//! | `ParsingFailure` | body did not match the expected shape |
//! | `NetworkFailure` | could not transmit or receive |
//! | `Timeout` | deadline exceeded before response headers |
//! | `Aborted` | caller-initiated cancellation fired first |
//!
//! # Examples
//!
//! ```
//! use apiclient_http::types::{ApiResponse, Outcome, ResponseKind};
//! use http::{HeaderMap, StatusCode};
//! use url::Url;
//!
//! let response: ApiResponse = ApiResponse::new(
//!     Outcome::Success { status: StatusCode::NOT_FOUND, headers: HeaderMap::new() },
//!     Url::parse("http://example.com/missing").unwrap(),
//!     "req-1".to_string(),
//! );
//!
//! assert_eq!(response.kind(), ResponseKind::Success);
//! assert!(response.is_client_error());
//! assert!(!response.has_no_errors());
//! ```

use bytes::Bytes;
use http::{HeaderMap, StatusCode};
use std::fmt;
use url::Url;

/// Result of decoding a body that may hold either content or an error document.
#[derive(Debug, Clone, PartialEq)]
pub enum Parsed<T, E> {
    /// Body decoded as the expected content type
    Content(T),
    /// Body decoded as the error document type
    Error(E),
    /// Body was not structured; nothing was decoded
    Empty,
}

/// Terminal state of a logical request.
#[derive(Debug, Clone)]
pub enum Outcome<T, E = ()> {
    /// Transmitted; no content expected.
    Success {
        /// Response status
        status: StatusCode,
        /// Response headers
        headers: HeaderMap,
    },
    /// Transmitted and the body decoded.
    TypedSuccess {
        /// Response status
        status: StatusCode,
        /// Response headers
        headers: HeaderMap,
        /// Raw body
        body: Bytes,
        /// Decoded content; `None` when the media type is not structured
        content: Option<T>,
    },
    /// Transmitted and the body decoded as content or as an error document.
    TypedEither {
        /// Response status
        status: StatusCode,
        /// Response headers
        headers: HeaderMap,
        /// Raw body
        body: Bytes,
        /// Decoded document
        parsed: Parsed<T, E>,
    },
    /// The body did not match the expected shape.
    ParsingFailure {
        /// Decoder message
        reason: String,
        /// Raw body that failed to decode
        body: Bytes,
        /// Status, when a response was received
        status: Option<StatusCode>,
        /// Headers, when a response was received
        headers: Option<HeaderMap>,
    },
    /// The request could not be transmitted or the response could not be read.
    NetworkFailure {
        /// Transport error with its source chain
        reason: String,
    },
    /// The deadline elapsed before response headers arrived.
    Timeout,
    /// The caller cancelled the request.
    Aborted,
}

/// Payload-free discriminant of an [`Outcome`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponseKind {
    /// See [`Outcome::Success`]
    Success,
    /// See [`Outcome::TypedSuccess`]
    TypedSuccess,
    /// See [`Outcome::TypedEither`]
    TypedEither,
    /// See [`Outcome::ParsingFailure`]
    ParsingFailure,
    /// See [`Outcome::NetworkFailure`]
    NetworkFailure,
    /// See [`Outcome::Timeout`]
    Timeout,
    /// See [`Outcome::Aborted`]
    Aborted,
}

impl ResponseKind {
    /// Whether this tag denotes a failure regardless of status.
    pub fn is_failure(self) -> bool {
        matches!(
            self,
            ResponseKind::ParsingFailure
                | ResponseKind::NetworkFailure
                | ResponseKind::Timeout
                | ResponseKind::Aborted
        )
    }
}

impl fmt::Display for ResponseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResponseKind::Success => "success",
            ResponseKind::TypedSuccess => "typed-success",
            ResponseKind::TypedEither => "typed-either",
            ResponseKind::ParsingFailure => "parsing-failure",
            ResponseKind::NetworkFailure => "network-failure",
            ResponseKind::Timeout => "timeout",
            ResponseKind::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

impl<T, E> Outcome<T, E> {
    /// Build a network failure from any displayable reason.
    pub fn network_failure(reason: impl Into<String>) -> Self {
        Outcome::NetworkFailure {
            reason: reason.into(),
        }
    }

    /// Discriminant of this outcome.
    pub fn kind(&self) -> ResponseKind {
        match self {
            Outcome::Success { .. } => ResponseKind::Success,
            Outcome::TypedSuccess { .. } => ResponseKind::TypedSuccess,
            Outcome::TypedEither { .. } => ResponseKind::TypedEither,
            Outcome::ParsingFailure { .. } => ResponseKind::ParsingFailure,
            Outcome::NetworkFailure { .. } => ResponseKind::NetworkFailure,
            Outcome::Timeout => ResponseKind::Timeout,
            Outcome::Aborted => ResponseKind::Aborted,
        }
    }

    /// Response status, when one was received.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Outcome::Success { status, .. }
            | Outcome::TypedSuccess { status, .. }
            | Outcome::TypedEither { status, .. } => Some(*status),
            Outcome::ParsingFailure { status, .. } => *status,
            _ => None,
        }
    }

    /// Response headers, when received.
    pub fn headers(&self) -> Option<&HeaderMap> {
        match self {
            Outcome::Success { headers, .. }
            | Outcome::TypedSuccess { headers, .. }
            | Outcome::TypedEither { headers, .. } => Some(headers),
            Outcome::ParsingFailure { headers, .. } => headers.as_ref(),
            _ => None,
        }
    }

    /// Raw body, when one was read.
    pub fn body(&self) -> Option<&Bytes> {
        match self {
            Outcome::TypedSuccess { body, .. }
            | Outcome::TypedEither { body, .. }
            | Outcome::ParsingFailure { body, .. } => Some(body),
            _ => None,
        }
    }

    /// Decoded content.
    pub fn content(&self) -> Option<&T> {
        match self {
            Outcome::TypedSuccess { content, .. } => content.as_ref(),
            Outcome::TypedEither {
                parsed: Parsed::Content(content),
                ..
            } => Some(content),
            _ => None,
        }
    }

    /// Decoded error document.
    pub fn error(&self) -> Option<&E> {
        match self {
            Outcome::TypedEither {
                parsed: Parsed::Error(error),
                ..
            } => Some(error),
            _ => None,
        }
    }

    /// Failure reason for `ParsingFailure` and `NetworkFailure`.
    pub fn reason(&self) -> Option<&str> {
        match self {
            Outcome::ParsingFailure { reason, .. } | Outcome::NetworkFailure { reason } => {
                Some(reason)
            }
            _ => None,
        }
    }

    /// `400 <= status < 500`
    pub fn is_client_error(&self) -> bool {
        self.status().is_some_and(|s| s.is_client_error())
    }

    /// `status >= 500`
    pub fn is_server_error(&self) -> bool {
        self.status().is_some_and(|s| s.as_u16() >= 500)
    }

    /// No failure tag and a status below 400.
    pub fn has_no_errors(&self) -> bool {
        !self.kind().is_failure() && self.status().is_some_and(|s| s.as_u16() < 400)
    }

    /// Check for [`Outcome::ParsingFailure`].
    pub fn is_parsing_failure(&self) -> bool {
        matches!(self, Outcome::ParsingFailure { .. })
    }

    /// Check for [`Outcome::NetworkFailure`].
    pub fn is_network_failure(&self) -> bool {
        matches!(self, Outcome::NetworkFailure { .. })
    }

    /// Check for [`Outcome::Timeout`].
    pub fn is_timeout(&self) -> bool {
        matches!(self, Outcome::Timeout)
    }

    /// Check for [`Outcome::Aborted`].
    pub fn is_aborted(&self) -> bool {
        matches!(self, Outcome::Aborted)
    }
}

/// A classified response plus the side channels every send shape reports.
#[derive(Debug, Clone)]
pub struct ApiResponse<T = Bytes, E = ()> {
    /// Classified outcome
    pub outcome: Outcome<T, E>,
    /// Request URL
    pub url: Url,
    /// Correlation id of the originating request
    pub request_id: String,
    /// Whether this response was served from the URL cache
    pub from_cache: bool,
}

impl<T, E> ApiResponse<T, E> {
    /// Wrap an outcome. `from_cache` starts false.
    pub fn new(outcome: Outcome<T, E>, url: Url, request_id: String) -> Self {
        ApiResponse {
            outcome,
            url,
            request_id,
            from_cache: false,
        }
    }

    /// Mark this response as served from cache.
    pub fn cached(mut self) -> Self {
        self.from_cache = true;
        self
    }

    /// See [`Outcome::kind`].
    pub fn kind(&self) -> ResponseKind {
        self.outcome.kind()
    }

    /// See [`Outcome::status`].
    pub fn status(&self) -> Option<StatusCode> {
        self.outcome.status()
    }

    /// See [`Outcome::headers`].
    pub fn headers(&self) -> Option<&HeaderMap> {
        self.outcome.headers()
    }

    /// See [`Outcome::body`].
    pub fn body(&self) -> Option<&Bytes> {
        self.outcome.body()
    }

    /// See [`Outcome::content`].
    pub fn content(&self) -> Option<&T> {
        self.outcome.content()
    }

    /// See [`Outcome::error`].
    pub fn error(&self) -> Option<&E> {
        self.outcome.error()
    }

    /// See [`Outcome::reason`].
    pub fn reason(&self) -> Option<&str> {
        self.outcome.reason()
    }

    /// Take the decoded content out of the response.
    pub fn into_content(self) -> Option<T> {
        match self.outcome {
            Outcome::TypedSuccess { content, .. } => content,
            Outcome::TypedEither {
                parsed: Parsed::Content(content),
                ..
            } => Some(content),
            _ => None,
        }
    }

    /// See [`Outcome::is_client_error`].
    pub fn is_client_error(&self) -> bool {
        self.outcome.is_client_error()
    }

    /// See [`Outcome::is_server_error`].
    pub fn is_server_error(&self) -> bool {
        self.outcome.is_server_error()
    }

    /// See [`Outcome::has_no_errors`].
    pub fn has_no_errors(&self) -> bool {
        self.outcome.has_no_errors()
    }

    /// See [`Outcome::is_parsing_failure`].
    pub fn is_parsing_failure(&self) -> bool {
        self.outcome.is_parsing_failure()
    }

    /// See [`Outcome::is_network_failure`].
    pub fn is_network_failure(&self) -> bool {
        self.outcome.is_network_failure()
    }

    /// See [`Outcome::is_timeout`].
    pub fn is_timeout(&self) -> bool {
        self.outcome.is_timeout()
    }

    /// See [`Outcome::is_aborted`].
    pub fn is_aborted(&self) -> bool {
        self.outcome.is_aborted()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url() -> Url {
        Url::parse("http://example.com/").unwrap()
    }

    #[test]
    fn test_kind_and_display() {
        let o: Outcome<String> = Outcome::Timeout;
        assert_eq!(o.kind(), ResponseKind::Timeout);
        assert_eq!(o.kind().to_string(), "timeout");
        assert!(o.kind().is_failure());
        assert!(!ResponseKind::TypedEither.is_failure());
    }

    #[test]
    fn test_status_predicates() {
        let server: Outcome<()> = Outcome::Success {
            status: StatusCode::BAD_GATEWAY,
            headers: HeaderMap::new(),
        };
        assert!(server.is_server_error());
        assert!(!server.is_client_error());
        assert!(!server.has_no_errors());

        let ok: Outcome<()> = Outcome::Success {
            status: StatusCode::NO_CONTENT,
            headers: HeaderMap::new(),
        };
        assert!(ok.has_no_errors());
    }

    #[test]
    fn test_failures_have_no_status() {
        let failure: Outcome<()> = Outcome::network_failure("connection refused");
        assert_eq!(failure.status(), None);
        assert_eq!(failure.reason(), Some("connection refused"));
        assert!(!failure.has_no_errors());
        assert!(!failure.is_client_error());
        assert!(!failure.is_server_error());
    }

    #[test]
    fn test_parsing_failure_keeps_status() {
        let failure: Outcome<()> = Outcome::ParsingFailure {
            reason: "expected value".into(),
            body: Bytes::from_static(b"<html>"),
            status: Some(StatusCode::OK),
            headers: Some(HeaderMap::new()),
        };
        assert_eq!(failure.status(), Some(StatusCode::OK));
        assert!(!failure.has_no_errors());
        assert_eq!(failure.body().map(|b| b.as_ref()), Some(&b"<html>"[..]));
    }

    #[test]
    fn test_either_accessors() {
        let content: Outcome<u32, String> = Outcome::TypedEither {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: Bytes::new(),
            parsed: Parsed::Content(7),
        };
        assert_eq!(content.content(), Some(&7));
        assert_eq!(content.error(), None);

        let error: Outcome<u32, String> = Outcome::TypedEither {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            headers: HeaderMap::new(),
            body: Bytes::new(),
            parsed: Parsed::Error("bad input".into()),
        };
        assert_eq!(error.content(), None);
        assert_eq!(error.error().map(String::as_str), Some("bad input"));
        assert!(error.is_client_error());
    }

    #[test]
    fn test_response_cached_marking() {
        let response: ApiResponse<u32> = ApiResponse::new(
            Outcome::TypedSuccess {
                status: StatusCode::OK,
                headers: HeaderMap::new(),
                body: Bytes::from_static(b"7"),
                content: Some(7),
            },
            url(),
            "id".into(),
        );
        assert!(!response.from_cache);
        let cached = response.cached();
        assert!(cached.from_cache);
        assert_eq!(cached.into_content(), Some(7));
    }
}
