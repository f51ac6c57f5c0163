//! Maps the terminal state of an attempt to exactly one [`Outcome`].
//!
//! Decision order:
//!
//! 1. A cancellation-type ending (cancel signal fired, deadline elapsed, or a
//!    transport timeout) becomes `Aborted` if the caller cancelled and `Timeout`
//!    otherwise. Caller cancellation always wins.
//! 2. Any other transport failure becomes `NetworkFailure`.
//! 3. A received response is decoded according to the requested shape. Only
//!    structured media types (`application/json`, `*+json`) are decoded.

use crate::cancel::CancelSignal;
use crate::client::utils::error_chain;
use crate::protocol::has_structured_body;
use crate::types::{Outcome, Parsed};
use bytes::Bytes;
use http::{HeaderMap, StatusCode};
use serde::de::DeserializeOwned;

/// A response whose headers and body were read.
#[derive(Debug, Clone)]
pub struct Received {
    /// Response status
    pub status: StatusCode,
    /// Response headers
    pub headers: HeaderMap,
    /// Full body
    pub body: Bytes,
}

/// How an attempt ended.
#[derive(Debug, Clone)]
pub enum AttemptState {
    /// A response was read completely.
    Received(Received),
    /// The transport failed.
    Transport {
        /// Error with its source chain
        reason: String,
        /// Whether the transport itself reported a timeout
        timed_out: bool,
    },
    /// The cancel signal fired while the attempt was in flight.
    Cancelled,
    /// The header deadline elapsed.
    DeadlineElapsed,
}

impl AttemptState {
    /// State for a `reqwest` failure.
    pub fn from_transport(err: &reqwest::Error) -> Self {
        AttemptState::Transport {
            reason: error_chain(err),
            timed_out: err.is_timeout(),
        }
    }
}

/// Resolve failure endings; hand back a received response for decoding.
fn settle<T, E>(state: AttemptState, cancel: &CancelSignal) -> Result<Received, Outcome<T, E>> {
    match state {
        AttemptState::Received(received) => {
            if cancel.is_cancelled() {
                Err(Outcome::Aborted)
            } else {
                Ok(received)
            }
        }
        AttemptState::Cancelled
        | AttemptState::DeadlineElapsed
        | AttemptState::Transport {
            timed_out: true, ..
        } => {
            if cancel.is_cancelled() {
                Err(Outcome::Aborted)
            } else {
                Err(Outcome::Timeout)
            }
        }
        AttemptState::Transport { reason, .. } => {
            if cancel.is_cancelled() {
                Err(Outcome::Aborted)
            } else {
                Err(Outcome::NetworkFailure { reason })
            }
        }
    }
}

fn parsing_failure<T, E>(reason: String, received: Received) -> Outcome<T, E> {
    Outcome::ParsingFailure {
        reason,
        body: received.body,
        status: Some(received.status),
        headers: Some(received.headers),
    }
}

/// Classify without decoding the body.
pub fn classify_plain<T, E>(state: AttemptState, cancel: &CancelSignal) -> Outcome<T, E> {
    match settle(state, cancel) {
        Ok(received) => Outcome::Success {
            status: received.status,
            headers: received.headers,
        },
        Err(outcome) => outcome,
    }
}

/// Classify and decode the body as `T`.
///
/// A non-structured or empty body yields `TypedSuccess` with `content: None`.
pub fn classify_typed<T, E>(state: AttemptState, cancel: &CancelSignal) -> Outcome<T, E>
where
    T: DeserializeOwned,
{
    let received = match settle(state, cancel) {
        Ok(received) => received,
        Err(outcome) => return outcome,
    };

    if !has_structured_body(&received.headers) || received.body.is_empty() {
        return Outcome::TypedSuccess {
            status: received.status,
            headers: received.headers,
            body: received.body,
            content: None,
        };
    }

    match serde_json::from_slice::<T>(&received.body) {
        Ok(content) => Outcome::TypedSuccess {
            status: received.status,
            headers: received.headers,
            body: received.body,
            content: Some(content),
        },
        Err(e) => parsing_failure(e.to_string(), received),
    }
}

/// Classify and decode the body as `T`, falling back to the error document `E`.
pub fn classify_either<T, E>(state: AttemptState, cancel: &CancelSignal) -> Outcome<T, E>
where
    T: DeserializeOwned,
    E: DeserializeOwned,
{
    let received = match settle(state, cancel) {
        Ok(received) => received,
        Err(outcome) => return outcome,
    };

    if !has_structured_body(&received.headers) || received.body.is_empty() {
        return Outcome::TypedEither {
            status: received.status,
            headers: received.headers,
            body: received.body,
            parsed: Parsed::Empty,
        };
    }

    let content_err = match serde_json::from_slice::<T>(&received.body) {
        Ok(content) => {
            return Outcome::TypedEither {
                status: received.status,
                headers: received.headers,
                body: received.body,
                parsed: Parsed::Content(content),
            }
        }
        Err(e) => e,
    };

    match serde_json::from_slice::<E>(&received.body) {
        Ok(error) => Outcome::TypedEither {
            status: received.status,
            headers: received.headers,
            body: received.body,
            parsed: Parsed::Error(error),
        },
        Err(error_err) => parsing_failure(
            format!(
                "body matches neither content ({}) nor error ({}) shape",
                content_err, error_err
            ),
            received,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Item {
        id: u32,
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Problem {
        message: String,
    }

    fn received(status: u16, content_type: Option<&'static str>, body: &'static str) -> AttemptState {
        let mut headers = HeaderMap::new();
        if let Some(ct) = content_type {
            headers.insert("content-type", HeaderValue::from_static(ct));
        }
        AttemptState::Received(Received {
            status: StatusCode::from_u16(status).unwrap(),
            headers,
            body: Bytes::from_static(body.as_bytes()),
        })
    }

    #[test]
    fn test_cancel_beats_deadline() {
        let cancel = CancelSignal::new();
        cancel.cancel();
        let outcome: Outcome<()> = classify_plain(AttemptState::DeadlineElapsed, &cancel);
        assert!(outcome.is_aborted());
    }

    #[test]
    fn test_deadline_without_cancel_is_timeout() {
        let cancel = CancelSignal::new();
        let outcome: Outcome<()> = classify_plain(AttemptState::DeadlineElapsed, &cancel);
        assert!(outcome.is_timeout());
        let outcome: Outcome<()> = classify_plain(AttemptState::Cancelled, &cancel);
        assert!(outcome.is_timeout());
        let outcome: Outcome<()> = classify_plain(
            AttemptState::Transport {
                reason: "operation timed out".into(),
                timed_out: true,
            },
            &cancel,
        );
        assert!(outcome.is_timeout());
    }

    #[test]
    fn test_transport_failure() {
        let outcome: Outcome<()> = classify_plain(
            AttemptState::Transport {
                reason: "connection refused".into(),
                timed_out: false,
            },
            &CancelSignal::new(),
        );
        assert_eq!(outcome.reason(), Some("connection refused"));
    }

    #[test]
    fn test_plain_keeps_status() {
        let outcome: Outcome<()> =
            classify_plain(received(503, None, "busy"), &CancelSignal::new());
        assert_eq!(outcome.status(), Some(StatusCode::SERVICE_UNAVAILABLE));
        assert!(outcome.is_server_error());
    }

    #[test]
    fn test_typed_decodes_json() {
        let outcome: Outcome<Item> = classify_typed(
            received(200, Some("application/json"), r#"{"id": 3}"#),
            &CancelSignal::new(),
        );
        assert_eq!(outcome.content(), Some(&Item { id: 3 }));
    }

    #[test]
    fn test_typed_non_structured_has_no_content() {
        let outcome: Outcome<Item> = classify_typed(
            received(200, Some("text/html"), "<p>hi</p>"),
            &CancelSignal::new(),
        );
        assert!(matches!(outcome, Outcome::TypedSuccess { content: None, .. }));
    }

    #[test]
    fn test_typed_mismatch_is_parsing_failure() {
        let outcome: Outcome<Item> = classify_typed(
            received(200, Some("application/json"), r#"{"name": "x"}"#),
            &CancelSignal::new(),
        );
        assert!(outcome.is_parsing_failure());
        assert_eq!(outcome.status(), Some(StatusCode::OK));
        assert!(outcome.body().is_some());
    }

    #[test]
    fn test_either_falls_back_to_error() {
        let outcome: Outcome<Item, Problem> = classify_either(
            received(422, Some("application/problem+json"), r#"{"message": "bad"}"#),
            &CancelSignal::new(),
        );
        assert_eq!(
            outcome.error(),
            Some(&Problem {
                message: "bad".into()
            })
        );
        assert!(outcome.is_client_error());
    }

    #[test]
    fn test_either_neither_shape() {
        let outcome: Outcome<Item, Problem> = classify_either(
            received(200, Some("application/json"), "[1, 2]"),
            &CancelSignal::new(),
        );
        assert!(outcome.is_parsing_failure());
        assert!(outcome.reason().unwrap().contains("neither"));
    }

    #[test]
    fn test_received_after_cancel_is_aborted() {
        let cancel = CancelSignal::new();
        cancel.cancel();
        let outcome: Outcome<Item> =
            classify_typed(received(200, Some("application/json"), r#"{"id":1}"#), &cancel);
        assert!(outcome.is_aborted());
    }
}
