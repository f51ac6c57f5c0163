//! GraphQL over HTTP.
//!
//! Queries are POSTed as `{query, variables, operationName}`. Responses arrive
//! in the `{data, errors}` envelope and are classified as:
//!
//! | Envelope | Outcome |
//! |----------|---------|
//! | `errors` present | `NetworkFailure` with the pretty-printed errors |
//! | `data` present | `TypedSuccess` |
//! | neither | `NetworkFailure("no valid result in GraphQL response")` |
//! | not JSON / wrong shape | `ParsingFailure` |
//!
//! # Examples
//!
//! ```
//! use apiclient_http::client::GraphQLQuery;
//! use serde_json::json;
//!
//! let query = GraphQLQuery::new("query Hero($ep: Episode) { hero(episode: $ep) { name } }")
//!     .with_variables(&json!({"ep": "JEDI"}))
//!     .unwrap()
//!     .with_operation_name("Hero");
//!
//! let body = serde_json::to_value(&query).unwrap();
//! assert_eq!(body["operationName"], "Hero");
//! assert_eq!(body["variables"]["ep"], "JEDI");
//! ```

use crate::cancel::CancelSignal;
use crate::client::classify::{AttemptState, Received};
use crate::error::Result;
use crate::types::Outcome;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A GraphQL request document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphQLQuery {
    /// Query text
    pub query: String,
    /// Variables object
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variables: Option<Value>,
    /// Operation to run when the document holds several
    #[serde(
        default,
        rename = "operationName",
        skip_serializing_if = "Option::is_none"
    )]
    pub operation_name: Option<String>,
}

impl GraphQLQuery {
    /// Query without variables.
    pub fn new(query: impl Into<String>) -> Self {
        GraphQLQuery {
            query: query.into(),
            variables: None,
            operation_name: None,
        }
    }

    /// Attach variables.
    pub fn with_variables<V: Serialize + ?Sized>(mut self, variables: &V) -> Result<Self> {
        self.variables = Some(serde_json::to_value(variables)?);
        Ok(self)
    }

    /// Select an operation by name.
    pub fn with_operation_name(mut self, name: impl Into<String>) -> Self {
        self.operation_name = Some(name.into());
        self
    }
}

/// Source location of a GraphQL error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphQLLocation {
    /// 1-based line
    pub line: u32,
    /// 1-based column
    pub column: u32,
}

/// One entry of the `errors` array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphQLError {
    /// Error message
    pub message: String,
    /// Source locations
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locations: Option<Vec<GraphQLLocation>>,
    /// Response path
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<Vec<Value>>,
    /// Server-specific details
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: DeserializeOwned"))]
struct Envelope<T> {
    #[serde(default)]
    data: Option<T>,
    #[serde(default)]
    errors: Option<Vec<GraphQLError>>,
}

/// Classify a GraphQL attempt.
pub fn classify_graphql<T>(state: AttemptState, cancel: &CancelSignal) -> Outcome<T>
where
    T: DeserializeOwned,
{
    let received = match state {
        AttemptState::Received(received) if !cancel.is_cancelled() => received,
        other => return crate::client::classify::classify_plain(other, cancel),
    };
    let Received {
        status,
        headers,
        body,
    } = received;

    let envelope: Envelope<T> = match serde_json::from_slice(&body) {
        Ok(envelope) => envelope,
        Err(e) if status.is_success() => {
            return Outcome::ParsingFailure {
                reason: e.to_string(),
                body,
                status: Some(status),
                headers: Some(headers),
            }
        }
        Err(_) => {
            return Outcome::network_failure(format!(
                "GraphQL endpoint responded with {}",
                status
            ))
        }
    };

    match envelope {
        Envelope {
            errors: Some(errors),
            ..
        } if !errors.is_empty() => {
            let message = serde_json::to_string_pretty(&errors)
                .unwrap_or_else(|_| format!("{} GraphQL error(s)", errors.len()));
            Outcome::network_failure(message)
        }
        Envelope {
            data: Some(data), ..
        } => Outcome::TypedSuccess {
            status,
            headers,
            body,
            content: Some(data),
        },
        _ => Outcome::network_failure("no valid result in GraphQL response"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use http::{HeaderMap, StatusCode};

    #[derive(Debug, Deserialize, PartialEq)]
    struct Hero {
        name: String,
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct HeroData {
        hero: Hero,
    }

    fn reply(status: u16, body: &'static str) -> AttemptState {
        AttemptState::Received(Received {
            status: StatusCode::from_u16(status).unwrap(),
            headers: HeaderMap::new(),
            body: Bytes::from_static(body.as_bytes()),
        })
    }

    #[test]
    fn test_query_serialisation_skips_empty_fields() {
        let body = serde_json::to_string(&GraphQLQuery::new("{ me { id } }")).unwrap();
        assert_eq!(body, r#"{"query":"{ me { id } }"}"#);
    }

    #[test]
    fn test_data() {
        let outcome: Outcome<HeroData> = classify_graphql(
            reply(200, r#"{"data": {"hero": {"name": "R2-D2"}}}"#),
            &CancelSignal::new(),
        );
        assert_eq!(outcome.content().map(|d| d.hero.name.as_str()), Some("R2-D2"));
    }

    #[test]
    fn test_errors_become_network_failure() {
        let outcome: Outcome<HeroData> = classify_graphql(
            reply(
                200,
                r#"{"data": null, "errors": [{"message": "Cannot query field \"foo\"", "locations": [{"line": 1, "column": 3}]}]}"#,
            ),
            &CancelSignal::new(),
        );
        assert!(outcome.is_network_failure());
        let reason = outcome.reason().unwrap();
        assert!(reason.contains("Cannot query field"));
        assert!(reason.contains('\n'));
    }

    #[test]
    fn test_empty_envelope() {
        let outcome: Outcome<HeroData> = classify_graphql(reply(200, "{}"), &CancelSignal::new());
        assert_eq!(outcome.reason(), Some("no valid result in GraphQL response"));
    }

    #[test]
    fn test_bad_shape_is_parsing_failure() {
        let outcome: Outcome<HeroData> = classify_graphql(
            reply(200, r#"{"data": {"hero": 5}}"#),
            &CancelSignal::new(),
        );
        assert!(outcome.is_parsing_failure());
    }

    #[test]
    fn test_non_json_error_status() {
        let outcome: Outcome<HeroData> =
            classify_graphql(reply(502, "<html>bad gateway</html>"), &CancelSignal::new());
        assert!(outcome.is_network_failure());
        assert!(outcome.reason().unwrap().contains("502"));
    }

    #[test]
    fn test_timeout_passthrough() {
        let outcome: Outcome<HeroData> =
            classify_graphql(AttemptState::DeadlineElapsed, &CancelSignal::new());
        assert!(outcome.is_timeout());
    }
}
