//! Error types for the request engine.
//!
//! Network outcomes (timeouts, transport failures, unparsable bodies) are never
//! errors here: they are variants of [`Outcome`](crate::types::Outcome) and are
//! returned as values. [`ApiError`] only covers misuse of the API itself, such
//! as sending the same request twice or building a request from a bad URL.

use thiserror::Error;

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, ApiError>;

/// Errors raised by the engine before anything reaches the network.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request was already handed to the engine once.
    #[error("request {request_id} has already been sent; resending is not allowed")]
    AlreadySent {
        /// Correlation id of the offending request
        request_id: String,
    },

    /// The URL could not be parsed.
    #[error("invalid url '{url}': {reason}")]
    InvalidUrl {
        /// The rejected input
        url: String,
        /// Parser message
        reason: String,
    },

    /// A header name or value was rejected.
    #[error("invalid header: {0}")]
    InvalidHeader(String),

    /// A GraphQL request was built but no endpoint is configured.
    #[error("no GraphQL endpoint configured")]
    MissingGraphQLEndpoint,

    /// A request body or config document could not be (de)serialised.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid client configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

impl ApiError {
    /// Build an [`ApiError::InvalidUrl`] from a parse failure.
    pub(crate) fn invalid_url(url: &str, err: url::ParseError) -> Self {
        ApiError::InvalidUrl {
            url: url.to_string(),
            reason: err.to_string(),
        }
    }
}
