#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

//! # Crate Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`client`] | [`ApiClient`], classification, retry, stream and byte readers, GraphQL |
//! | [`cache`] | [`UrlCache`] and [`CachePolicy`] |
//! | [`middleware`] | Request/response hooks |
//! | [`dispatch`] | Completion sinks for callbacks |
//! | [`types`] | Requests, responses and outcome tags |
//! | [`protocol`] | Header helpers and constants |
//!
//! ## Outcome Tags
//!
//! Every send resolves to exactly one tag:
//!
//! | Tag | Meaning |
//! |-----|---------|
//! | `Success` | Response received, no content expected |
//! | `TypedSuccess` | Response received, structured content decoded (if any) |
//! | `TypedEither` | Response received, decoded as content or error document |
//! | `ParsingFailure` | Response received, body did not decode |
//! | `NetworkFailure` | No usable response |
//! | `Timeout` | Deadline elapsed before response headers |
//! | `Aborted` | Cancelled by the caller |
//!
//! Error statuses are not failures: a `404` is a `Success` or `TypedSuccess`
//! whose status the caller inspects.

pub mod cache;
pub mod cancel;
pub mod client;
pub mod dispatch;
pub mod error;
pub mod middleware;
pub mod protocol;
pub mod types;

pub use cache::{CachePolicy, CacheStats, UrlCache};
pub use cancel::CancelSignal;
pub use client::{ApiClient, Backoff, ClientConfig, GraphQLQuery, RetryPolicy};
pub use dispatch::{channel_sink, ChannelSink, CompletionSink, InlineSink, OwnerQueue};
pub use error::{ApiError, Result};
pub use middleware::{Middleware, MiddlewarePipeline, Override, Stage};
pub use types::{
    ApiRequest, ApiResponse, ByteProgress, DownloadStats, Outcome, Parsed, RequestParts,
    ResponseKind,
};
