//! Request engine.
//!
//! This module holds everything between an [`ApiRequest`](crate::ApiRequest)
//! and the [`Outcome`](crate::Outcome) the caller receives:
//!
//! - **Classification** of every attempt into a closed set of outcome tags
//! - **Retry** with pluggable backoff and cancellation-aware sleeps
//! - **Stream reading** with incremental message extraction and stall reports
//! - **Byte downloads** with `gzip`/`deflate` decoding and progress
//! - **GraphQL** envelopes
//!
//! # Module Organization
//!
//! ```text
//! client/
//! ├── fetch     - ApiClient and the send shapes
//! ├── classify  - attempt state -> outcome tag
//! ├── retry     - retry policy, backoff schedules, executor
//! ├── parser    - incremental stream message extraction
//! ├── watchdog  - stall reporting for stream reads
//! ├── download  - chunked byte reader with decompression
//! ├── graphql   - GraphQL request/response envelopes
//! ├── config    - client configuration
//! └── utils     - utility functions
//! ```
//!
//! # Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`ApiClient`] | Main request engine |
//! | [`RetryPolicy`] | Retry budget, backoff and predicate |
//! | [`StreamParser`] | Incremental stream message extractor |
//! | [`ByteDownloader`] | Chunked binary reader |
//! | [`GraphQLQuery`] | GraphQL request document |
//! | [`ClientConfig`] | Client configuration options |
//!
//! # Examples
//!
//! ## Creating a Client
//!
//! ```
//! use apiclient_http::client::{ApiClient, ClientConfig};
//!
//! // Default configuration
//! let client = ApiClient::new();
//!
//! // Custom configuration
//! let config = ClientConfig {
//!     max_retries: 5,
//!     retry_delay_ms: 2000,
//!     ..Default::default()
//! };
//! let client = ApiClient::with_config(config);
//! assert_eq!(client.retry_policy().max_retries, 5);
//! ```
//!
//! ## Extracting Stream Messages
//!
//! ```
//! use apiclient_http::client::{StreamEvent, StreamParser};
//!
//! let mut parser = StreamParser::new(4096);
//! let events = parser.feed(b"data: {\"n\": 1}\n\ndata: {\"n\": 2}\n\n");
//! assert_eq!(events.len(), 2);
//! assert_eq!(events[0], StreamEvent::Message("{\"n\": 1}".into()));
//! ```
//!
//! ## Utility Functions
//!
//! ```
//! use apiclient_http::client::exponential_backoff;
//! use std::time::Duration;
//!
//! let delay = exponential_backoff(2, 100);
//! assert_eq!(delay, Duration::from_millis(400));
//! ```

mod classify;
mod config;
mod download;
mod fetch;
mod graphql;
mod parser;
mod retry;
mod utils;
mod watchdog;

pub use classify::{classify_either, classify_plain, classify_typed, AttemptState, Received};
pub use config::{ClientConfig, DEFAULT_RETRY_STATUSES};
pub use download::ByteDownloader;
pub use fetch::ApiClient;
pub use graphql::{classify_graphql, GraphQLError, GraphQLLocation, GraphQLQuery};
pub use parser::{extract_messages, ParseState, StreamEvent, StreamParser};
pub use retry::{execute, Backoff, BackoffSchedule, RetryPolicy, RetryPredicate};
pub use utils::*;
pub use watchdog::{ReadClock, StallWatchdog};
