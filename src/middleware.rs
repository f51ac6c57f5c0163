//! Request and response hooks.
//!
//! A [`Middleware`] observes every request the engine makes at two stages:
//!
//! | Stage | Fires |
//! |-------|-------|
//! | [`Stage::Outer`] | once per logical call, around the whole retry loop |
//! | [`Stage::Inner`] | once per physical attempt, and once per dispatched stream message |
//!
//! Response hooks may replace an outcome with a failure through an
//! [`Override`]. An `Aborted` outcome is never overridden.
//!
//! # Usage
//!
//! ```ignore
//! use apiclient_http::middleware::{LoggingMiddleware, MiddlewarePipeline};
//! use apiclient_http::ApiClient;
//!
//! let client = ApiClient::new()
//!     .with_middleware(MiddlewarePipeline::new().with(LoggingMiddleware::default()));
//! ```

use crate::types::{Outcome, ResponseKind};
use async_trait::async_trait;
use http::{Method, StatusCode};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Where in the call a hook fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Once per logical call
    Outer,
    /// Once per physical attempt or stream message
    Inner,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Outer => "outer",
            Stage::Inner => "inner",
        })
    }
}

/// What a request hook sees.
#[derive(Debug, Clone)]
pub struct RequestInfo<'a> {
    /// Correlation id
    pub request_id: &'a str,
    /// HTTP method
    pub method: &'a Method,
    /// Target URL
    pub url: &'a Url,
    /// Attempt index for inner hooks
    pub attempt: Option<u32>,
}

/// What a response hook sees.
#[derive(Debug, Clone)]
pub struct ResponseInfo<'a> {
    /// Correlation id
    pub request_id: &'a str,
    /// Request URL
    pub url: &'a Url,
    /// Outcome tag
    pub kind: ResponseKind,
    /// Status, when a response was received
    pub status: Option<StatusCode>,
    /// Failure reason, if any
    pub reason: Option<String>,
    /// Whether the response came from the URL cache
    pub from_cache: bool,
    /// Attempt index for inner hooks
    pub attempt: Option<u32>,
}

impl ResponseInfo<'_> {
    /// No failure tag and a status below 400.
    pub fn has_no_errors(&self) -> bool {
        !self.kind.is_failure() && self.status.is_some_and(|s| s.as_u16() < 400)
    }
}

/// Replacement outcome requested by a response hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Override {
    /// Replace with a network failure
    NetworkFailure(String),
    /// Replace with a timeout
    Timeout,
    /// Replace with a parsing failure; the body and status are kept
    ParsingFailure(String),
}

impl Override {
    /// Apply to `outcome`. `Aborted` is returned unchanged.
    pub fn apply<T, E>(self, outcome: Outcome<T, E>) -> Outcome<T, E> {
        if outcome.is_aborted() {
            return outcome;
        }
        match self {
            Override::NetworkFailure(reason) => Outcome::NetworkFailure { reason },
            Override::Timeout => Outcome::Timeout,
            Override::ParsingFailure(reason) => Outcome::ParsingFailure {
                reason,
                body: outcome.body().cloned().unwrap_or_default(),
                status: outcome.status(),
                headers: outcome.headers().cloned(),
            },
        }
    }
}

/// Request/response hook.
#[async_trait]
pub trait Middleware: Send + Sync {
    /// Called before a call (outer) or an attempt (inner) is made.
    async fn process_request(&self, _request: &RequestInfo<'_>, _stage: Stage) {}

    /// Called with each classified outcome. Returning `Some` replaces it.
    async fn process_response(&self, _response: &ResponseInfo<'_>, _stage: Stage) -> Option<Override> {
        None
    }
}

/// Ordered list of middleware.
#[derive(Clone, Default)]
pub struct MiddlewarePipeline {
    layers: Vec<Arc<dyn Middleware>>,
}

impl MiddlewarePipeline {
    /// Empty pipeline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a middleware.
    pub fn with<M: Middleware + 'static>(mut self, middleware: M) -> Self {
        self.layers.push(Arc::new(middleware));
        self
    }

    /// Append a shared middleware.
    pub fn with_shared(mut self, middleware: Arc<dyn Middleware>) -> Self {
        self.layers.push(middleware);
        self
    }

    /// Check if no middleware is installed.
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Run every request hook in order.
    pub async fn on_request(&self, request: &RequestInfo<'_>, stage: Stage) {
        for layer in &self.layers {
            layer.process_request(request, stage).await;
        }
    }

    /// Run every response hook in order, applying overrides as they come.
    pub async fn on_response<T, E>(
        &self,
        mut outcome: Outcome<T, E>,
        context: &ResponseContext<'_>,
        stage: Stage,
    ) -> Outcome<T, E> {
        for layer in &self.layers {
            let info = context.describe(&outcome);
            let Some(replacement) = layer.process_response(&info, stage).await else {
                continue;
            };
            if outcome.is_aborted() {
                debug!(request_id = context.request_id, "Ignoring override of aborted request");
                continue;
            }
            outcome = replacement.apply(outcome);
        }
        outcome
    }
}

/// Call-level facts attached to every [`ResponseInfo`].
#[derive(Debug, Clone, Copy)]
pub struct ResponseContext<'a> {
    /// Correlation id
    pub request_id: &'a str,
    /// Request URL
    pub url: &'a Url,
    /// Served from cache
    pub from_cache: bool,
    /// Attempt index for inner hooks
    pub attempt: Option<u32>,
}

impl<'a> ResponseContext<'a> {
    fn describe<T, E>(&self, outcome: &Outcome<T, E>) -> ResponseInfo<'a> {
        ResponseInfo {
            request_id: self.request_id,
            url: self.url,
            kind: outcome.kind(),
            status: outcome.status(),
            reason: outcome.reason().map(str::to_string),
            from_cache: self.from_cache,
            attempt: self.attempt,
        }
    }
}

/// Logs every request and response through `tracing`.
///
/// Failures and error statuses are logged at warn level, everything else at debug.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingMiddleware;

#[async_trait]
impl Middleware for LoggingMiddleware {
    async fn process_request(&self, request: &RequestInfo<'_>, stage: Stage) {
        debug!(
            request_id = request.request_id,
            %stage,
            attempt = ?request.attempt,
            "Request -> {} {}",
            request.method,
            request.url
        );
    }

    async fn process_response(&self, response: &ResponseInfo<'_>, stage: Stage) -> Option<Override> {
        if response.has_no_errors() {
            debug!(
                request_id = response.request_id,
                %stage,
                from_cache = response.from_cache,
                "Response <- {} {:?} {}",
                response.kind,
                response.status,
                response.url
            );
        } else {
            warn!(
                request_id = response.request_id,
                %stage,
                reason = response.reason.as_deref().unwrap_or(""),
                "Response <- {} {:?} {}",
                response.kind,
                response.status,
                response.url
            );
        }
        None
    }
}

/// Adds a fixed latency before each request at one stage.
#[derive(Debug, Clone, Copy)]
pub struct DelayMiddleware {
    delay: Duration,
    stage: Stage,
}

impl DelayMiddleware {
    /// Sleep `delay` before every request hook at `stage`.
    pub fn new(delay: Duration, stage: Stage) -> Self {
        DelayMiddleware { delay, stage }
    }
}

#[async_trait]
impl Middleware for DelayMiddleware {
    async fn process_request(&self, _request: &RequestInfo<'_>, stage: Stage) {
        if stage == self.stage {
            tokio::time::sleep(self.delay).await;
        }
    }
}
