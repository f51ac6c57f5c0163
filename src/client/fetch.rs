//! Main request engine.
//!
//! Provides [`ApiClient`], which selects a send shape for an [`ApiRequest`] and
//! wires the URL cache, the retry executor, middleware and the incremental
//! readers around a `reqwest` transport.
//!
//! # Examples
//!
//! ## Typed GET with caching
//!
//! ```ignore
//! use apiclient_http::{ApiClient, ApiRequest, CachePolicy};
//! use std::time::Duration;
//!
//! #[derive(serde::Deserialize)]
//! struct Item { id: u32 }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = ApiClient::new();
//!     let request = ApiRequest::get("http://example.com/items/1")?
//!         .with_cache_policy(CachePolicy::new(Duration::from_secs(60)));
//!
//!     let response = client.send_typed::<Item>(&request).await?;
//!     if let Some(item) = response.content() {
//!         println!("item {}", item.id);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Event stream
//!
//! ```ignore
//! use apiclient_http::{ApiClient, ApiRequest};
//!
//! #[derive(serde::Deserialize)]
//! struct Tick { n: u64 }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = ApiClient::new();
//!     let request = ApiRequest::get("http://example.com/events")?;
//!
//!     client
//!         .send_stream::<Tick, _, _>(
//!             &request,
//!             |response| println!("{:?}", response.kind()),
//!             |stalled| println!("no data for {:?}", stalled),
//!         )
//!         .await?;
//!     Ok(())
//! }
//! ```

use crate::cache::UrlCache;
use crate::cancel::CancelSignal;
use crate::client::classify::{
    classify_either, classify_plain, classify_typed, AttemptState, Received,
};
use crate::client::config::ClientConfig;
use crate::client::download::ByteDownloader;
use crate::client::graphql::{classify_graphql, GraphQLQuery};
use crate::client::parser::{StreamEvent, StreamParser};
use crate::client::retry::{self, RetryPolicy};
use crate::client::watchdog::{ReadClock, StallWatchdog};
use crate::dispatch::{CompletionSink, InlineSink};
use crate::error::{ApiError, Result};
use crate::middleware::{MiddlewarePipeline, RequestInfo, ResponseContext, Stage};
use crate::protocol::{self, constants};
use crate::types::{ApiRequest, ApiResponse, ByteProgress, DownloadStats, Outcome, RequestParts};
use bytes::Bytes;
use futures::StreamExt;
use http::header::{HeaderName, HeaderValue, ACCEPT, ACCEPT_ENCODING};
use http::HeaderMap;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, error};
use url::Url;

#[derive(Default)]
struct DownloadCounters {
    compressed: AtomicU64,
    decompressed: AtomicU64,
}

/// The request engine.
///
/// Cheap to clone; clones share the cache, middleware, default headers and
/// download counters.
///
/// # Features
///
/// - Every outcome classified into a closed set of [`Outcome`] tags
/// - Retry with configurable backoff for buffered requests
/// - In-memory URL cache for `GET`/`HEAD`
/// - Event streams with stall reporting
/// - Byte downloads with decompression and progress
#[derive(Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    config: Arc<ClientConfig>,
    retry: Arc<RetryPolicy>,
    cache: Arc<UrlCache>,
    middleware: Arc<MiddlewarePipeline>,
    sink: Arc<dyn CompletionSink>,
    default_headers: Arc<RwLock<HeaderMap>>,
    downloads: Arc<DownloadCounters>,
}

impl ApiClient {
    /// Create a new client with default configuration
    pub fn new() -> Self {
        Self::with_config(ClientConfig::default())
    }

    /// Create a new client with custom configuration
    ///
    /// Invalid values are logged and replaced with their defaults.
    pub fn with_config(config: ClientConfig) -> Self {
        let config = match config.validate() {
            Ok(()) => config,
            Err(e) => {
                tracing::warn!("{}; falling back to defaults for invalid fields", e);
                config.repaired()
            }
        };

        let mut builder = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .pool_idle_timeout(Duration::from_secs(90));

        if !config.proxy_url.is_empty() {
            match reqwest::Proxy::all(&config.proxy_url) {
                Ok(proxy) => builder = builder.proxy(proxy),
                Err(e) => tracing::warn!("Ignoring invalid proxy '{}': {}", config.proxy_url, e),
            }
        }

        let client = builder.build().unwrap_or_default();

        ApiClient {
            client,
            retry: Arc::new(config.retry_policy()),
            config: Arc::new(config),
            cache: Arc::new(UrlCache::new()),
            middleware: Arc::new(MiddlewarePipeline::new()),
            sink: Arc::new(InlineSink),
            default_headers: Arc::new(RwLock::new(HeaderMap::new())),
            downloads: Arc::new(DownloadCounters::default()),
        }
    }

    /// Replace the retry policy derived from the configuration.
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = Arc::new(policy);
        self
    }

    /// Install a middleware pipeline.
    pub fn with_middleware(mut self, pipeline: MiddlewarePipeline) -> Self {
        self.middleware = Arc::new(pipeline);
        self
    }

    /// Route stream, stall and progress callbacks through `sink`.
    pub fn with_sink(mut self, sink: Arc<dyn CompletionSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Share a cache with other clients.
    pub fn with_cache(mut self, cache: Arc<UrlCache>) -> Self {
        self.cache = cache;
        self
    }

    /// Active configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Active retry policy.
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// The URL cache.
    pub fn cache(&self) -> &UrlCache {
        &self.cache
    }

    /// Set a header sent with every request that does not opt out.
    pub fn set_default_header(&self, name: &str, value: &str) -> Result<()> {
        let header = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| ApiError::InvalidHeader(format!("{}: {}", name, e)))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| ApiError::InvalidHeader(format!("{}: {}", name, e)))?;
        self.default_headers.write().insert(header, value);
        Ok(())
    }

    /// Stop sending a default header.
    pub fn remove_default_header(&self, name: &str) {
        self.default_headers.write().remove(name);
    }

    /// Drop the cached response for `url`.
    pub fn invalidate(&self, url: &str) -> Result<()> {
        let parsed = Url::parse(url).map_err(|e| ApiError::invalid_url(url, e))?;
        self.cache.invalidate(&parsed);
        Ok(())
    }

    /// Drop every cached response.
    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
    }

    /// Compressed vs decompressed bytes across every finished download.
    pub fn download_stats(&self) -> DownloadStats {
        DownloadStats {
            compressed_bytes: self.downloads.compressed.load(Ordering::Relaxed),
            decompressed_bytes: self.downloads.decompressed.load(Ordering::Relaxed),
        }
    }

    /// Send a request that expects no content. `GET`/`HEAD` go through the cache.
    ///
    /// # Errors
    ///
    /// Only misuse is an error: sending the same request twice. Network
    /// outcomes are reported as [`Outcome`] tags.
    pub async fn send(&self, request: &ApiRequest) -> Result<ApiResponse> {
        self.call(request, || async move {
            if request.is_cacheable() {
                self.cache
                    .process(request.url(), request.cache_policy(), || {
                        self.run(request, classify_plain::<Bytes, ()>)
                    })
                    .await
            } else {
                self.run(request, classify_plain::<Bytes, ()>).await
            }
        })
        .await
    }

    /// Send a request and decode a structured body as `T`.
    pub async fn send_typed<T>(&self, request: &ApiRequest) -> Result<ApiResponse<T>>
    where
        T: DeserializeOwned + Send,
    {
        self.call(request, || self.run(request, classify_typed::<T, ()>))
            .await
    }

    /// Send a request and decode a structured body as `T`, or as the error document `E`.
    pub async fn send_either<T, E>(&self, request: &ApiRequest) -> Result<ApiResponse<T, E>>
    where
        T: DeserializeOwned + Send,
        E: DeserializeOwned + Send,
    {
        self.call(request, || self.run(request, classify_either::<T, E>))
            .await
    }

    /// Build a POST of `query` to the configured GraphQL endpoint.
    pub fn graphql_request(&self, query: &GraphQLQuery) -> Result<ApiRequest> {
        let endpoint = self
            .config
            .graphql_endpoint
            .as_deref()
            .ok_or(ApiError::MissingGraphQLEndpoint)?;
        ApiRequest::post(endpoint)?.with_json_body(query)
    }

    /// Send a GraphQL request and decode `data` as `T`.
    pub async fn send_graphql<T>(&self, request: &ApiRequest) -> Result<ApiResponse<T>>
    where
        T: DeserializeOwned + Send,
    {
        self.call(request, || self.run(request, classify_graphql::<T>))
            .await
    }

    /// Download a binary body on a worker task, reporting progress per chunk.
    ///
    /// `GET`/`HEAD` go through the cache. Downloads are not retried.
    pub async fn send_bytes<F>(&self, request: &ApiRequest, on_progress: F) -> Result<ApiResponse>
    where
        F: Fn(ByteProgress) + Send + Sync + 'static,
    {
        let on_progress = Arc::new(on_progress);
        self.call(request, || async move {
            let fetch = || self.spawn_download(request, on_progress.clone());
            if request.is_cacheable() {
                self.cache
                    .process(request.url(), request.cache_policy(), fetch)
                    .await
            } else {
                fetch().await
            }
        })
        .await
    }

    /// Read an event stream on a worker task.
    ///
    /// Each extracted message is delivered to `on_message` as its own response:
    /// `TypedSuccess` when it decodes as `T`, `ParsingFailure` otherwise. The
    /// stream ends silently when the server closes it; cancellation, header
    /// timeouts and transport failures are delivered as a final response.
    /// `on_stall` receives the time since the last read every
    /// `stall_report_interval_ms`. Streams are not retried.
    pub async fn send_stream<T, M, S>(&self, request: &ApiRequest, on_message: M, on_stall: S) -> Result<()>
    where
        T: DeserializeOwned + Send + 'static,
        M: Fn(ApiResponse<T>) + Send + Sync + 'static,
        S: Fn(Duration) + Send + Sync + 'static,
    {
        request.mark_sent()?;
        self.outer_request(request).await;

        let worker = self.clone();
        let parts = request.recreate();
        let cancel = request.cancel_signal().clone();
        let id = request.id().to_string();
        let on_message = Arc::new(on_message);
        let on_stall = Arc::new(on_stall);
        let fallback = on_message.clone();

        let handle = tokio::spawn(async move {
            worker
                .read_stream::<T, M, S>(parts, id, cancel, on_message, on_stall)
                .await
        });
        if let Err(e) = handle.await {
            error!("Stream worker for {} failed: {}", request.url(), e);
            let context = ResponseContext {
                request_id: request.id(),
                url: request.url(),
                from_cache: false,
                attempt: None,
            };
            let outcome = self
                .middleware
                .on_response(
                    Outcome::<T>::network_failure(format!("stream worker failed: {}", e)),
                    &context,
                    Stage::Outer,
                )
                .await;
            let response = ApiResponse::new(outcome, request.url().clone(), request.id().to_string());
            self.sink.post(Box::new(move || fallback(response)));
        }
        Ok(())
    }

    /// Outer stage around a logical call.
    async fn call<T, E, F, Fut>(&self, request: &ApiRequest, body: F) -> Result<ApiResponse<T, E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ApiResponse<T, E>>,
    {
        request.mark_sent()?;
        self.outer_request(request).await;

        let mut response = body().await;

        let context = ResponseContext {
            request_id: request.id(),
            url: request.url(),
            from_cache: response.from_cache,
            attempt: None,
        };
        let outcome = std::mem::replace(&mut response.outcome, Outcome::Aborted);
        response.outcome = self
            .middleware
            .on_response(outcome, &context, Stage::Outer)
            .await;

        if self.config.enable_logging {
            debug!(
                request_id = request.id(),
                from_cache = response.from_cache,
                "{} {} finished: {} {:?}",
                request.method(),
                request.url(),
                response.kind(),
                response.status()
            );
        }
        Ok(response)
    }

    async fn outer_request(&self, request: &ApiRequest) {
        if self.config.enable_logging {
            debug!(request_id = request.id(), "Sending {} {}", request.method(), request.url());
        }
        let info = RequestInfo {
            request_id: request.id(),
            method: request.method(),
            url: request.url(),
            attempt: None,
        };
        self.middleware.on_request(&info, Stage::Outer).await;
    }

    /// Retry loop around single buffered attempts.
    async fn run<T, E, C>(&self, request: &ApiRequest, classify: C) -> ApiResponse<T, E>
    where
        C: Fn(AttemptState, &CancelSignal) -> Outcome<T, E>,
    {
        let cancel = request.cancel_signal();
        let classify = &classify;

        let outcome = retry::execute(&self.retry, cancel, |attempt| {
            let parts = request.recreate();
            async move {
                let url = parts.url.clone();
                self.inner_request(request.id(), &parts, attempt).await;

                let state = self.transmit(parts, cancel).await;
                let outcome = classify(state, cancel);

                let context = ResponseContext {
                    request_id: request.id(),
                    url: &url,
                    from_cache: false,
                    attempt: Some(attempt),
                };
                self.middleware
                    .on_response(outcome, &context, Stage::Inner)
                    .await
            }
        })
        .await;

        ApiResponse::new(outcome, request.url().clone(), request.id().to_string())
    }

    async fn inner_request(&self, request_id: &str, parts: &RequestParts, attempt: u32) {
        let info = RequestInfo {
            request_id,
            method: &parts.method,
            url: &parts.url,
            attempt: Some(attempt),
        };
        self.middleware.on_request(&info, Stage::Inner).await;
    }

    /// One buffered attempt: headers and body under a single deadline.
    async fn transmit(&self, parts: RequestParts, cancel: &CancelSignal) -> AttemptState {
        let deadline = Instant::now() + self.config.request_timeout();
        let response = match self.open(parts, cancel, deadline).await {
            Ok(response) => response,
            Err(state) => return state,
        };

        let status = response.status();
        let headers = response.headers().clone();

        tokio::select! {
            biased;
            _ = cancel.cancelled() => AttemptState::Cancelled,
            body = timeout_at(deadline, response.bytes()) => match body {
                Err(_) => AttemptState::DeadlineElapsed,
                Ok(Err(e)) => AttemptState::from_transport(&e),
                Ok(Ok(body)) => AttemptState::Received(Received { status, headers, body }),
            },
        }
    }

    /// Send and wait for response headers.
    async fn open(
        &self,
        parts: RequestParts,
        cancel: &CancelSignal,
        deadline: Instant,
    ) -> std::result::Result<reqwest::Response, AttemptState> {
        let builder = self.build_request(parts);
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(AttemptState::Cancelled),
            sent = timeout_at(deadline, builder.send()) => match sent {
                Err(_) => Err(AttemptState::DeadlineElapsed),
                Ok(Err(e)) => Err(AttemptState::from_transport(&e)),
                Ok(Ok(response)) => Ok(response),
            },
        }
    }

    fn build_request(&self, parts: RequestParts) -> reqwest::RequestBuilder {
        let RequestParts {
            method,
            url,
            headers: own,
            body,
            bearer,
            use_default_headers,
        } = parts;

        let mut headers = if use_default_headers {
            self.default_headers.read().clone()
        } else {
            HeaderMap::new()
        };
        // Request headers replace defaults with the same name.
        for name in own.keys() {
            headers.remove(name);
        }
        for (name, value) in own.iter() {
            headers.append(name.clone(), value.clone());
        }

        let mut builder = self.client.request(method, url).headers(headers);
        if let Some(token) = bearer {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = body {
            builder = builder.body(body);
        }
        builder
    }

    async fn spawn_download<F>(&self, request: &ApiRequest, on_progress: Arc<F>) -> ApiResponse
    where
        F: Fn(ByteProgress) + Send + Sync + 'static,
    {
        let mut parts = request.recreate();
        if self.config.decompress && !parts.headers.contains_key(ACCEPT_ENCODING) {
            parts.headers.insert(
                ACCEPT_ENCODING,
                HeaderValue::from_static(constants::ACCEPT_ENCODING_COMPRESSED),
            );
        }
        self.inner_request(request.id(), &parts, 0).await;

        let worker = self.clone();
        let cancel = request.cancel_signal().clone();
        let handle = tokio::spawn(async move { worker.download(parts, cancel, on_progress).await });

        let outcome = match handle.await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("Download worker for {} failed: {}", request.url(), e);
                Outcome::network_failure(format!("download worker failed: {}", e))
            }
        };

        let context = ResponseContext {
            request_id: request.id(),
            url: request.url(),
            from_cache: false,
            attempt: Some(0),
        };
        let outcome = self
            .middleware
            .on_response(outcome, &context, Stage::Inner)
            .await;
        ApiResponse::new(outcome, request.url().clone(), request.id().to_string())
    }

    async fn download<F>(&self, parts: RequestParts, cancel: CancelSignal, on_progress: Arc<F>) -> Outcome<Bytes>
    where
        F: Fn(ByteProgress) + Send + Sync + 'static,
    {
        let url = parts.url.clone();
        let deadline = Instant::now() + self.config.request_timeout();
        let response = match self.open(parts, &cancel, deadline).await {
            Ok(response) => response,
            Err(state) => return classify_plain(state, &cancel),
        };

        let status = response.status();
        let headers = response.headers().clone();
        if !status.is_success() {
            return Outcome::Success { status, headers };
        }

        let encoding = protocol::content_encoding(&headers);
        let mut downloader = ByteDownloader::new(
            &encoding,
            self.config.decompress,
            protocol::content_length(&headers),
            self.config.download_chunk_size,
        );
        let mut body = response.bytes_stream();

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Outcome::Aborted,
                next = body.next() => next,
            };
            match next {
                Some(Ok(chunk)) => match downloader.push(&chunk) {
                    Ok(reports) => {
                        for report in reports {
                            self.post_progress(&on_progress, report);
                        }
                    }
                    Err(e) => return corrupt_body(&encoding, e, status, headers),
                },
                Some(Err(e)) => return classify_plain(AttemptState::from_transport(&e), &cancel),
                None => break,
            }
        }

        let (payload, stats, tail) = match downloader.finish() {
            Ok(finished) => finished,
            Err(e) => return corrupt_body(&encoding, e, status, headers),
        };
        if let Some(report) = tail {
            self.post_progress(&on_progress, report);
        }

        self.downloads
            .compressed
            .fetch_add(stats.compressed_bytes, Ordering::Relaxed);
        self.downloads
            .decompressed
            .fetch_add(stats.decompressed_bytes, Ordering::Relaxed);
        if self.config.enable_logging {
            debug!(
                compressed = stats.compressed_bytes,
                decompressed = stats.decompressed_bytes,
                "Downloaded {}",
                url
            );
        }

        Outcome::TypedSuccess {
            status,
            headers,
            body: payload.clone(),
            content: Some(payload),
        }
    }

    fn post_progress<F>(&self, on_progress: &Arc<F>, report: ByteProgress)
    where
        F: Fn(ByteProgress) + Send + Sync + 'static,
    {
        let callback = on_progress.clone();
        self.sink.post(Box::new(move || callback(report)));
    }

    async fn read_stream<T, M, S>(
        &self,
        mut parts: RequestParts,
        id: String,
        cancel: CancelSignal,
        on_message: Arc<M>,
        on_stall: Arc<S>,
    ) where
        T: DeserializeOwned + Send + 'static,
        M: Fn(ApiResponse<T>) + Send + Sync + 'static,
        S: Fn(Duration) + Send + Sync + 'static,
    {
        if !parts.headers.contains_key(ACCEPT) {
            parts
                .headers
                .insert(ACCEPT, HeaderValue::from_static(constants::CONTENT_TYPE_SSE));
        }
        let url = parts.url.clone();
        let emit = StreamEmitter {
            client: self,
            url: &url,
            id: &id,
            on_message: &on_message,
        };

        self.inner_request(&id, &parts, 0).await;
        let deadline = Instant::now() + self.config.request_timeout();
        let response = match self.open(parts, &cancel, deadline).await {
            Ok(response) => response,
            Err(state) => {
                emit.finish::<T>(classify_plain(state, &cancel)).await;
                return;
            }
        };

        let status = response.status();
        let headers = response.headers().clone();
        if !status.is_success() {
            emit.finish::<T>(Outcome::TypedSuccess {
                status,
                headers,
                body: Bytes::new(),
                content: None,
            })
            .await;
            return;
        }

        let clock = ReadClock::new();
        let watchdog = StallWatchdog::spawn(
            clock.clone(),
            self.config.stall_report_interval(),
            self.sink.clone(),
            on_stall,
        );
        let mut parser = StreamParser::new(self.config.stream_buffer_size);
        let mut body = response.bytes_stream();

        'read: loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => break 'read,
                next = body.next() => next,
            };
            let chunk = match next {
                Some(Ok(chunk)) => chunk,
                Some(Err(e)) => {
                    emit.finish::<T>(classify_plain(AttemptState::from_transport(&e), &cancel))
                        .await;
                    break 'read;
                }
                None => break 'read,
            };
            clock.mark_read();

            for event in parser.feed(&chunk) {
                if cancel.is_cancelled() {
                    break 'read;
                }
                emit.send::<T>(decode_event::<T>(event, status, &headers)).await;
            }
        }

        parser.terminate();
        watchdog.stop();
        if cancel.is_cancelled() {
            emit.finish::<T>(Outcome::Aborted).await;
        }
    }
}

impl Default for ApiClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Delivers stream outcomes through middleware and the completion sink.
///
/// Every outcome passes the inner hooks. The outcome that ends the stream
/// (error status, cancellation, timeout, transport failure) also passes the
/// outer hooks.
struct StreamEmitter<'a, M> {
    client: &'a ApiClient,
    url: &'a Url,
    id: &'a str,
    on_message: &'a Arc<M>,
}

impl<M> StreamEmitter<'_, M> {
    async fn send<T>(&self, outcome: Outcome<T>)
    where
        T: Send + 'static,
        M: Fn(ApiResponse<T>) + Send + Sync + 'static,
    {
        self.deliver(outcome, false).await;
    }

    async fn finish<T>(&self, outcome: Outcome<T>)
    where
        T: Send + 'static,
        M: Fn(ApiResponse<T>) + Send + Sync + 'static,
    {
        self.deliver(outcome, true).await;
    }

    async fn deliver<T>(&self, outcome: Outcome<T>, terminal: bool)
    where
        T: Send + 'static,
        M: Fn(ApiResponse<T>) + Send + Sync + 'static,
    {
        let mut context = ResponseContext {
            request_id: self.id,
            url: self.url,
            from_cache: false,
            attempt: Some(0),
        };
        let mut outcome = self
            .client
            .middleware
            .on_response(outcome, &context, Stage::Inner)
            .await;
        if terminal {
            context.attempt = None;
            outcome = self
                .client
                .middleware
                .on_response(outcome, &context, Stage::Outer)
                .await;
        }
        let response = ApiResponse::new(outcome, self.url.clone(), self.id.to_string());
        let callback = self.on_message.clone();
        self.client.sink.post(Box::new(move || callback(response)));
    }
}

fn decode_event<T: DeserializeOwned>(
    event: StreamEvent,
    status: http::StatusCode,
    headers: &HeaderMap,
) -> Outcome<T> {
    match event {
        StreamEvent::Message(text) => match serde_json::from_str::<T>(&text) {
            Ok(content) => Outcome::TypedSuccess {
                status,
                headers: headers.clone(),
                body: Bytes::from(text),
                content: Some(content),
            },
            Err(e) => Outcome::ParsingFailure {
                reason: e.to_string(),
                body: Bytes::from(text),
                status: Some(status),
                headers: Some(headers.clone()),
            },
        },
        StreamEvent::Unstructured(text) => Outcome::ParsingFailure {
            reason: "no structured message found".to_string(),
            body: Bytes::from(text),
            status: Some(status),
            headers: Some(headers.clone()),
        },
    }
}

fn corrupt_body(
    encoding: &protocol::ContentEncoding,
    err: std::io::Error,
    status: http::StatusCode,
    headers: HeaderMap,
) -> Outcome<Bytes> {
    Outcome::ParsingFailure {
        reason: format!("failed to decode {:?} body: {}", encoding, err),
        body: Bytes::new(),
        status: Some(status),
        headers: Some(headers),
    }
}
