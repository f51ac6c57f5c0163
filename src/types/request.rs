//! Request description and lifecycle state.
//!
//! An [`ApiRequest`] is a one-shot handle: the engine transmits it at most once.
//! Its physical attempts are built from [`RequestParts`], which are immutable
//! once the request is sent. Every retry asks the request for a fresh copy of
//! its parts, either by cloning the originals or by calling a factory set with
//! [`ApiRequest::with_factory`].
//!
//! # Examples
//!
//! ```
//! use apiclient_http::types::ApiRequest;
//! use apiclient_http::cache::CachePolicy;
//! use std::time::Duration;
//!
//! let request = ApiRequest::get("http://example.com/items")
//!     .unwrap()
//!     .with_header("x-trace", "on")
//!     .unwrap()
//!     .with_bearer("token")
//!     .with_cache_policy(CachePolicy::new(Duration::from_secs(30)));
//!
//! assert_eq!(request.parts().method, http::Method::GET);
//! assert!(request.cache_policy().is_some());
//! ```

use crate::cache::CachePolicy;
use crate::cancel::CancelSignal;
use crate::error::{ApiError, Result};
use bytes::Bytes;
use http::header::{HeaderName, HeaderValue, CONTENT_TYPE};
use http::{HeaderMap, Method};
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use url::Url;

/// Everything needed to build one physical attempt.
#[derive(Debug, Clone)]
pub struct RequestParts {
    /// HTTP method
    pub method: Method,
    /// Target URL
    pub url: Url,
    /// Request headers
    pub headers: HeaderMap,
    /// Optional body
    pub body: Option<Bytes>,
    /// Optional bearer credential
    pub bearer: Option<String>,
    /// Whether the client's default headers are merged in
    pub use_default_headers: bool,
}

impl RequestParts {
    /// Parts for `method url` with no headers and no body.
    pub fn new(method: Method, url: Url) -> Self {
        RequestParts {
            method,
            url,
            headers: HeaderMap::new(),
            body: None,
            bearer: None,
            use_default_headers: true,
        }
    }
}

/// Builds fresh parts for each attempt.
pub type RequestFactory = Arc<dyn Fn() -> RequestParts + Send + Sync>;

/// A logical request.
pub struct ApiRequest {
    parts: RequestParts,
    factory: Option<RequestFactory>,
    cancel: CancelSignal,
    cache_policy: Option<CachePolicy>,
    id: String,
    sent: AtomicBool,
}

impl ApiRequest {
    /// Create a request, parsing `url`.
    pub fn new(method: Method, url: &str) -> Result<Self> {
        let parsed = Url::parse(url).map_err(|e| ApiError::invalid_url(url, e))?;
        Ok(Self::from_parts(RequestParts::new(method, parsed)))
    }

    /// Create a request from prepared parts.
    pub fn from_parts(parts: RequestParts) -> Self {
        ApiRequest {
            parts,
            factory: None,
            cancel: CancelSignal::new(),
            cache_policy: None,
            id: uuid::Uuid::new_v4().to_string(),
            sent: AtomicBool::new(false),
        }
    }

    /// `GET url`
    pub fn get(url: &str) -> Result<Self> {
        Self::new(Method::GET, url)
    }

    /// `POST url`
    pub fn post(url: &str) -> Result<Self> {
        Self::new(Method::POST, url)
    }

    /// `PUT url`
    pub fn put(url: &str) -> Result<Self> {
        Self::new(Method::PUT, url)
    }

    /// `DELETE url`
    pub fn delete(url: &str) -> Result<Self> {
        Self::new(Method::DELETE, url)
    }

    /// Add a header. Repeated names are appended, not replaced.
    pub fn with_header(mut self, name: &str, value: &str) -> Result<Self> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| ApiError::InvalidHeader(format!("{}: {}", name, e)))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| ApiError::InvalidHeader(format!("{}: {}", name, e)))?;
        self.parts.headers.append(name, value);
        Ok(self)
    }

    /// Set a raw body.
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.parts.body = Some(body.into());
        self
    }

    /// Serialise `value` as the JSON body and set `Content-Type`.
    pub fn with_json_body<B: Serialize + ?Sized>(mut self, value: &B) -> Result<Self> {
        let body = serde_json::to_vec(value)?;
        self.parts.headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static(crate::protocol::constants::CONTENT_TYPE_JSON),
        );
        self.parts.body = Some(Bytes::from(body));
        Ok(self)
    }

    /// Attach a bearer credential.
    pub fn with_bearer(mut self, token: impl Into<String>) -> Self {
        self.parts.bearer = Some(token.into());
        self
    }

    /// Share a caller-owned cancellation signal.
    pub fn with_cancel(mut self, cancel: CancelSignal) -> Self {
        self.cancel = cancel;
        self
    }

    /// Enable cache writes (and `force_expire`) for this request.
    pub fn with_cache_policy(mut self, policy: CachePolicy) -> Self {
        self.cache_policy = Some(policy);
        self
    }

    /// Build every attempt from `factory` instead of cloning the parts.
    pub fn with_factory<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> RequestParts + Send + Sync + 'static,
    {
        self.factory = Some(Arc::new(factory));
        self
    }

    /// Skip the client's default headers.
    pub fn without_default_headers(mut self) -> Self {
        self.parts.use_default_headers = false;
        self
    }

    /// Parts as built.
    pub fn parts(&self) -> &RequestParts {
        &self.parts
    }

    /// Target URL.
    pub fn url(&self) -> &Url {
        &self.parts.url
    }

    /// HTTP method.
    pub fn method(&self) -> &Method {
        &self.parts.method
    }

    /// Correlation id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Cache policy, if any.
    pub fn cache_policy(&self) -> Option<&CachePolicy> {
        self.cache_policy.as_ref()
    }

    /// Cancellation signal observed by every operation on this request.
    pub fn cancel_signal(&self) -> &CancelSignal {
        &self.cancel
    }

    /// Cancel the request.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Whether the request was already handed to the engine.
    pub fn is_sent(&self) -> bool {
        self.sent.load(Ordering::SeqCst)
    }

    /// Claim the request for transmission. Fails on the second call.
    pub(crate) fn mark_sent(&self) -> Result<()> {
        if self.sent.swap(true, Ordering::SeqCst) {
            return Err(ApiError::AlreadySent {
                request_id: self.id.clone(),
            });
        }
        Ok(())
    }

    /// Fresh parts for the next attempt.
    pub(crate) fn recreate(&self) -> RequestParts {
        match &self.factory {
            Some(factory) => factory(),
            None => self.parts.clone(),
        }
    }

    /// Whether responses to this request may be cached.
    pub(crate) fn is_cacheable(&self) -> bool {
        matches!(self.parts.method, Method::GET | Method::HEAD)
    }
}

impl fmt::Debug for ApiRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiRequest")
            .field("id", &self.id)
            .field("method", &self.parts.method)
            .field("url", &self.parts.url.as_str())
            .field("has_factory", &self.factory.is_some())
            .field("sent", &self.is_sent())
            .finish()
    }
}
