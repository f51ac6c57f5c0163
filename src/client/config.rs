//! Client configuration.
//!
//! Configuration can be built in code, loaded from JSON, or overridden from
//! `APICLIENT_*` environment variables:
//!
//! | Variable | Field |
//! |----------|-------|
//! | `APICLIENT_MAX_RETRIES` | `max_retries` |
//! | `APICLIENT_RETRY_DELAY_MS` | `retry_delay_ms` |
//! | `APICLIENT_MAX_RETRY_DELAY_MS` | `max_retry_delay_ms` |
//! | `APICLIENT_TIMEOUT_MS` | `request_timeout_ms` |
//! | `APICLIENT_STREAM_BUFFER_SIZE` | `stream_buffer_size` |
//! | `APICLIENT_DOWNLOAD_CHUNK_SIZE` | `download_chunk_size` |
//! | `APICLIENT_STALL_INTERVAL_MS` | `stall_report_interval_ms` |
//! | `APICLIENT_GRAPHQL_ENDPOINT` | `graphql_endpoint` |
//! | `APICLIENT_PROXY` | `proxy_url` |
//! | `APICLIENT_LOGGING` | `enable_logging` |

use crate::client::retry::{Backoff, RetryPolicy};
use crate::error::{ApiError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Statuses retried by default.
pub const DEFAULT_RETRY_STATUSES: [u16; 4] = [408, 500, 502, 504];

/// Configuration for [`ApiClient`](crate::client::ApiClient).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Retries after the first attempt (`3` means up to four attempts)
    pub max_retries: u32,
    /// Base backoff delay in milliseconds
    pub retry_delay_ms: u64,
    /// Upper bound on a single backoff delay in milliseconds
    pub max_retry_delay_ms: u64,
    /// Statuses treated as transient
    pub retry_statuses: Vec<u16>,
    /// Deadline for response headers in milliseconds
    pub request_timeout_ms: u64,
    /// Maximum bytes handed to the stream parser per read
    pub stream_buffer_size: usize,
    /// Maximum bytes processed per download progress report
    pub download_chunk_size: usize,
    /// Interval between stall reports in milliseconds
    pub stall_report_interval_ms: u64,
    /// Request compressed downloads and decode them
    pub decompress: bool,
    /// Endpoint used by [`ApiClient::graphql_request`](crate::client::ApiClient::graphql_request)
    pub graphql_endpoint: Option<String>,
    /// Proxy for every request; empty for none
    pub proxy_url: String,
    /// `User-Agent` sent with every request
    pub user_agent: String,
    /// Emit request lifecycle logs
    pub enable_logging: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            max_retries: 3,
            retry_delay_ms: 1000,
            max_retry_delay_ms: 30_000,
            retry_statuses: DEFAULT_RETRY_STATUSES.to_vec(),
            request_timeout_ms: 10_000,
            stream_buffer_size: 4096,
            download_chunk_size: 8192,
            stall_report_interval_ms: 1000,
            decompress: true,
            graphql_endpoint: None,
            proxy_url: String::new(),
            user_agent: concat!("apiclient_http/", env!("CARGO_PKG_VERSION")).to_string(),
            enable_logging: true,
        }
    }
}

impl ClientConfig {
    /// Parse a JSON document. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: ClientConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults with environment overrides applied.
    pub fn from_env() -> Result<Self> {
        let mut config = ClientConfig::default();
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Apply `APICLIENT_*` overrides from the process environment.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        fn parse<V: std::str::FromStr>(key: &str, raw: &str) -> Result<V> {
            raw.trim()
                .parse()
                .map_err(|_| ApiError::Config(format!("{} has invalid value '{}'", key, raw)))
        }

        if let Some(v) = lookup("APICLIENT_MAX_RETRIES") {
            self.max_retries = parse("APICLIENT_MAX_RETRIES", &v)?;
        }
        if let Some(v) = lookup("APICLIENT_RETRY_DELAY_MS") {
            self.retry_delay_ms = parse("APICLIENT_RETRY_DELAY_MS", &v)?;
        }
        if let Some(v) = lookup("APICLIENT_MAX_RETRY_DELAY_MS") {
            self.max_retry_delay_ms = parse("APICLIENT_MAX_RETRY_DELAY_MS", &v)?;
        }
        if let Some(v) = lookup("APICLIENT_TIMEOUT_MS") {
            self.request_timeout_ms = parse("APICLIENT_TIMEOUT_MS", &v)?;
        }
        if let Some(v) = lookup("APICLIENT_STREAM_BUFFER_SIZE") {
            self.stream_buffer_size = parse("APICLIENT_STREAM_BUFFER_SIZE", &v)?;
        }
        if let Some(v) = lookup("APICLIENT_DOWNLOAD_CHUNK_SIZE") {
            self.download_chunk_size = parse("APICLIENT_DOWNLOAD_CHUNK_SIZE", &v)?;
        }
        if let Some(v) = lookup("APICLIENT_STALL_INTERVAL_MS") {
            self.stall_report_interval_ms = parse("APICLIENT_STALL_INTERVAL_MS", &v)?;
        }
        if let Some(v) = lookup("APICLIENT_GRAPHQL_ENDPOINT") {
            self.graphql_endpoint = Some(v).filter(|s| !s.is_empty());
        }
        if let Some(v) = lookup("APICLIENT_PROXY") {
            self.proxy_url = v;
        }
        if let Some(v) = lookup("APICLIENT_LOGGING") {
            self.enable_logging = matches!(v.trim(), "1" | "true" | "yes" | "on");
        }
        self.validate()
    }

    /// Reject values the engine cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.stream_buffer_size == 0 {
            return Err(ApiError::Config("stream_buffer_size must be positive".into()));
        }
        if self.download_chunk_size == 0 {
            return Err(ApiError::Config("download_chunk_size must be positive".into()));
        }
        if self.stall_report_interval_ms == 0 {
            return Err(ApiError::Config(
                "stall_report_interval_ms must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Replace every value [`validate`](Self::validate) rejects with its default.
    pub fn repaired(mut self) -> Self {
        let defaults = ClientConfig::default();
        if self.stream_buffer_size == 0 {
            self.stream_buffer_size = defaults.stream_buffer_size;
        }
        if self.download_chunk_size == 0 {
            self.download_chunk_size = defaults.download_chunk_size;
        }
        if self.stall_report_interval_ms == 0 {
            self.stall_report_interval_ms = defaults.stall_report_interval_ms;
        }
        self
    }

    /// Header deadline as a `Duration`.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Stall report interval as a `Duration`.
    pub fn stall_report_interval(&self) -> Duration {
        Duration::from_millis(self.stall_report_interval_ms)
    }

    /// Retry policy derived from this configuration: exponential backoff over
    /// the configured statuses.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            backoff: Backoff::Exponential {
                base: Duration::from_millis(self.retry_delay_ms),
                max: Duration::from_millis(self.max_retry_delay_ms),
            },
            retry_statuses: self.retry_statuses.clone(),
            log_retries: self.enable_logging,
            ..RetryPolicy::default()
        }
    }
}
