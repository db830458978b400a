//! Sink configuration.
//!
//! All settings are read once at construction and passed by reference into
//! the worker, accumulator, and sender. There is no live reconfiguration.

use crate::error::{SinkError, SinkResult};
use std::time::Duration;
use tracing::warn;

/// Hard cap on the uncompressed batch size accepted by the ingestion API.
pub const MAX_BATCH_BYTES_CAP: usize = 5 * 1024 * 1024;

/// Default uncompressed batch size limit.
pub const DEFAULT_MAX_BATCH_BYTES: usize = 1024 * 1024;

/// Default event count limit per batch.
pub const DEFAULT_MAX_BATCH_EVENTS: usize = 100;

/// Default gzip compression level.
pub const DEFAULT_GZIP_LEVEL: u32 = 6;

/// Default bounded queue capacity.
pub const DEFAULT_QUEUE_CAPACITY: usize = 10_000;

/// Sink configuration.
#[derive(Debug, Clone)]
pub struct SinkConfig {
    /// Ingestion endpoint URL, used as-is (never rewritten).
    pub endpoint: String,

    /// API token sent as a bearer Authorization header.
    pub token: String,

    /// Extra headers merged verbatim into every delivery request.
    pub custom_headers: Vec<(String, String)>,

    /// Topic allow-list. `None` accepts every topic.
    pub topics: Option<Vec<String>>,

    /// Close the open batch once its serialized size reaches this many bytes.
    pub max_batch_bytes: usize,

    /// Close the open batch once it holds this many events.
    pub max_batch_events: usize,

    /// Close the open batch once this much time has passed since it opened.
    pub flush_interval: Duration,

    /// Per-request HTTP timeout.
    pub request_timeout: Duration,

    /// Retry attempts after the initial delivery attempt.
    pub max_retries: u32,

    /// Exponential backoff base; the delay before retry `n` is `base^n` seconds.
    pub backoff_base: f64,

    /// Ceiling on any single backoff delay.
    pub backoff_max: Duration,

    /// Whether batch payloads are gzip-compressed.
    pub gzip: bool,

    /// Gzip compression level (1-9).
    pub gzip_level: u32,

    /// Bounded event queue capacity; enqueue beyond it drops the event.
    pub queue_capacity: usize,
}

impl SinkConfig {
    /// Create a config with the given endpoint and token and defaults for
    /// everything else.
    pub fn new(endpoint: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            token: token.into(),
            custom_headers: Vec::new(),
            topics: None,
            max_batch_bytes: DEFAULT_MAX_BATCH_BYTES,
            max_batch_events: DEFAULT_MAX_BATCH_EVENTS,
            flush_interval: Duration::from_secs(5),
            request_timeout: Duration::from_secs(30),
            max_retries: 3,
            backoff_base: 2.0,
            backoff_max: Duration::from_secs(60),
            gzip: true,
            gzip_level: DEFAULT_GZIP_LEVEL,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }

    /// Validate and normalize the configuration.
    ///
    /// Missing endpoint or token is an error. Out-of-range values that the
    /// ingestion API would reject are normalized instead: the batch size is
    /// capped at [`MAX_BATCH_BYTES_CAP`] and an invalid gzip level falls back
    /// to [`DEFAULT_GZIP_LEVEL`], both with a warning.
    pub fn validate(&mut self) -> SinkResult<()> {
        if self.endpoint.trim().is_empty() {
            return Err(SinkError::Config("endpoint is required".to_string()));
        }
        if self.token.trim().is_empty() {
            return Err(SinkError::Config("token is required".to_string()));
        }
        if self.max_batch_events == 0 {
            return Err(SinkError::Config(
                "max_batch_events must be at least 1".to_string(),
            ));
        }
        if self.queue_capacity == 0 {
            return Err(SinkError::Config(
                "queue_capacity must be at least 1".to_string(),
            ));
        }
        if !self.backoff_base.is_finite() || self.backoff_base <= 0.0 {
            return Err(SinkError::Config(
                "backoff_base must be a positive number".to_string(),
            ));
        }

        if self.max_batch_bytes > MAX_BATCH_BYTES_CAP {
            warn!(
                requested = self.max_batch_bytes,
                cap = MAX_BATCH_BYTES_CAP,
                "max_batch_bytes exceeds the API limit, capping"
            );
            self.max_batch_bytes = MAX_BATCH_BYTES_CAP;
        }

        if !(1..=9).contains(&self.gzip_level) {
            warn!(
                requested = self.gzip_level,
                default = DEFAULT_GZIP_LEVEL,
                "gzip_level out of range (1-9), using default"
            );
            self.gzip_level = DEFAULT_GZIP_LEVEL;
        }

        Ok(())
    }

    /// Whether an event published under `topic` should enter the queue.
    pub fn accepts_topic(&self, topic: &str) -> bool {
        match &self.topics {
            Some(topics) => topics.iter().any(|t| t == topic),
            None => true,
        }
    }

    /// Parse a `Name: value` header string into a header pair.
    pub fn parse_header(raw: &str) -> SinkResult<(String, String)> {
        let (name, value) = raw
            .split_once(':')
            .ok_or_else(|| SinkError::Config(format!("invalid header (expected 'Name: value'): {raw}")))?;
        let name = name.trim();
        let value = value.trim();
        if name.is_empty() {
            return Err(SinkError::Config(format!("empty header name: {raw}")));
        }
        Ok((name.to_string(), value.to_string()))
    }
}
