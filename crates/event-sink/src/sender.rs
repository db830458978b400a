//! HTTP delivery with differentiated retry semantics.
//!
//! One POST per batch against the configured endpoint, over a single pooled
//! `reqwest` client built at construction. Deliveries are strictly
//! sequential (the worker never has two batches in flight), so the client
//! needs no locking beyond its own connection pool.

use crate::config::SinkConfig;
use crate::error::{SinkError, SinkResult};
use reqwest::header::{
    HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_ENCODING, CONTENT_TYPE,
};
use reqwest::StatusCode;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, warn};

/// Delivery client for batch payloads.
pub struct DeliverySender {
    client: reqwest::Client,
    endpoint: String,
    max_retries: u32,
    backoff_base: f64,
    backoff_max: Duration,
}

impl DeliverySender {
    /// Build the pooled client with auth and custom headers baked in as
    /// request defaults.
    pub fn new(config: &SinkConfig) -> SinkResult<Self> {
        let mut headers = HeaderMap::new();

        let mut auth = HeaderValue::from_str(&format!("Bearer {}", config.token))
            .map_err(|e| SinkError::Config(format!("invalid token: {e}")))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        for (name, value) in &config.custom_headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| SinkError::Config(format!("invalid header name '{name}': {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| SinkError::Config(format!("invalid header value for '{name}': {e}")))?;
            headers.insert(name, value);
        }

        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            max_retries: config.max_retries,
            backoff_base: config.backoff_base,
            backoff_max: config.backoff_max,
        })
    }

    /// Deliver one batch payload, retrying retryable failures.
    ///
    /// Outcome classification: 2xx succeeds, 4xx fails terminally on the
    /// first response (a retry cannot fix a malformed or unauthorized
    /// request), and 5xx or transport errors are retried up to
    /// `max_retries` additional attempts with exponential backoff.
    ///
    /// `cancel` is the shutdown signal: when it fires mid-backoff the
    /// remaining wait is skipped so the worker can proceed to its drain.
    /// The attempt budget itself is never cut short. The drain's final
    /// delivery passes `None` and keeps the normal backoff schedule.
    pub async fn deliver(
        &self,
        payload: &[u8],
        content_encoding: Option<&str>,
        mut cancel: Option<watch::Receiver<bool>>,
    ) -> SinkResult<()> {
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;

            let error = match self.attempt(payload, content_encoding).await {
                Ok(()) => {
                    debug!(attempt, payload_bytes = payload.len(), "batch delivered");
                    return Ok(());
                }
                Err(error) => error,
            };

            if !is_retryable(&error) {
                return Err(error);
            }
            if attempt > self.max_retries {
                warn!(attempt, error = %error, "retry budget exhausted");
                return Err(SinkError::RetriesExhausted { attempts: attempt });
            }

            let delay = self.backoff_delay(attempt);
            warn!(
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "delivery failed, retrying"
            );
            self.backoff(delay, cancel.as_mut()).await;
        }
    }

    async fn attempt(&self, payload: &[u8], content_encoding: Option<&str>) -> SinkResult<()> {
        let mut request = self.client.post(&self.endpoint).body(payload.to_vec());
        if let Some(encoding) = content_encoding {
            request = request.header(CONTENT_ENCODING, encoding);
        }

        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let message = response.text().await.unwrap_or_default();
        Err(SinkError::Status {
            status: status.as_u16(),
            message,
        })
    }

    /// Delay before the retry that follows failed attempt `attempt`:
    /// `backoff_base^attempt` seconds, capped at `backoff_max`.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(i32::MAX as u32) as i32;
        let secs = self.backoff_base.powi(exponent);
        Duration::try_from_secs_f64(secs)
            .unwrap_or(self.backoff_max)
            .min(self.backoff_max)
    }

    async fn backoff(&self, delay: Duration, cancel: Option<&mut watch::Receiver<bool>>) {
        match cancel {
            Some(rx) => {
                if *rx.borrow() {
                    // Shutdown already requested: skip the wait entirely.
                    return;
                }
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = rx.changed() => {
                        debug!("backoff interrupted by shutdown");
                    }
                }
            }
            None => tokio::time::sleep(delay).await,
        }
    }
}

/// Whether a failed attempt is worth retrying.
///
/// Network and timeout errors are retryable, as are 5xx responses. Any
/// other HTTP status is terminal.
fn is_retryable(error: &SinkError) -> bool {
    match error {
        SinkError::Http(_) => true,
        SinkError::Status { status, .. } => StatusCode::from_u16(*status)
            .map(|s| s.is_server_error())
            .unwrap_or(false),
        _ => false,
    }
}
