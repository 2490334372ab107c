//! HTTP/HTTPS Sink - Batches to a Collection Server
//!
//! ## Overview
//!
//! Posts flush batches to a REST endpoint as JSON:
//!
//! ```json
//! { "count": 2, "readings": [ { "sensor_id": "SG-01", ... }, ... ] }
//! ```
//!
//! Large batches are split into chunks of `batch_size` readings. A batch only
//! counts as persisted once every chunk was accepted (2xx).
//!
//! ## Retries
//!
//! - **5xx and 429**: retried with exponential backoff (200ms, 400ms, ...)
//! - **Transport errors**: retried the same way
//! - **Other 4xx**: fail immediately, the server will not change its mind
//!
//! All attempts share the flush timeout handed to `persist`. When the next
//! backoff would overrun it, the call gives up with a timeout and the
//! aggregator keeps the batch for the next flush. Chunks already accepted are
//! sent again on that retry, so the server should tolerate duplicates.
//!
//! ## Example Usage
//!
//! ```no_run
//! use strainscope_connectors::{HttpConfig, HttpSink};
//!
//! let config = HttpConfig::new("https://collector.example.com")
//!     .path("/api/v1/readings/batch")
//!     .bearer_token("your-api-token")
//!     .timeout_secs(5)
//!     .batch_size(500);
//!
//! let sink = HttpSink::new(config)?;
//! # Ok::<(), strainscope_connectors::HttpError>(())
//! ```

use std::collections::HashMap;
use std::thread;
use std::time::{Duration, Instant};

use base64::Engine as _;
use thiserror::Error;

use strainscope_core::{DurableSink, Reading, SinkError};

use crate::{ConnectionStats, StatsCell};

/// HTTP-specific errors
#[derive(Debug, Error)]
pub enum HttpError {
    /// Network or request error
    #[error("Request failed: {0}")]
    Request(String),

    /// Server returned error status
    #[error("Server error {status}: {message}")]
    ServerError { status: u16, message: String },

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Flush timeout spent before the batch was accepted
    #[error("Timed out after {0} ms")]
    Timeout(u64),
}

impl HttpError {
    fn is_retryable(&self) -> bool {
        match self {
            HttpError::Request(_) => true,
            HttpError::ServerError { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

impl From<HttpError> for SinkError {
    fn from(err: HttpError) -> Self {
        match err {
            HttpError::Request(msg) => SinkError::Unavailable(msg),
            HttpError::ServerError { .. } => SinkError::Write(err.to_string()),
            HttpError::Serialization(msg) => SinkError::Serialization(msg),
            HttpError::Config(msg) => SinkError::Unavailable(msg),
            HttpError::Timeout(ms) => SinkError::Timeout(ms),
        }
    }
}

/// HTTP configuration
#[derive(Clone, Debug)]
pub struct HttpConfig {
    /// Base URL of the collection server
    pub base_url: String,
    /// Path the batches are posted to
    pub path: String,
    /// Upper bound for a single request; the flush timeout may cut it shorter
    pub timeout: Duration,
    /// Authentication method
    pub auth: AuthMethod,
    /// Custom headers
    pub headers: HashMap<String, String>,
    /// Readings per request
    pub batch_size: usize,
    /// Retries per chunk
    pub max_retries: u32,
    /// User agent string
    pub user_agent: String,
}

/// Authentication methods
#[derive(Clone, Debug)]
pub enum AuthMethod {
    None,
    Bearer(String),
    Basic { username: String, password: String },
    /// API key in a custom header
    ApiKey { header: String, value: String },
}

impl HttpConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            path: "/api/v1/readings/batch".into(),
            timeout: Duration::from_secs(30),
            auth: AuthMethod::None,
            headers: HashMap::new(),
            batch_size: 100,
            max_retries: 3,
            user_agent: format!("StrainScope/{}", env!("CARGO_PKG_VERSION")),
        }
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    pub fn bearer_token(mut self, token: impl Into<String>) -> Self {
        self.auth = AuthMethod::Bearer(token.into());
        self
    }

    pub fn basic_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.auth = AuthMethod::Basic {
            username: username.into(),
            password: password.into(),
        };
        self
    }

    pub fn api_key(mut self, header: impl Into<String>, value: impl Into<String>) -> Self {
        self.auth = AuthMethod::ApiKey {
            header: header.into(),
            value: value.into(),
        };
        self
    }

    /// Set request timeout in seconds
    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    pub fn batch_size(mut self, size: usize) -> Self {
        self.batch_size = size;
        self
    }

    pub fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    fn url(&self) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), self.path)
    }
}

/// Blocking HTTP sink on a pooled ureq agent
pub struct HttpSink {
    config: HttpConfig,
    url: String,
    agent: ureq::Agent,
    stats: StatsCell,
}

impl HttpSink {
    pub fn new(config: HttpConfig) -> Result<Self, HttpError> {
        if !config.base_url.starts_with("http://") && !config.base_url.starts_with("https://") {
            return Err(HttpError::Config("Base URL must start with http:// or https://".into()));
        }
        if config.batch_size == 0 {
            return Err(HttpError::Config("batch_size must be at least 1".into()));
        }

        let agent = ureq::AgentBuilder::new()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build();
        let url = config.url();
        log::info!("http sink posting to {}", url);

        Ok(Self {
            config,
            url,
            agent,
            stats: StatsCell::default(),
        })
    }

    pub fn stats(&self) -> ConnectionStats {
        self.stats.snapshot()
    }

    fn build_request(&self, request_timeout: Duration) -> ureq::Request {
        let mut request = self.agent.post(&self.url).timeout(request_timeout);

        match &self.config.auth {
            AuthMethod::None => {}
            AuthMethod::Bearer(token) => {
                request = request.set("Authorization", &format!("Bearer {}", token));
            }
            AuthMethod::Basic { username, password } => {
                let credentials = base64::engine::general_purpose::STANDARD
                    .encode(format!("{}:{}", username, password));
                request = request.set("Authorization", &format!("Basic {}", credentials));
            }
            AuthMethod::ApiKey { header, value } => {
                request = request.set(header, value);
            }
        }

        for (name, value) in &self.config.headers {
            request = request.set(name, value);
        }

        request
            .set("Content-Type", "application/json")
            .set("Accept", "application/json")
    }

    fn post_once(&self, body: &str, request_timeout: Duration) -> Result<(), HttpError> {
        match self.build_request(request_timeout).send_string(body) {
            Ok(_) => Ok(()),
            Err(ureq::Error::Status(status, resp)) => Err(HttpError::ServerError {
                status,
                message: resp.into_string().unwrap_or_default(),
            }),
            Err(ureq::Error::Transport(e)) => Err(HttpError::Request(e.to_string())),
        }
    }

    /// Post one chunk, retrying within `deadline`
    fn post_chunk(&self, body: &str, deadline: Instant, budget_ms: u64) -> Result<(), HttpError> {
        let mut attempt = 0u32;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(HttpError::Timeout(budget_ms));
            }

            let err = match self.post_once(body, remaining.min(self.config.timeout)) {
                Ok(()) => return Ok(()),
                Err(e) => e,
            };
            if !err.is_retryable() || attempt >= self.config.max_retries {
                return Err(err);
            }

            attempt += 1;
            let delay = Duration::from_millis(100 * (1u64 << attempt.min(16)));
            if Instant::now() + delay >= deadline {
                log::debug!("giving up on {} after {} attempts: {}", self.url, attempt, err);
                return Err(HttpError::Timeout(budget_ms));
            }
            log::debug!("retrying {} in {:?}: {}", self.url, delay, err);
            self.stats.record_retry();
            thread::sleep(delay);
        }
    }

    fn send_batch(&self, batch: &[Reading], timeout: Duration) -> Result<usize, HttpError> {
        let deadline = Instant::now() + timeout;
        let budget_ms = timeout.as_millis() as u64;
        let mut bytes = 0;

        for chunk in batch.chunks(self.config.batch_size) {
            let body = serde_json::to_string(&serde_json::json!({
                "count": chunk.len(),
                "readings": chunk,
            }))
            .map_err(|e| HttpError::Serialization(e.to_string()))?;

            self.post_chunk(&body, deadline, budget_ms)?;
            bytes += body.len();
        }
        Ok(bytes)
    }
}

impl DurableSink for HttpSink {
    fn persist(&self, batch: &[Reading], timeout: Duration) -> Result<(), SinkError> {
        if batch.is_empty() {
            return Ok(());
        }

        match self.send_batch(batch, timeout) {
            Ok(bytes) => {
                self.stats.record_success(batch.len(), bytes);
                Ok(())
            }
            Err(e) => {
                log::warn!("http sink failed batch of {}: {}", batch.len(), e);
                self.stats.record_failure(&e);
                Err(e.into())
            }
        }
    }

    fn name(&self) -> &'static str {
        "http"
    }
}
