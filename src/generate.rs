//! # Stage: Generation
//!
//! ## Responsibility
//! Abstract the slow external text-generation capability behind a trait the
//! router can call, mock, and time out.
//!
//! ## Guarantees
//! - Implementations never panic on failure; every error comes back as a
//!   [`GenerateError`].
//! - The deadline passed by the caller is advisory for the transport; the
//!   router enforces the hard timeout itself.
//!
//! ## NOT Responsible For
//! - Timeout enforcement, retries, breaker accounting (see `routing`)
//! - Prompt construction (see `service`)

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Failure modes of the downstream generation capability.
#[derive(Error, Debug)]
pub enum GenerateError {
    /// Transport-level failure (connection refused, DNS, TLS).
    #[error("transport error: {0}")]
    Transport(String),

    /// The downstream returned an HTTP error status.
    #[error("api error: status {status}: {body}")]
    Api {
        /// HTTP status code returned.
        status: u16,
        /// Response body, truncated by the caller if needed.
        body: String,
    },

    /// The downstream answered but the payload was not usable.
    #[error("malformed response: {0}")]
    Malformed(String),
}

/// An external text-generation capability.
///
/// Treated as unreliable by construction: it may be slow, rate-limited, or
/// down, and the pipeline must degrade gracefully in every case.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Generate a response for `prompt`.
    ///
    /// `deadline` is the caller's remaining budget, forwarded so transports
    /// that support per-request timeouts can propagate it downstream.
    ///
    /// # Errors
    ///
    /// Returns a [`GenerateError`] on any downstream failure.
    async fn generate(&self, prompt: &str, deadline: Duration) -> Result<String, GenerateError>;

    /// Human-readable name for logs.
    fn name(&self) -> &str {
        "generator"
    }
}

// ── Echo generator (testing / demo) ──────────────────────────────────────

/// Deterministic generator for tests and demos: echoes the prompt after an
/// optional artificial delay.
#[derive(Debug, Default)]
pub struct EchoGenerator {
    delay: Option<Duration>,
}

impl EchoGenerator {
    /// Create an echo generator that responds immediately.
    pub fn new() -> Self {
        Self { delay: None }
    }

    /// Add an artificial processing delay (useful for timeout tests).
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl Generator for EchoGenerator {
    async fn generate(&self, prompt: &str, _deadline: Duration) -> Result<String, GenerateError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        debug!(prompt_len = prompt.len(), "echo generation");
        Ok(format!("[generated] {prompt}"))
    }

    fn name(&self) -> &str {
        "echo"
    }
}

// ── HTTP generator ───────────────────────────────────────────────────────

/// Generator backed by a JSON-over-HTTP completion endpoint.
///
/// Sends `{"prompt": ...}` and expects `{"text": ...}` back. Auth is a
/// bearer token when configured.
#[derive(Debug)]
pub struct HttpGenerator {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

#[derive(serde::Serialize)]
struct GenerateRequest<'a> {
    prompt: &'a str,
}

#[derive(serde::Deserialize)]
struct GenerateResponse {
    text: String,
}

impl HttpGenerator {
    /// Create a generator targeting `endpoint`.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            api_key: None,
        }
    }

    /// Attach a bearer token for authenticated endpoints.
    #[must_use]
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }
}

#[async_trait]
impl Generator for HttpGenerator {
    async fn generate(&self, prompt: &str, deadline: Duration) -> Result<String, GenerateError> {
        let mut request = self
            .client
            .post(&self.endpoint)
            .timeout(deadline)
            .json(&GenerateRequest { prompt });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| GenerateError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GenerateError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| GenerateError::Malformed(e.to_string()))?;

        debug!(
            endpoint = %self.endpoint,
            response_len = parsed.text.len(),
            "http generation complete"
        );
        Ok(parsed.text)
    }

    fn name(&self) -> &str {
        "http"
    }
}
