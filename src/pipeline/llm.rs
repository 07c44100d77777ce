//! Generation API client with retry and exponential backoff.
//!
//! [`ResilientClient`] builds one request payload per call and sends it up
//! to `RetryPolicy::max_attempts` times. Transport errors, timeouts, non-2xx
//! statuses and malformed bodies are retried. A 2xx body without candidate
//! text ends the call at once. The wait after failed attempt `n` (0-indexed)
//! is `base_delay * 2^n`; no wait follows the final attempt.
//!
//! The transport ([`GenerationBackend`]) and the clock ([`Sleeper`]) are
//! injected so the retry loop can be exercised without a network or real
//! sleeps.

use crate::config::{RelayConfig, RetryPolicy};
use crate::error::{ApiError, ApiErrorKind, AttemptError, RelayError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

// ── Wire types ───────────────────────────────────────────────────────────

/// `generateContent` request body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerateRequest {
    pub contents: Vec<Content>,
    #[serde(rename = "systemInstruction")]
    pub system_instruction: Content,
    #[serde(rename = "generationConfig")]
    pub generation_config: GenerationConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Content {
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Part {
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GenerationConfig {
    pub temperature: f32,
    #[serde(rename = "maxOutputTokens")]
    pub max_output_tokens: u32,
}

impl GenerateRequest {
    pub fn new(
        system_instruction: &str,
        user_prompt: &str,
        generation_config: GenerationConfig,
    ) -> Self {
        Self {
            contents: vec![Content::text(user_prompt)],
            system_instruction: Content::text(system_instruction),
            generation_config,
        }
    }
}

impl Content {
    fn text(text: &str) -> Self {
        Self {
            parts: vec![Part {
                text: text.to_string(),
            }],
        }
    }
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    candidates: Option<Vec<Candidate>>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    parts: Option<Vec<ResponsePart>>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: Option<ErrorBody>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

/// Pull the first candidate's first text part out of a response body.
pub fn first_candidate_text(body: &str) -> Result<String, AttemptError> {
    let parsed: GenerateResponse = serde_json::from_str(body).map_err(|e| {
        AttemptError::new(
            ApiErrorKind::MalformedResponse,
            format!("invalid response JSON: {}", e),
        )
    })?;

    let candidate = parsed
        .candidates
        .and_then(|c| c.into_iter().next())
        .ok_or_else(|| AttemptError::new(ApiErrorKind::NoCandidates, "response has no candidates"))?;

    candidate
        .content
        .and_then(|c| c.parts)
        .and_then(|p| p.into_iter().next())
        .and_then(|p| p.text)
        .ok_or_else(|| {
            AttemptError::new(
                ApiErrorKind::MalformedResponse,
                "first candidate has no text part",
            )
        })
}

// ── Seams ────────────────────────────────────────────────────────────────

/// One attempt against the generation API.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    async fn generate(&self, request: &GenerateRequest) -> Result<String, AttemptError>;
}

/// Waits between attempts.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Real sleeps on the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

// ── Gemini transport ─────────────────────────────────────────────────────

/// HTTPS transport for the Gemini `generateContent` endpoint.
///
/// The API key travels as the `key` query parameter and is stripped from any
/// error text before it leaves this type.
pub struct GeminiBackend {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    timeout: Duration,
}

impl GeminiBackend {
    /// Build a transport from config. Fails when no API key is configured.
    pub fn from_config(config: &RelayConfig) -> Result<Self, RelayError> {
        let api_key = config.api_key.clone().ok_or(RelayError::NotConfigured)?;
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| RelayError::Internal(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            http,
            endpoint: config.endpoint(),
            api_key,
            timeout: config.request_timeout(),
        })
    }
}

#[async_trait]
impl GenerationBackend for GeminiBackend {
    async fn generate(&self, request: &GenerateRequest) -> Result<String, AttemptError> {
        let response = self
            .http
            .post(&self.endpoint)
            .query(&[("key", self.api_key.as_str())])
            .json(request)
            .send()
            .await
            .map_err(|e| {
                let e = e.without_url();
                if e.is_timeout() {
                    AttemptError::new(
                        ApiErrorKind::Timeout,
                        format!("no response within {}s", self.timeout.as_secs()),
                    )
                } else {
                    AttemptError::new(ApiErrorKind::Transport, e.to_string())
                }
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            let e = e.without_url();
            let kind = if e.is_timeout() {
                ApiErrorKind::Timeout
            } else {
                ApiErrorKind::Transport
            };
            AttemptError::new(kind, format!("failed to read response body: {}", e))
        })?;

        if !status.is_success() {
            return Err(AttemptError::new(
                ApiErrorKind::Status(status.as_u16()),
                status_cause(status.as_u16(), &body),
            ));
        }

        first_candidate_text(&body)
    }
}

/// Short cause for a non-2xx answer: the API's own message when it sent one.
fn status_cause(status: u16, body: &str) -> String {
    let message = serde_json::from_str::<ErrorEnvelope>(body)
        .ok()
        .and_then(|e| e.error)
        .and_then(|e| e.message);
    match message {
        Some(m) => format!("HTTP {}: {}", status, truncate(&m, 200)),
        None => format!("HTTP {}", status),
    }
}

fn truncate(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

// ── Retrying client ──────────────────────────────────────────────────────

/// Generation client that retries failed attempts with exponential backoff.
#[derive(Clone)]
pub struct ResilientClient {
    backend: Arc<dyn GenerationBackend>,
    sleeper: Arc<dyn Sleeper>,
    policy: RetryPolicy,
    generation: GenerationConfig,
}

impl ResilientClient {
    /// Client using the generation settings and retry policy from `config`.
    pub fn new(backend: Arc<dyn GenerationBackend>, config: &RelayConfig) -> Self {
        Self {
            backend,
            sleeper: Arc::new(TokioSleeper),
            policy: config.retry,
            generation: GenerationConfig {
                temperature: config.temperature,
                max_output_tokens: config.max_output_tokens,
            },
        }
    }

    /// Client talking to Gemini over HTTPS.
    pub fn gemini(config: &RelayConfig) -> Result<Self, RelayError> {
        let backend = GeminiBackend::from_config(config)?;
        Ok(Self::new(Arc::new(backend), config))
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Send one prompt; return the first candidate's text or the last failure.
    pub async fn call(
        &self,
        system_instruction: &str,
        user_prompt: &str,
    ) -> Result<String, ApiError> {
        let request = GenerateRequest::new(system_instruction, user_prompt, self.generation);
        let max_attempts = self.policy.max_attempts.max(1);
        let start = Instant::now();

        let mut last_err: Option<AttemptError> = None;

        for attempt in 0..max_attempts {
            if attempt > 0 {
                let backoff = self.policy.delay_for(attempt - 1);
                warn!(
                    "Generation retry {}/{} after {}ms",
                    attempt + 1,
                    max_attempts,
                    backoff.as_millis()
                );
                self.sleeper.sleep(backoff).await;
            }

            match self.backend.generate(&request).await {
                Ok(text) => {
                    debug!(
                        "Generation succeeded on attempt {} in {:?}",
                        attempt + 1,
                        start.elapsed()
                    );
                    return Ok(text);
                }
                Err(e) if !e.kind.is_retryable() => {
                    warn!(
                        "Generation attempt {}/{} failed, not retrying: {}",
                        attempt + 1,
                        max_attempts,
                        e
                    );
                    return Err(e.into_api_error(attempt + 1));
                }
                Err(e) => {
                    warn!(
                        "Generation attempt {}/{} failed: {}",
                        attempt + 1,
                        max_attempts,
                        e
                    );
                    last_err = Some(e);
                }
            }
        }

        let err = last_err
            .unwrap_or_else(|| AttemptError::new(ApiErrorKind::Transport, "no attempt made"));
        Err(err.into_api_error(max_attempts))
    }
}
