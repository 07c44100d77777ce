//! Process-wide configuration for the analysis relay.
//!
//! Everything a request handler needs to know about the environment lives in
//! one immutable [`RelayConfig`], built once at startup via
//! [`RelayConfigBuilder`] and shared behind an `Arc`. Tests build their own
//! instance instead of touching environment variables.

use crate::error::RelayError;
use crate::prompts::SystemPromptTable;
use rand_core::{OsRng, RngCore};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Default Gemini model.
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash-preview-05-20";

/// Default generation API base URL (model path and method are appended).
pub const DEFAULT_API_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Configuration for the relay.
///
/// # Example
/// ```rust
/// use lexishield::RelayConfig;
///
/// let config = RelayConfig::builder()
///     .api_key("test-key")
///     .request_timeout_secs(30)
///     .build()
///     .unwrap();
/// assert!(config.is_api_configured());
/// ```
#[derive(Clone)]
pub struct RelayConfig {
    /// Generation API key. `None` disables the analyze path.
    pub api_key: Option<String>,

    /// Model identifier inserted into the request URL.
    pub model: String,

    /// Base URL of the generation API, without trailing slash.
    pub api_base_url: String,

    /// Sampling temperature sent with every request. Default: 0.5.
    pub temperature: f32,

    /// Output length cap sent with every request. Default: 4096.
    pub max_output_tokens: u32,

    /// Per-attempt HTTP timeout in seconds. Default: 90.
    ///
    /// An attempt that exceeds it counts as a retryable failure.
    pub request_timeout_secs: u64,

    /// Attempt count and backoff between attempts.
    pub retry: RetryPolicy,

    /// Directory where uploads are staged for the duration of one request.
    pub upload_dir: PathBuf,

    /// Largest accepted upload body in bytes. Default: 25 MiB.
    pub max_upload_bytes: usize,

    /// Clip document text to this many characters before prompting.
    /// `None` (default) sends the text unmodified.
    pub max_document_chars: Option<usize>,

    /// Mode → system instruction table.
    pub prompts: SystemPromptTable,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            temperature: 0.5,
            max_output_tokens: 4096,
            request_timeout_secs: 90,
            retry: RetryPolicy::default(),
            upload_dir: std::env::temp_dir().join("lexishield-uploads"),
            max_upload_bytes: 25 * 1024 * 1024,
            max_document_chars: None,
            prompts: SystemPromptTable::builtin(),
        }
    }
}

impl fmt::Debug for RelayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelayConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("api_base_url", &self.api_base_url)
            .field("temperature", &self.temperature)
            .field("max_output_tokens", &self.max_output_tokens)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("retry", &self.retry)
            .field("upload_dir", &self.upload_dir)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .field("max_document_chars", &self.max_document_chars)
            .finish()
    }
}

impl RelayConfig {
    /// Create a new builder for `RelayConfig`.
    pub fn builder() -> RelayConfigBuilder {
        RelayConfigBuilder {
            config: Self::default(),
        }
    }

    /// True when an API key was supplied.
    pub fn is_api_configured(&self) -> bool {
        self.api_key.is_some()
    }

    /// Full `generateContent` endpoint for the configured model, without the key.
    pub fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.api_base_url.trim_end_matches('/'),
            self.model
        )
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Builder for [`RelayConfig`].
#[derive(Debug)]
pub struct RelayConfigBuilder {
    config: RelayConfig,
}

impl RelayConfigBuilder {
    /// Set the API key. Blank keys are treated as absent.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        let key = key.into();
        self.config.api_key = if key.trim().is_empty() {
            None
        } else {
            Some(key.trim().to_string())
        };
        self
    }

    pub fn maybe_api_key(self, key: Option<String>) -> Self {
        match key {
            Some(k) => self.api_key(k),
            None => self,
        }
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn api_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.api_base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_output_tokens(mut self, n: u32) -> Self {
        self.config.max_output_tokens = n;
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs;
        self
    }

    pub fn retry(mut self, policy: RetryPolicy) -> Self {
        self.config.retry = policy;
        self
    }

    pub fn upload_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.upload_dir = dir.into();
        self
    }

    pub fn max_upload_bytes(mut self, n: usize) -> Self {
        self.config.max_upload_bytes = n;
        self
    }

    pub fn max_document_chars(mut self, n: Option<usize>) -> Self {
        self.config.max_document_chars = n;
        self
    }

    pub fn prompts(mut self, table: SystemPromptTable) -> Self {
        self.config.prompts = table;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<RelayConfig, RelayError> {
        let c = &self.config;
        if c.retry.max_attempts == 0 {
            return Err(RelayError::InvalidConfig(
                "retry.max_attempts must be ≥ 1".into(),
            ));
        }
        if c.request_timeout_secs == 0 {
            return Err(RelayError::InvalidConfig(
                "request timeout must be > 0 seconds".into(),
            ));
        }
        if c.max_output_tokens == 0 {
            return Err(RelayError::InvalidConfig(
                "max_output_tokens must be > 0".into(),
            ));
        }
        if c.model.trim().is_empty() {
            return Err(RelayError::InvalidConfig("model must not be empty".into()));
        }
        if c.max_document_chars == Some(0) {
            return Err(RelayError::InvalidConfig(
                "max_document_chars must be > 0 when set".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Retry policy ─────────────────────────────────────────────────────────

/// How many times to call the generation API and how long to wait in between.
///
/// The wait after failed attempt `n` (0-indexed) is `base_delay * 2^n`, plus a
/// uniformly random extra in `[0, max_jitter]`. With the defaults (3 attempts,
/// 1 s base, no jitter) the waits are 1 s then 2 s.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_jitter: Duration::ZERO,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            max_jitter: Duration::ZERO,
        }
    }

    pub fn with_jitter(mut self, max_jitter: Duration) -> Self {
        self.max_jitter = max_jitter;
        self
    }

    /// Delay to wait after the failed attempt with 0-based index `attempt`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        let backoff = self.base_delay.saturating_mul(factor);
        backoff.saturating_add(self.jitter())
    }

    fn jitter(&self) -> Duration {
        let max_ms = self.max_jitter.as_millis() as u64;
        if max_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(OsRng.next_u64() % (max_ms + 1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_constants() {
        let c = RelayConfig::default();
        assert_eq!(c.temperature, 0.5);
        assert_eq!(c.max_output_tokens, 4096);
        assert_eq!(c.request_timeout_secs, 90);
        assert_eq!(c.retry.max_attempts, 3);
        assert!(!c.is_api_configured());
    }

    #[test]
    fn blank_api_key_counts_as_missing() {
        let c = RelayConfig::builder().api_key("   ").build().unwrap();
        assert!(!c.is_api_configured());
    }

    #[test]
    fn debug_redacts_api_key() {
        let c = RelayConfig::builder().api_key("super-secret").build().unwrap();
        let dbg = format!("{:?}", c);
        assert!(!dbg.contains("super-secret"));
        assert!(dbg.contains("<redacted>"));
    }

    #[test]
    fn endpoint_joins_base_and_model() {
        let c = RelayConfig::builder()
            .api_base_url("http://localhost:9999/v1beta/")
            .model("gemini-test")
            .build()
            .unwrap();
        assert_eq!(
            c.endpoint(),
            "http://localhost:9999/v1beta/models/gemini-test:generateContent"
        );
    }

    #[test]
    fn build_rejects_zero_attempts() {
        let err = RelayConfig::builder()
            .retry(RetryPolicy::new(0, Duration::from_secs(1)))
            .build()
            .unwrap_err();
        assert!(matches!(err, RelayError::InvalidConfig(_)));
    }

    #[test]
    fn build_rejects_zero_timeout() {
        assert!(RelayConfig::builder()
            .request_timeout_secs(0)
            .build()
            .is_err());
    }

    #[test]
    fn temperature_is_clamped() {
        let c = RelayConfig::builder().temperature(9.0).build().unwrap();
        assert_eq!(c.temperature, 2.0);
    }

    #[test]
    fn backoff_doubles_per_attempt() {
        let p = RetryPolicy::default();
        assert_eq!(p.delay_for(0), Duration::from_secs(1));
        assert_eq!(p.delay_for(1), Duration::from_secs(2));
        assert_eq!(p.delay_for(2), Duration::from_secs(4));
    }

    #[test]
    fn jitter_stays_within_bound() {
        let p = RetryPolicy::new(3, Duration::from_millis(100))
            .with_jitter(Duration::from_millis(50));
        for _ in 0..100 {
            let d = p.delay_for(1);
            assert!(d >= Duration::from_millis(200));
            assert!(d <= Duration::from_millis(250));
        }
    }
}
