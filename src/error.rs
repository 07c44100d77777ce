//! Error types for the lexishield library.
//!
//! Failures fall into four groups, and each maps to a distinct HTTP answer so
//! a caller can tell "fix your input" from "try again later" from "the
//! service is misconfigured":
//!
//! * **Validation** — bad or missing request fields (400).
//! * **Extraction** — the upload is not a readable PDF, see [`ExtractionError`].
//! * **Remote** — the generation API failed on every attempt, see [`ApiError`].
//! * **Configuration** — no API key, or invalid builder settings.
//!
//! [`ExtractionError`] and [`ApiError`] are standalone so the pipeline stages
//! that produce them can be tested without the HTTP layer.

use axum::http::StatusCode;
use std::fmt;
use thiserror::Error;

/// All request-level errors returned by the lexishield library.
#[derive(Debug, Error)]
pub enum RelayError {
    // ── Validation errors ─────────────────────────────────────────────────
    /// Multipart body had no `file` field.
    #[error("No file part")]
    MissingFilePart,

    /// The `file` field was present but carried an empty filename.
    #[error("No selected file")]
    NoSelectedFile,

    /// Filename does not end in `.pdf`.
    #[error("Invalid file type, please upload a PDF")]
    UnsupportedFileType { filename: String },

    /// `/analyze` body lacked `document_text` or `analysis_type`.
    #[error("Missing document_text or analysis_type")]
    MissingFields,

    /// `analysis_type` is not one of the five known modes.
    #[error("Invalid analysis type")]
    InvalidAnalysisType { mode: String },

    /// Request body exceeded the configured limit.
    #[error("Request body too large (limit is {limit} bytes)")]
    PayloadTooLarge { limit: usize },

    /// Body could not be parsed at all.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    // ── Extraction errors ─────────────────────────────────────────────────
    #[error("Error processing file: {0}")]
    Extraction(#[from] ExtractionError),

    // ── Remote errors ─────────────────────────────────────────────────────
    #[error(transparent)]
    Api(#[from] ApiError),

    // ── Config errors ─────────────────────────────────────────────────────
    /// The generation API key was absent at startup.
    #[error("API key is not configured on the server.")]
    NotConfigured,

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not write the upload to temporary storage.
    #[error("Failed to stage upload: {0}")]
    Staging(#[source] std::io::Error),

    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl RelayError {
    /// HTTP status this error is reported with.
    pub fn status_code(&self) -> StatusCode {
        match self {
            RelayError::MissingFilePart
            | RelayError::NoSelectedFile
            | RelayError::UnsupportedFileType { .. }
            | RelayError::MissingFields
            | RelayError::InvalidAnalysisType { .. }
            | RelayError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            RelayError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            RelayError::Extraction(_) => StatusCode::INTERNAL_SERVER_ERROR,
            RelayError::Api(_) => StatusCode::BAD_GATEWAY,
            RelayError::NotConfigured => StatusCode::SERVICE_UNAVAILABLE,
            RelayError::InvalidConfig(_)
            | RelayError::Staging(_)
            | RelayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to hand back to the caller.
    ///
    /// Remote failures collapse to a generic line; the structured detail is
    /// logged server-side instead.
    pub fn client_message(&self) -> String {
        match self {
            RelayError::Api(_) => "Could not connect to AI service.".to_string(),
            RelayError::Staging(_) | RelayError::Internal(_) | RelayError::InvalidConfig(_) => {
                "Internal server error".to_string()
            }
            other => other.to_string(),
        }
    }

    /// True when the caller caused the error and retrying will not help.
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }
}

/// The upload could not be turned into text.
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// First bytes are not `%PDF`.
    #[error("file is not a valid PDF (first bytes: {magic:?})")]
    NotAPdf { magic: Vec<u8> },

    /// The document needs a non-empty user password.
    #[error("PDF is encrypted")]
    Encrypted,

    /// Header, xref or object stream is unreadable.
    #[error("PDF is corrupt: {detail}")]
    Corrupt { detail: String },

    /// A single page's content stream could not be decoded.
    #[error("failed to extract text from page {page}: {detail}")]
    Page { page: u32, detail: String },

    #[error("failed to read staged upload: {0}")]
    Io(#[from] std::io::Error),
}

/// What went wrong on the final attempt against the generation API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorKind {
    /// Connection refused, DNS, TLS and similar.
    Transport,
    /// The request exceeded the configured timeout.
    Timeout,
    /// Non-2xx HTTP status.
    Status(u16),
    /// Body was not the expected JSON shape.
    MalformedResponse,
    /// Body parsed but held no usable candidate text.
    NoCandidates,
}

impl fmt::Display for ApiErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiErrorKind::Transport => f.write_str("transport"),
            ApiErrorKind::Timeout => f.write_str("timeout"),
            ApiErrorKind::Status(code) => write!(f, "HTTP {}", code),
            ApiErrorKind::MalformedResponse => f.write_str("malformed response"),
            ApiErrorKind::NoCandidates => f.write_str("no candidates"),
        }
    }
}

impl ApiErrorKind {
    /// Whether another attempt could succeed. A 2xx body without candidates
    /// is a deterministic block (safety filter, prompt rejection).
    pub fn is_retryable(&self) -> bool {
        !matches!(self, ApiErrorKind::NoCandidates)
    }
}

/// The generation API call was abandoned: every attempt failed, or one
/// failed in a way retrying cannot fix.
#[derive(Debug, Clone, Error)]
#[error("generation API failed after {attempts} attempt(s) ({kind}): {last_cause}")]
pub struct ApiError {
    pub kind: ApiErrorKind,
    pub attempts: u32,
    pub last_cause: String,
}

/// Failure of a single attempt; the retry loop turns the last one into an
/// [`ApiError`].
#[derive(Debug, Clone, Error)]
#[error("{kind}: {cause}")]
pub struct AttemptError {
    pub kind: ApiErrorKind,
    pub cause: String,
}

impl AttemptError {
    pub fn new(kind: ApiErrorKind, cause: impl Into<String>) -> Self {
        Self {
            kind,
            cause: cause.into(),
        }
    }

    pub(crate) fn into_api_error(self, attempts: u32) -> ApiError {
        ApiError {
            kind: self.kind,
            attempts,
            last_cause: self.cause,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_analysis_type_message_is_stable() {
        let e = RelayError::InvalidAnalysisType {
            mode: "bogus".into(),
        };
        assert_eq!(e.to_string(), "Invalid analysis type");
        assert_eq!(e.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn extraction_error_carries_cause() {
        let e = RelayError::from(ExtractionError::Corrupt {
            detail: "bad xref".into(),
        });
        assert_eq!(e.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(e.client_message().starts_with("Error processing file:"));
        assert!(e.client_message().contains("bad xref"));
    }

    #[test]
    fn api_error_hides_cause_from_client() {
        let e = RelayError::from(ApiError {
            kind: ApiErrorKind::Status(500),
            attempts: 3,
            last_cause: "upstream said: secret payload".into(),
        });
        assert_eq!(e.status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(e.client_message(), "Could not connect to AI service.");
        assert!(e.to_string().contains("3 attempt"));
    }

    #[test]
    fn not_configured_is_service_unavailable() {
        let e = RelayError::NotConfigured;
        assert_eq!(e.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(!e.is_client_error());
    }

    #[test]
    fn only_no_candidates_is_final() {
        assert!(!ApiErrorKind::NoCandidates.is_retryable());
        for kind in [
            ApiErrorKind::Transport,
            ApiErrorKind::Timeout,
            ApiErrorKind::Status(503),
            ApiErrorKind::MalformedResponse,
        ] {
            assert!(kind.is_retryable(), "{kind} should be retried");
        }
    }

    #[test]
    fn api_error_kind_display() {
        assert_eq!(ApiErrorKind::Status(429).to_string(), "HTTP 429");
        assert_eq!(ApiErrorKind::Timeout.to_string(), "timeout");
    }
}
