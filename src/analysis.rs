//! Analysis requests: validation, prompt building and the generation call.
//!
//! The caller carries the extracted text forward and resubmits it with a
//! mode; [`run_analysis`] turns that into one call against the generation
//! API and hands back the model's answer unmodified.

use crate::config::RelayConfig;
use crate::error::RelayError;
use crate::pipeline::llm::ResilientClient;
use crate::pipeline::prompt;
use crate::prompts::AnalysisMode;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{info, warn};

/// Who said a history line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    /// Anything other than `"user"` is the assistant (front-ends send `"model"`).
    pub fn from_wire(role: &str) -> Self {
        if role == "user" {
            Role::User
        } else {
            Role::Assistant
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Role::User => "User",
            Role::Assistant => "Assistant",
        }
    }
}

/// One prior chat turn.
///
/// Deserialises from either `{"role", "text"}` or the chat front-end's
/// `{"role", "parts": [{"text"}]}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "HistoryEntryWire")]
pub struct HistoryEntry {
    pub role: Role,
    pub text: String,
}

impl HistoryEntry {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            text: text.into(),
        }
    }
}

#[derive(Deserialize)]
struct HistoryEntryWire {
    #[serde(default)]
    role: String,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    parts: Vec<WirePart>,
}

#[derive(Deserialize)]
struct WirePart {
    #[serde(default)]
    text: String,
}

impl From<HistoryEntryWire> for HistoryEntry {
    fn from(w: HistoryEntryWire) -> Self {
        let text = w
            .text
            .or_else(|| w.parts.into_iter().next().map(|p| p.text))
            .unwrap_or_default();
        Self {
            role: Role::from_wire(&w.role),
            text,
        }
    }
}

/// Raw `/analyze` body before validation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalyzeBody {
    pub document_text: Option<String>,
    pub analysis_type: Option<String>,
    #[serde(default)]
    pub history: Option<Vec<HistoryEntry>>,
    #[serde(default)]
    pub question: Option<String>,
}

impl AnalyzeBody {
    /// Check required fields and resolve the mode. Empty strings count as
    /// missing.
    pub fn validate(self) -> Result<AnalysisRequest, RelayError> {
        let present = |field: Option<String>| field.filter(|s| !s.is_empty());
        let (Some(document_text), Some(analysis_type)) =
            (present(self.document_text), present(self.analysis_type))
        else {
            return Err(RelayError::MissingFields);
        };
        let mode = analysis_type.parse::<AnalysisMode>()?;
        Ok(AnalysisRequest {
            document_text,
            mode,
            history: self.history.unwrap_or_default(),
            question: self.question.unwrap_or_default(),
        })
    }
}

/// A validated analysis request.
///
/// `history` and `question` only matter in [`AnalysisMode::Chatbot`]; an
/// empty history starts a fresh conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisRequest {
    pub document_text: String,
    pub mode: AnalysisMode,
    pub history: Vec<HistoryEntry>,
    pub question: String,
}

impl AnalysisRequest {
    pub fn new(document_text: impl Into<String>, mode: AnalysisMode) -> Self {
        Self {
            document_text: document_text.into(),
            mode,
            history: Vec::new(),
            question: String::new(),
        }
    }

    pub fn with_chat(mut self, history: Vec<HistoryEntry>, question: impl Into<String>) -> Self {
        self.history = history;
        self.question = question.into();
        self
    }
}

/// Build the prompt for `request` and send it to the generation API.
///
/// The model's text is returned verbatim.
pub async fn run_analysis(
    config: &RelayConfig,
    client: &ResilientClient,
    request: &AnalysisRequest,
) -> Result<String, RelayError> {
    let start = Instant::now();

    let document = match config.max_document_chars {
        Some(limit) => {
            let clipped = prompt::clip_document(&request.document_text, limit);
            if clipped.len() < request.document_text.len() {
                warn!(
                    "Document clipped from {} to {} bytes for {} analysis",
                    request.document_text.len(),
                    clipped.len(),
                    request.mode
                );
            }
            clipped
        }
        None => request.document_text.as_str(),
    };

    let built = prompt::build_for_mode(
        &config.prompts,
        request.mode,
        document,
        &request.history,
        &request.question,
    );

    let result = client
        .call(built.system_instruction, &built.user_prompt)
        .await?;

    info!(
        "{} analysis complete: {} prompt bytes → {} result bytes in {}ms",
        request.mode,
        built.user_prompt.len(),
        result.len(),
        start.elapsed().as_millis()
    );
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_accepts_flat_shape() {
        let e: HistoryEntry =
            serde_json::from_str(r#"{"role":"assistant","text":"Hi"}"#).unwrap();
        assert_eq!(e, HistoryEntry::assistant("Hi"));
    }

    #[test]
    fn history_accepts_parts_shape() {
        let e: HistoryEntry =
            serde_json::from_str(r#"{"role":"user","parts":[{"text":"Is rent due?"}]}"#)
                .unwrap();
        assert_eq!(e, HistoryEntry::user("Is rent due?"));
    }

    #[test]
    fn model_role_renders_as_assistant() {
        let e: HistoryEntry =
            serde_json::from_str(r#"{"role":"model","parts":[{"text":"Yes."}]}"#).unwrap();
        assert_eq!(e.role, Role::Assistant);
    }

    #[test]
    fn validate_requires_text_and_type() {
        let body = AnalyzeBody {
            analysis_type: Some("summary".into()),
            ..Default::default()
        };
        assert!(matches!(body.validate(), Err(RelayError::MissingFields)));

        let body = AnalyzeBody {
            document_text: Some("text".into()),
            ..Default::default()
        };
        assert!(matches!(body.validate(), Err(RelayError::MissingFields)));

        let body = AnalyzeBody {
            document_text: Some(String::new()),
            analysis_type: Some("summary".into()),
            ..Default::default()
        };
        assert!(matches!(body.validate(), Err(RelayError::MissingFields)));
    }

    #[test]
    fn validate_rejects_unknown_mode() {
        let body = AnalyzeBody {
            document_text: Some("text".into()),
            analysis_type: Some("bogus".into()),
            ..Default::default()
        };
        assert!(matches!(
            body.validate(),
            Err(RelayError::InvalidAnalysisType { .. })
        ));
    }

    #[test]
    fn validate_defaults_chat_fields() {
        let body: AnalyzeBody = serde_json::from_str(
            r#"{"document_text":"doc","analysis_type":"chatbot","history":null}"#,
        )
        .unwrap();
        let req = body.validate().unwrap();
        assert_eq!(req.mode, AnalysisMode::Chatbot);
        assert!(req.history.is_empty());
        assert_eq!(req.question, "");
    }

    /// Echoes the user prompt back as the answer.
    struct EchoBackend;

    #[async_trait::async_trait]
    impl crate::pipeline::llm::GenerationBackend for EchoBackend {
        async fn generate(
            &self,
            request: &crate::pipeline::llm::GenerateRequest,
        ) -> Result<String, crate::error::AttemptError> {
            Ok(request.contents[0].parts[0].text.clone())
        }
    }

    fn echo_client(config: &RelayConfig) -> ResilientClient {
        ResilientClient::new(std::sync::Arc::new(EchoBackend), config)
    }

    #[test]
    fn run_analysis_sends_whole_document_by_default() {
        let config = RelayConfig::default();
        let request = AnalysisRequest::new("é".repeat(50), AnalysisMode::Summary);
        let out = tokio_test::block_on(run_analysis(&config, &echo_client(&config), &request))
            .unwrap();
        assert!(out.ends_with(&"é".repeat(50)));
    }

    #[test]
    fn run_analysis_clips_when_limit_set() {
        let config = RelayConfig::builder()
            .max_document_chars(Some(10))
            .build()
            .unwrap();
        let request = AnalysisRequest::new("é".repeat(50), AnalysisMode::Jargon);
        let out = tokio_test::block_on(run_analysis(&config, &echo_client(&config), &request))
            .unwrap();
        assert!(out.ends_with(&"é".repeat(10)));
        assert!(!out.contains(&"é".repeat(11)));
    }
}
