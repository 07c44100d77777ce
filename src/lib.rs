//! # lexishield
//!
//! A document-analysis relay for legal PDFs. Upload a PDF, get its text back,
//! then resubmit that text with an analysis mode and receive the language
//! model's Markdown analysis.
//!
//! ## Request Flow
//!
//! ```text
//! POST /upload   PDF ──▶ stage (uuid.pdf) ──▶ extract text ──▶ delete ──▶ {document_text}
//!
//! POST /analyze  {document_text, analysis_type, history?, question?}
//!                 │
//!                 ├─ 1. Validate  required fields, known mode
//!                 ├─ 2. Prompt    system instruction + user prompt
//!                 ├─ 3. Generate  Gemini generateContent, 3 attempts, 1s → 2s backoff
//!                 └─ 4. Return    {analysis_result} verbatim
//! ```
//!
//! The server keeps no session state: the caller carries the extracted text
//! from the first call to the second.
//!
//! ## Analysis Modes
//!
//! | Mode | Output |
//! |------|--------|
//! | `summary`   | Plain-English summary of obligations, rights and risks |
//! | `jargon`    | Glossary of legal terms |
//! | `loopholes` | Missing clauses, contradictions, unfair conditions |
//! | `asymmetry` | One-sided clauses and their consequences |
//! | `chatbot`   | Answers a question using the document and chat history |
//!
//! ## Library Use
//!
//! ```rust,no_run
//! use lexishield::{extract_text, run_analysis, AnalysisMode, AnalysisRequest,
//!                  RelayConfig, ResilientClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = RelayConfig::builder()
//!         .api_key(std::env::var("GEMINI_API_KEY")?)
//!         .build()?;
//!     let client = ResilientClient::gemini(&config)?;
//!
//!     let text = extract_text(&std::fs::read("lease.pdf")?)?.text;
//!     let request = AnalysisRequest::new(text, AnalysisMode::Asymmetry);
//!     println!("{}", run_analysis(&config, &client, &request).await?);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `lexishield` binary (clap + anyhow + tracing-subscriber) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod analysis;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod prompts;
pub mod server;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use analysis::{run_analysis, AnalysisRequest, AnalyzeBody, HistoryEntry, Role};
pub use config::{RelayConfig, RelayConfigBuilder, RetryPolicy};
pub use error::{ApiError, ApiErrorKind, AttemptError, ExtractionError, RelayError};
pub use pipeline::extract::{extract_text, ExtractedText};
pub use pipeline::llm::{GenerationBackend, ResilientClient, Sleeper};
pub use prompts::{AnalysisMode, SystemPromptTable};
pub use server::{create_router, serve, AppState};
