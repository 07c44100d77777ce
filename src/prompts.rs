//! System instructions for the five analysis modes.
//!
//! Every mode maps to exactly one fixed instruction. The table is built once
//! at startup (optionally with operator overrides, see
//! [`SystemPromptTable::load_overrides`]) and shared read-only by all
//! requests through [`crate::config::RelayConfig`].

use crate::error::RelayError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tracing::info;

/// One of the fixed analysis task types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisMode {
    /// Plain-English summary of obligations, rights and risks.
    Summary,
    /// Legal jargon glossary.
    Jargon,
    /// Missing clauses, contradictions, unfair conditions.
    Loopholes,
    /// One-sided clauses favouring one party.
    Asymmetry,
    /// Question answering grounded in the document.
    Chatbot,
}

impl AnalysisMode {
    pub const ALL: [AnalysisMode; 5] = [
        AnalysisMode::Summary,
        AnalysisMode::Jargon,
        AnalysisMode::Loopholes,
        AnalysisMode::Asymmetry,
        AnalysisMode::Chatbot,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisMode::Summary => "summary",
            AnalysisMode::Jargon => "jargon",
            AnalysisMode::Loopholes => "loopholes",
            AnalysisMode::Asymmetry => "asymmetry",
            AnalysisMode::Chatbot => "chatbot",
        }
    }

    pub fn is_chat(&self) -> bool {
        matches!(self, AnalysisMode::Chatbot)
    }

    /// Built-in instruction for this mode.
    pub fn default_instruction(&self) -> &'static str {
        match self {
            AnalysisMode::Summary => SUMMARY_PROMPT,
            AnalysisMode::Jargon => JARGON_PROMPT,
            AnalysisMode::Loopholes => LOOPHOLES_PROMPT,
            AnalysisMode::Asymmetry => ASYMMETRY_PROMPT,
            AnalysisMode::Chatbot => CHATBOT_PROMPT,
        }
    }
}

impl fmt::Display for AnalysisMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnalysisMode {
    type Err = RelayError;

    /// Exact, case-sensitive match on the wire key.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AnalysisMode::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| RelayError::InvalidAnalysisType { mode: s.to_string() })
    }
}

pub const SUMMARY_PROMPT: &str = "You are an expert legal assistant. Summarize the following legal document in simple, easy-to-understand English. Use markdown for formatting, such as headings, bold text, and bullet points to make it highly readable. Focus on the key obligations, rights, and potential risks for the user.";

pub const JARGON_PROMPT: &str = "You are a legal terminology expert. Identify and explain any complex legal jargon, terms, or phrases in the following document. Present the results as a list using markdown. For each term, make the term bold and then provide a simple explanation.";

pub const LOOPHOLES_PROMPT: &str = "You are a risk analysis expert specializing in legal contracts. Scan the following document for common loopholes, missing clauses, contradicting terms, or potentially unfair conditions. List and explain each potential issue you find using markdown.";

pub const ASYMMETRY_PROMPT: &str = "You are an AI specializing in contract fairness. Analyze the following legal document to identify any clauses that are imbalanced, one-sided, or significantly favor one party over the other (asymmetry). For each imbalanced clause, explain why it's asymmetrical and its potential consequences using markdown.";

pub const CHATBOT_PROMPT: &str = "You are a helpful legal chatbot named LexiShield. You will be given a legal document and a conversation history. Answer the user's questions based ONLY on the content of the provided legal document. Be helpful, clear, and concise. Do not provide legal advice. If the answer isn't in the document, state that clearly.";

/// Immutable mode → system-instruction mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemPromptTable {
    entries: HashMap<AnalysisMode, String>,
}

impl Default for SystemPromptTable {
    fn default() -> Self {
        Self::builtin()
    }
}

impl SystemPromptTable {
    /// The table shipped with the crate.
    pub fn builtin() -> Self {
        let entries = AnalysisMode::ALL
            .into_iter()
            .map(|m| (m, m.default_instruction().to_string()))
            .collect();
        Self { entries }
    }

    /// Replace the instruction for one mode. Blank text is ignored.
    pub fn with_override(mut self, mode: AnalysisMode, instruction: impl Into<String>) -> Self {
        let instruction = instruction.into();
        if !instruction.trim().is_empty() {
            self.entries.insert(mode, instruction.trim().to_string());
        }
        self
    }

    /// Read `<mode>.txt` files from `dir`, overriding the matching entries.
    ///
    /// Missing files keep the built-in text; unreadable ones are an error.
    pub fn load_overrides(mut self, dir: &Path) -> Result<Self, RelayError> {
        for mode in AnalysisMode::ALL {
            let path = dir.join(format!("{}.txt", mode));
            if !path.exists() {
                continue;
            }
            let text = std::fs::read_to_string(&path).map_err(|e| {
                RelayError::InvalidConfig(format!(
                    "cannot read prompt override '{}': {}",
                    path.display(),
                    e
                ))
            })?;
            info!("Loaded {} system prompt override from {}", mode, path.display());
            self = self.with_override(mode, text);
        }
        Ok(self)
    }

    /// Instruction for `mode`.
    pub fn get(&self, mode: AnalysisMode) -> &str {
        self.entries
            .get(&mode)
            .map(String::as_str)
            .unwrap_or_else(|| mode.default_instruction())
    }

    /// Parse `key` and return its instruction in one step.
    pub fn lookup(&self, key: &str) -> Result<(AnalysisMode, &str), RelayError> {
        let mode = key.parse::<AnalysisMode>()?;
        Ok((mode, self.get(mode)))
    }
}
