//! Prompt construction: mode + document (+ chat context) → user prompt.
//!
//! The remote model keeps no memory between calls, so a chat prompt must
//! carry everything: document context first, then the history oldest to
//! newest, then the new question last.
//!
//! ```text
//! DOCUMENT CONTEXT:
//! ---
//! <document>
//! ---
//!
//! CONVERSATION HISTORY:
//! User: ...
//! Assistant: ...
//!
//! NEW QUESTION:
//! <question>
//! ```

use crate::analysis::HistoryEntry;
use crate::error::RelayError;
use crate::prompts::{AnalysisMode, SystemPromptTable};
use std::fmt::Write;

/// Prefix for every non-chat prompt.
pub const DOCUMENT_PREFIX: &str = "Please analyze the following document:";

/// System instruction and user prompt for one generation call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltPrompt<'a> {
    pub mode: AnalysisMode,
    pub system_instruction: &'a str,
    pub user_prompt: String,
}

/// Build a prompt from a raw mode key, rejecting unknown keys.
pub fn build<'a>(
    table: &'a SystemPromptTable,
    mode_key: &str,
    document_text: &str,
    history: &[HistoryEntry],
    question: &str,
) -> Result<BuiltPrompt<'a>, RelayError> {
    let mode = mode_key.parse::<AnalysisMode>()?;
    Ok(build_for_mode(table, mode, document_text, history, question))
}

/// Build a prompt for an already-resolved mode.
///
/// `history` and `question` are ignored outside chat mode.
pub fn build_for_mode<'a>(
    table: &'a SystemPromptTable,
    mode: AnalysisMode,
    document_text: &str,
    history: &[HistoryEntry],
    question: &str,
) -> BuiltPrompt<'a> {
    let user_prompt = if mode.is_chat() {
        chat_prompt(document_text, history, question)
    } else {
        document_prompt(document_text)
    };
    BuiltPrompt {
        mode,
        system_instruction: table.get(mode),
        user_prompt,
    }
}

pub fn document_prompt(document_text: &str) -> String {
    format!("{}\n\n{}", DOCUMENT_PREFIX, document_text)
}

pub fn chat_prompt(document_text: &str, history: &[HistoryEntry], question: &str) -> String {
    let mut out = String::with_capacity(document_text.len() + question.len() + 96);
    // Writing into a String is infallible.
    let _ = write!(
        out,
        "DOCUMENT CONTEXT:\n---\n{}\n---\n\nCONVERSATION HISTORY:\n",
        document_text
    );
    for entry in history {
        let _ = writeln!(out, "{}: {}", entry.role.label(), entry.text);
    }
    let _ = write!(out, "\nNEW QUESTION:\n{}", question);
    out
}

/// Clip `text` to at most `max_chars` characters, on a char boundary.
pub fn clip_document(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> SystemPromptTable {
        SystemPromptTable::builtin()
    }

    #[test]
    fn non_chat_prompt_is_prefix_plus_document() {
        let t = table();
        let p = build(&t, "summary", "The lease.", &[], "").unwrap();
        assert_eq!(
            p.user_prompt,
            "Please analyze the following document:\n\nThe lease."
        );
        assert_eq!(p.system_instruction, t.get(AnalysisMode::Summary));
    }

    #[test]
    fn non_chat_modes_ignore_history() {
        let t = table();
        let history = vec![HistoryEntry::user("ignored")];
        let p = build(&t, "jargon", "doc", &history, "also ignored").unwrap();
        assert!(!p.user_prompt.contains("ignored"));
    }

    #[test]
    fn unknown_mode_is_rejected() {
        let t = table();
        let err = build(&t, "bogus", "doc", &[], "").unwrap_err();
        assert!(matches!(err, RelayError::InvalidAnalysisType { .. }));
    }

    #[test]
    fn chat_prompt_orders_context_history_question() {
        let history = vec![
            HistoryEntry::user("first question"),
            HistoryEntry::assistant("first answer"),
            HistoryEntry::user("second question"),
        ];
        let p = chat_prompt("THE DOCUMENT", &history, "final question");

        let doc = p.find("THE DOCUMENT").unwrap();
        let q1 = p.find("User: first question").unwrap();
        let a1 = p.find("Assistant: first answer").unwrap();
        let q2 = p.find("User: second question").unwrap();
        let marker = p.find("NEW QUESTION:").unwrap();
        let last = p.find("final question").unwrap();

        assert!(doc < q1 && q1 < a1 && a1 < q2 && q2 < marker && marker < last);
        assert!(p.ends_with("final question"));
    }

    #[test]
    fn chat_prompt_exact_layout() {
        let history = vec![HistoryEntry::user("Hi"), HistoryEntry::assistant("Hello")];
        let p = chat_prompt("Doc", &history, "Q?");
        assert_eq!(
            p,
            "DOCUMENT CONTEXT:\n---\nDoc\n---\n\nCONVERSATION HISTORY:\nUser: Hi\nAssistant: Hello\n\nNEW QUESTION:\nQ?"
        );
    }

    #[test]
    fn chat_with_empty_history_is_fresh_conversation() {
        let p = chat_prompt("Doc", &[], "Q?");
        assert_eq!(
            p,
            "DOCUMENT CONTEXT:\n---\nDoc\n---\n\nCONVERSATION HISTORY:\n\nNEW QUESTION:\nQ?"
        );
    }

    #[test]
    fn long_documents_pass_through_untouched() {
        let doc = "clause ".repeat(50_000);
        let p = document_prompt(&doc);
        assert!(p.ends_with(&doc));
    }

    #[test]
    fn clip_respects_char_boundaries() {
        assert_eq!(clip_document("héllo", 2), "hé");
        assert_eq!(clip_document("short", 10), "short");
        assert_eq!(clip_document("exact", 5), "exact");
    }
}
