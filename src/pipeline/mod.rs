//! Pipeline stages for document analysis.
//!
//! ## Data Flow
//!
//! ```text
//! upload ──▶ input ──▶ extract ──▶ (text back to caller)
//!
//! text + mode ──▶ prompt ──▶ llm ──▶ (analysis back to caller)
//! ```
//!
//! 1. [`input`]   — stage the uploaded bytes under a unique name and remove
//!    them when the request ends
//! 2. [`extract`] — concatenate per-page text; runs in `spawn_blocking`
//! 3. [`prompt`]  — pick the system instruction and assemble the user prompt
//! 4. [`llm`]     — call the generation API with retry/backoff; the only
//!    stage with network I/O

pub mod extract;
pub mod input;
pub mod llm;
pub mod prompt;
