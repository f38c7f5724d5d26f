//! linemap: deterministic, fact-grounded, line-by-line explanation of
//! Python files.
//!
//! The pipeline combines static structural facts from a tree-sitter parse
//! with dynamic per-line hit counts from a controlled run of one designated
//! entry routine, merges both into ordered per-line records, and can hand
//! the records to a local LLM backend that is instructed to restate, never
//! invent, behavior.

pub mod cli;
pub mod config;
pub mod core;
pub mod facts;
pub mod llm;
pub mod merge;
pub mod trace;

// Re-export commonly used types and entry points
pub use crate::core::{FactMap, HitCountMap, LineRecord};
pub use crate::facts::extract_facts;
pub use crate::llm::{
    apply_precheck_flags, render_explanations, LlmBackend, LlmResponse, OllamaBackend, RenderError,
};
pub use crate::merge::merge;
pub use crate::trace::{execute_traced, TraceOutcome, TraceRequest};

use anyhow::{Context, Result};
use std::path::Path;

/// Read a source file in full as UTF-8.
pub fn read_file(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

/// Full static+dynamic pass over one file: extract facts, trace the entry
/// routine, merge into ordered records. Returns the records together with
/// whatever the traced call printed.
pub fn explain_file(path: &Path, request: &TraceRequest) -> Result<(Vec<LineRecord>, String)> {
    let source = read_file(path)?;
    let fact_map = extract_facts(&source)?;
    let outcome = execute_traced(path, request)?;
    let records = merge(&source, &fact_map, &outcome.hits);
    Ok((records, outcome.output))
}
