//! Explanation rendering through a local LLM backend.
//!
//! The backend only restates grounded facts; everything it is allowed to say
//! is pinned down by the prompt, and its reply must be one strict JSON
//! object. Failures here are always fatal: there is no degraded best-effort
//! explanation mode. Only per-attempt timeouts are retried, up to the
//! configured bound.

mod ollama;

pub use ollama::OllamaBackend;

use crate::core::LineRecord;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const SYSTEM_PROMPT: &str = r#"You are a code explainer.
You will be given, for each line: the original code and a list of FACTS derived from AST/runtime.
RULES:
- ONLY restate those facts. Do not invent behavior or values not present in facts.
- If something is unknown, say 'unknown from provided facts'.
- Keep explanations short (1-2 sentences per line).
- Include the line number.
- If a potential issue is EVIDENT from facts (e.g., never executed, risky IO, untrusted network, high fail rate), emit a 'red_flag' with a one-line reason.
- Output strict JSON: { "lines": [ { "line": <int>, "explanation": "<string>", "red_flags": ["..."] } ] }"#;

const CLOSING_INSTRUCTION: &str = "Now produce the JSON as specified.";

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("no local LLM runner found (expected ollama); install it and retry")]
    BackendUnavailable,
    #[error("backend attempt timed out after {0} seconds")]
    AttemptTimeout(u64),
    #[error("backend timed out on all {attempts} attempts")]
    RetriesExhausted { attempts: u32 },
    #[error("backend command failed: {stderr}")]
    BackendFailed { stderr: String },
    #[error("backend response contains no JSON object")]
    MissingJson,
    #[error("backend response is not valid JSON: {0}")]
    MalformedJson(#[from] serde_json::Error),
    #[error("backend I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Minimal synchronous boundary to the language-model runtime: prompt in,
/// raw text out.
pub trait LlmBackend {
    fn invoke(&self, prompt: &str) -> Result<String, RenderError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineExplanation {
    pub line: usize,
    pub explanation: String,
    #[serde(default)]
    pub red_flags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LlmResponse {
    pub lines: Vec<LineExplanation>,
}

/// Deterministic warnings appended before rendering, independent of any
/// model judgment. Added flags become one combined `precheck_flags`
/// annotation on the record.
pub fn apply_precheck_flags(records: &mut [LineRecord]) {
    for record in records.iter_mut() {
        let mut flags = Vec::new();
        if !record.has_runtime_annotation() {
            flags.push("never_executed_in_trace");
        }
        if record
            .facts
            .iter()
            .any(|f| f.contains("writes_to_network") || f.contains("scrape_untrusted"))
        {
            flags.push("risky_io_or_network");
        }
        if record.facts.iter().any(|f| f.contains("execute_code")) {
            flags.push("dynamic_code_execution");
        }
        if !flags.is_empty() {
            record.facts.push(format!("precheck_flags: {}", flags.join(",")));
        }
    }
}

/// Serialize the ordered records into the fixed instruction template, one
/// JSON object per line record.
pub fn build_prompt(records: &[LineRecord]) -> Result<String, RenderError> {
    let mut items = String::new();
    for record in records {
        items.push_str(&serde_json::to_string(record)?);
        items.push('\n');
    }
    Ok(format!(
        "system\n{SYSTEM_PROMPT}\n\nuser\nCODE FACTS:\n{items}{CLOSING_INSTRUCTION}\n"
    ))
}

/// Parse the substring between the first `{` and the last `}` of a raw
/// backend reply as the structured response. Anything unparsable is fatal.
pub fn parse_response(raw: &str) -> Result<LlmResponse, RenderError> {
    let start = raw.find('{').ok_or(RenderError::MissingJson)?;
    let end = raw.rfind('}').ok_or(RenderError::MissingJson)?;
    if end < start {
        return Err(RenderError::MissingJson);
    }
    Ok(serde_json::from_str(&raw[start..=end])?)
}

/// Render the records through `backend`, retrying only timed-out attempts.
/// `retries` is the number of additional attempts after the first.
pub fn render_explanations(
    records: &[LineRecord],
    backend: &dyn LlmBackend,
    retries: u32,
) -> Result<LlmResponse, RenderError> {
    let prompt = build_prompt(records)?;
    let attempts = retries + 1;
    for attempt in 1..=attempts {
        match backend.invoke(&prompt) {
            Ok(raw) => return parse_response(&raw),
            Err(RenderError::AttemptTimeout(secs)) if attempt < attempts => {
                log::warn!("backend attempt {attempt}/{attempts} timed out after {secs}s; retrying");
            }
            Err(RenderError::AttemptTimeout(_)) => {
                return Err(RenderError::RetriesExhausted { attempts });
            }
            Err(other) => return Err(other),
        }
    }
    Err(RenderError::RetriesExhausted { attempts })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;

    fn record(line: usize, facts: &[&str]) -> LineRecord {
        LineRecord {
            line,
            code: format!("code {line}"),
            facts: facts.iter().map(|f| f.to_string()).collect(),
        }
    }

    struct ScriptedBackend {
        replies: RefCell<Vec<Result<String, RenderError>>>,
        calls: RefCell<u32>,
    }

    impl ScriptedBackend {
        fn new(replies: Vec<Result<String, RenderError>>) -> Self {
            Self {
                replies: RefCell::new(replies),
                calls: RefCell::new(0),
            }
        }
    }

    impl LlmBackend for ScriptedBackend {
        fn invoke(&self, _prompt: &str) -> Result<String, RenderError> {
            *self.calls.borrow_mut() += 1;
            self.replies.borrow_mut().remove(0)
        }
    }

    const GOOD_REPLY: &str =
        r#"Sure! {"lines": [{"line": 1, "explanation": "assigns x", "red_flags": []}]} done"#;

    #[test]
    fn unexecuted_record_gets_the_never_executed_flag() {
        let mut records = vec![record(5, &["return: 0"])];
        apply_precheck_flags(&mut records);
        assert_eq!(
            records[0].facts,
            vec![
                "return: 0".to_string(),
                "precheck_flags: never_executed_in_trace".to_string(),
            ]
        );
    }

    #[test]
    fn executed_record_gets_no_never_executed_flag() {
        let mut records = vec![record(2, &["assign: y = 1", "runtime: executed 1 times"])];
        apply_precheck_flags(&mut records);
        assert!(!records[0].facts.iter().any(|f| f.starts_with("precheck_flags")));
    }

    #[test]
    fn risky_and_dynamic_markers_combine_into_one_annotation() {
        let mut records = vec![record(
            3,
            &["call: writes_to_network(...)", "call: execute_code(...)"],
        )];
        apply_precheck_flags(&mut records);
        assert_eq!(
            records[0].facts.last().unwrap(),
            "precheck_flags: never_executed_in_trace,risky_io_or_network,dynamic_code_execution"
        );
    }

    #[test]
    fn prompt_contains_instructions_and_serialized_records() {
        let records = vec![record(1, &["assign: x = 1"])];
        let prompt = build_prompt(&records).unwrap();
        assert!(prompt.contains("You are a code explainer."));
        assert!(prompt.contains(r#""line":1"#));
        assert!(prompt.contains("Now produce the JSON as specified."));
    }

    #[test]
    fn response_json_is_located_between_first_and_last_brace() {
        let response = parse_response(GOOD_REPLY).unwrap();
        assert_eq!(response.lines.len(), 1);
        assert_eq!(response.lines[0].line, 1);
        assert_eq!(response.lines[0].explanation, "assigns x");
    }

    #[test]
    fn response_without_braces_is_fatal() {
        assert!(matches!(
            parse_response("no json here"),
            Err(RenderError::MissingJson)
        ));
    }

    #[test]
    fn unbalanced_response_json_is_fatal() {
        let raw = r#"{"lines": [{"line": 1, "explanation": }"#;
        assert!(matches!(
            parse_response(raw),
            Err(RenderError::MalformedJson(_))
        ));
    }

    #[test]
    fn two_timeouts_then_success_returns_the_parsed_response() {
        let backend = ScriptedBackend::new(vec![
            Err(RenderError::AttemptTimeout(1)),
            Err(RenderError::AttemptTimeout(1)),
            Ok(GOOD_REPLY.to_string()),
        ]);
        let records = vec![record(1, &["assign: x = 1"])];
        let response = render_explanations(&records, &backend, 2).unwrap();
        assert_eq!(response.lines.len(), 1);
        assert_eq!(*backend.calls.borrow(), 3);
    }

    #[test]
    fn exhausting_the_retry_bound_is_fatal() {
        let backend = ScriptedBackend::new(vec![
            Err(RenderError::AttemptTimeout(1)),
            Err(RenderError::AttemptTimeout(1)),
            Err(RenderError::AttemptTimeout(1)),
        ]);
        let records = vec![record(1, &["assign: x = 1"])];
        let result = render_explanations(&records, &backend, 2);
        assert!(matches!(
            result,
            Err(RenderError::RetriesExhausted { attempts: 3 })
        ));
        assert_eq!(*backend.calls.borrow(), 3);
    }

    #[test]
    fn non_timeout_failures_are_not_retried() {
        let backend = ScriptedBackend::new(vec![Err(RenderError::BackendFailed {
            stderr: "model not found".to_string(),
        })]);
        let records = vec![record(1, &["assign: x = 1"])];
        let result = render_explanations(&records, &backend, 2);
        assert!(matches!(result, Err(RenderError::BackendFailed { .. })));
        assert_eq!(*backend.calls.borrow(), 1);
    }
}
