//! Core data types shared across the analysis pipeline.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Line number -> facts recorded for that line, in tree traversal order.
pub type FactMap = BTreeMap<usize, Vec<String>>;

/// Line number -> times that line executed during the traced call.
///
/// Entries exist only for lines of the analyzed file; hits attributed to
/// other files during the same call are discarded at extraction time.
pub type HitCountMap = BTreeMap<usize, u64>;

/// Prefix of the runtime annotation appended by the merger.
pub const RUNTIME_PREFIX: &str = "runtime: executed ";

/// Fact used when a line carries no structural events and no hit count.
pub const NO_EVENTS_PLACEHOLDER: &str =
    "no structural events; likely comment/blank or simple expression";

/// One merged per-line explanation record.
///
/// `facts` holds the static facts for the line in traversal order, followed
/// by the runtime annotation when the line executed during the trace. It is
/// never empty: lines with neither get the placeholder fact instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineRecord {
    pub line: usize,
    pub code: String,
    pub facts: Vec<String>,
}

impl LineRecord {
    /// Whether the merger recorded a hit count for this line.
    pub fn has_runtime_annotation(&self) -> bool {
        self.facts.iter().any(|f| f.starts_with(RUNTIME_PREFIX))
    }
}
