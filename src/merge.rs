//! Merging static facts with dynamic hit counts into ordered records.

use crate::core::{FactMap, HitCountMap, LineRecord, NO_EVENTS_PLACEHOLDER, RUNTIME_PREFIX};

/// Combine facts and hit counts into one record per non-blank source line.
///
/// Records come out in strictly ascending line order, covering every
/// non-blank line exactly once. A line with neither facts nor hits gets the
/// single placeholder fact, so no record has an empty facts list.
pub fn merge(source: &str, facts: &FactMap, hits: &HitCountMap) -> Vec<LineRecord> {
    let mut records = Vec::new();
    for (index, text) in source.lines().enumerate() {
        let line = index + 1;
        if text.trim().is_empty() {
            continue;
        }

        let mut line_facts: Vec<String> = facts.get(&line).cloned().unwrap_or_default();
        if let Some(count) = hits.get(&line) {
            line_facts.push(format!("{RUNTIME_PREFIX}{count} times"));
        }
        if line_facts.is_empty() {
            line_facts.push(NO_EVENTS_PLACEHOLDER.to_string());
        }

        records.push(LineRecord {
            line,
            code: text.trim_end().to_string(),
            facts: line_facts,
        });
    }
    records
}
