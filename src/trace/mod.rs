//! Instrumented execution of one entry routine in a CPython child process.
//!
//! The ambient capabilities the trace must intercept (interactive input,
//! `time.sleep`, the `__main__` guard) only exist inside the interpreter, so
//! the stub/restore discipline lives in an embedded harness script executed
//! by the child. This side owns process invocation, the JSON job protocol,
//! and decoding of the harness report. Running the analyzed code in a child
//! also keeps its failures from corrupting this process.
//!
//! Hit counts are filtered by file, not by call frame: any same-file routine
//! transitively invoked from the entry routine accumulates into the same
//! counts. Recursion therefore shows combined totals.

use crate::config;
use crate::core::HitCountMap;
use anyhow::{bail, Context, Result};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};

const HARNESS: &str = include_str!("harness.py");

/// One traced invocation: which entry routine, with what inputs.
#[derive(Debug, Clone, Default)]
pub struct TraceRequest {
    /// Name of the routine to invoke; `None` loads the module but traces nothing.
    pub entry: Option<String>,
    /// Positional arguments, as JSON values.
    pub args: Vec<Value>,
    /// Keyword arguments, as JSON values.
    pub kwargs: Map<String, Value>,
    /// Text served to `input()` inside the traced call, one line per read.
    pub stdin: String,
}

/// Per-line hit counts of the analyzed file plus everything the traced call wrote.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TraceOutcome {
    pub hits: HitCountMap,
    pub output: String,
}

#[derive(Deserialize)]
struct HarnessReport {
    counts: BTreeMap<String, u64>,
    output: String,
}

/// Load `path` without triggering its `__main__` block, invoke the requested
/// entry routine under a per-line execution counter, and return the filtered
/// hit counts together with the captured output.
///
/// A missing or non-callable entry is signaled by an empty outcome, never an
/// error. An exception raised by the entry routine (or by module load) is
/// fatal and carries the interpreter's traceback verbatim.
pub fn execute_traced(path: &Path, request: &TraceRequest) -> Result<TraceOutcome> {
    let python = config::python_interpreter()?;
    let job = json!({
        "path": path.to_string_lossy(),
        "entry": request.entry,
        "args": request.args,
        "kwargs": request.kwargs,
        "stdin": request.stdin,
    });

    log::debug!(
        "tracing {} (entry: {:?}) via {}",
        path.display(),
        request.entry,
        python.display()
    );
    let mut child = Command::new(&python)
        .arg("-")
        .arg(job.to_string())
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .with_context(|| format!("Failed to launch {}", python.display()))?;

    // The harness script travels on stdin; the job rides argv.
    if let Some(mut stdin) = child.stdin.take() {
        stdin
            .write_all(HARNESS.as_bytes())
            .context("Failed to send harness to interpreter")?;
    }
    let output = child
        .wait_with_output()
        .context("Failed to wait for interpreter")?;
    let stderr = String::from_utf8_lossy(&output.stderr);

    if !output.status.success() {
        bail!(
            "traced execution of {} failed ({}):\n{}",
            path.display(),
            output.status,
            stderr.trim_end()
        );
    }
    if !stderr.trim().is_empty() {
        log::debug!("interpreter stderr during load: {}", stderr.trim_end());
    }

    let report: HarnessReport = serde_json::from_slice(&output.stdout)
        .context("Harness produced an unreadable report")?;
    let mut hits = HitCountMap::new();
    for (line, count) in report.counts {
        let line: usize = line
            .parse()
            .context("Harness reported a non-numeric line number")?;
        hits.insert(line, count);
    }
    Ok(TraceOutcome {
        hits,
        output: report.output,
    })
}
