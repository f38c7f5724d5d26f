//! Runtime configuration: backend parameters and interpreter discovery.
//!
//! Values are compiled defaults with environment overrides, consulted when
//! the configuration is constructed. Nothing is negotiated at call time.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_MODEL: &str = "llama3.2";
pub const DEFAULT_TIMEOUT_SECS: u64 = 600;
pub const DEFAULT_RETRIES: u32 = 2;

/// Parameters of the local LLM backend invocation.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Executable name, resolved through PATH.
    pub binary: String,
    /// Model tag passed to the runner.
    pub model: String,
    /// Hard per-attempt timeout.
    pub timeout: Duration,
    /// Additional attempts after the first, used only for timeouts.
    pub retries: u32,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

impl BackendConfig {
    pub fn from_env() -> Self {
        let model = std::env::var("LINEMAP_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        let timeout_secs = std::env::var("LINEMAP_LLM_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);
        let retries = std::env::var("LINEMAP_LLM_RETRIES")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_RETRIES);
        Self {
            binary: "ollama".to_string(),
            model,
            timeout: Duration::from_secs(timeout_secs),
            retries,
        }
    }
}

/// Resolve the CPython interpreter used for traced execution.
///
/// `LINEMAP_PYTHON` overrides PATH discovery.
pub fn python_interpreter() -> Result<PathBuf> {
    if let Ok(custom) = std::env::var("LINEMAP_PYTHON") {
        return Ok(PathBuf::from(custom));
    }
    which::which("python3")
        .context("python3 not found on PATH; traced execution needs a CPython interpreter")
}
