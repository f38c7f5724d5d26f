//! Ollama-backed implementation of the rendering boundary.

use super::{LlmBackend, RenderError};
use crate::config::BackendConfig;
use once_cell::sync::Lazy;
use std::io::{Read, Write};
use std::process::{ChildStderr, ChildStdout, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

// Probed once per process; rendering is refused outright when absent.
static BACKEND_AVAILABLE: Lazy<bool> = Lazy::new(|| which::which("ollama").is_ok());

const POLL_INTERVAL: Duration = Duration::from_millis(25);

pub struct OllamaBackend {
    config: BackendConfig,
}

impl OllamaBackend {
    pub fn new(config: BackendConfig) -> Result<Self, RenderError> {
        if !Self::available() {
            return Err(RenderError::BackendUnavailable);
        }
        Ok(Self { config })
    }

    pub fn available() -> bool {
        *BACKEND_AVAILABLE
    }

    pub fn retries(&self) -> u32 {
        self.config.retries
    }
}

fn drain<R: Read + Send + 'static>(pipe: R) -> thread::JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut pipe = pipe;
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        buf
    })
}

fn missing_pipe(which: &str) -> RenderError {
    RenderError::BackendFailed {
        stderr: format!("child {which} pipe unavailable"),
    }
}

impl LlmBackend for OllamaBackend {
    /// One attempt: pipe the prompt to `ollama run <model>`, enforce the
    /// configured deadline by polling the child and killing it on expiry.
    fn invoke(&self, prompt: &str) -> Result<String, RenderError> {
        log::debug!(
            "invoking {} run {} ({} byte prompt)",
            self.config.binary,
            self.config.model,
            prompt.len()
        );
        let mut child = Command::new(&self.config.binary)
            .arg("run")
            .arg(&self.config.model)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        let mut stdin = child.stdin.take().ok_or_else(|| missing_pipe("stdin"))?;
        let stdout: ChildStdout = child.stdout.take().ok_or_else(|| missing_pipe("stdout"))?;
        let stderr: ChildStderr = child.stderr.take().ok_or_else(|| missing_pipe("stderr"))?;

        // Writer and readers run on their own threads so a large prompt or
        // reply cannot deadlock against a full pipe buffer.
        let payload = prompt.as_bytes().to_vec();
        let writer = thread::spawn(move || {
            let _ = stdin.write_all(&payload);
        });
        let out_reader = drain(stdout);
        let err_reader = drain(stderr);

        let deadline = Instant::now() + self.config.timeout;
        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if Instant::now() >= deadline {
                let _ = child.kill();
                let _ = child.wait();
                return Err(RenderError::AttemptTimeout(self.config.timeout.as_secs()));
            }
            thread::sleep(POLL_INTERVAL);
        };

        let _ = writer.join();
        let stdout = out_reader.join().unwrap_or_default();
        let stderr = err_reader.join().unwrap_or_default();

        if !status.success() {
            return Err(RenderError::BackendFailed {
                stderr: String::from_utf8_lossy(&stderr).into_owned(),
            });
        }
        Ok(String::from_utf8_lossy(&stdout).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn availability_probe_is_stable_across_calls() {
        // the PATH probe runs once per process; later calls reuse its result
        let first = OllamaBackend::available();
        assert_eq!(first, OllamaBackend::available());
        match OllamaBackend::new(BackendConfig::from_env()) {
            Ok(_) => assert!(first),
            Err(RenderError::BackendUnavailable) => assert!(!first),
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
}
