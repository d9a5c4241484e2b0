//! Subtask-list generation boundary (the external decomposition step).
//!
//! The [`SubtaskGenerator`] trait decouples run bootstrap from the language
//! model that decomposes the instruction. The production impl spawns a
//! configured command, feeding the prompt on stdin and reading the reply
//! from stdout. Tests use scripted generators that return predetermined
//! replies without spawning processes.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, info, instrument, warn};

use crate::io::process::{CommandOutput, run_command_with_timeout};

/// Parameters for one generation attempt.
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    /// Full generation prompt, fed on stdin.
    pub prompt: String,
    /// Path to write the generator stdout/stderr log.
    pub log_path: PathBuf,
    /// Maximum time to wait for the generator to complete.
    pub timeout: Duration,
    /// Truncate generator output logs beyond this many bytes.
    pub output_limit_bytes: usize,
}

/// Abstraction over subtask-list generation backends.
pub trait SubtaskGenerator {
    /// Run one generation attempt and return the raw reply text.
    fn generate(&self, request: &GenerateRequest) -> Result<String>;
}

/// Generator that spawns a configured command.
pub struct CommandGenerator {
    command: Vec<String>,
}

impl CommandGenerator {
    pub fn new(command: Vec<String>) -> Self {
        Self { command }
    }
}

impl SubtaskGenerator for CommandGenerator {
    #[instrument(skip_all, fields(timeout_secs = request.timeout.as_secs()))]
    fn generate(&self, request: &GenerateRequest) -> Result<String> {
        let program = self
            .command
            .first()
            .ok_or_else(|| anyhow!("generator command is empty"))?;
        info!(program = %program, "starting subtask generation");

        let mut cmd = Command::new(program);
        cmd.args(&self.command[1..]);

        let output = run_command_with_timeout(
            cmd,
            Some(request.prompt.as_bytes()),
            request.timeout,
            request.output_limit_bytes,
        )
        .context("run generator command")?;

        write_generator_log(&request.log_path, &output, request.output_limit_bytes)?;

        if output.timed_out {
            warn!(
                timeout_secs = request.timeout.as_secs(),
                "generator timed out"
            );
            return Err(anyhow!("generator timed out after {:?}", request.timeout));
        }
        if !output.status.success() {
            warn!(exit_code = ?output.status.code(), "generator failed");
            return Err(anyhow!(
                "generator failed with status {:?}",
                output.status.code()
            ));
        }

        debug!("generation attempt completed");
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

fn write_generator_log(path: &Path, output: &CommandOutput, output_limit: usize) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create generator log dir {}", parent.display()))?;
    }
    let mut buf = String::new();
    buf.push_str("=== stdout ===\n");
    buf.push_str(&String::from_utf8_lossy(&output.stdout));
    buf.push_str(&output.stdout_truncated_notice("generator"));
    buf.push_str("\n=== stderr ===\n");
    buf.push_str(&String::from_utf8_lossy(&output.stderr));
    buf.push_str(&output.stderr_truncated_notice("generator"));
    if output.timed_out {
        buf.push_str("\n[generator timed out]\n");
    }

    if buf.len() > output_limit {
        let truncated = format!(
            "{}\n[truncated {} bytes]\n",
            &buf[..output_limit],
            buf.len() - output_limit
        );
        fs::write(path, truncated)
            .with_context(|| format!("write generator log {}", path.display()))?;
        return Ok(());
    }

    fs::write(path, buf).with_context(|| format!("write generator log {}", path.display()))
}
