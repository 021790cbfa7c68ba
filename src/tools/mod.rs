//! External command execution for `!<command>` lines.
//!
//! Commands run through `sh -c` with a timeout and an output cap. The
//! outcome is recorded in the session through `ConversationMemory`, which
//! is the only place tool results are written.

use anyhow::{Context, Result};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

use crate::config::ToolConfig;
use crate::error::SessionResult;
use crate::persistence::{ConversationMemory, LogEvent, Role};

/// Tool name recorded for shell passthrough commands
pub const SHELL_TOOL: &str = "shell";

/// Result of one external command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutcome {
    pub command: String,
    pub success: bool,
    pub timed_out: bool,
    pub output: String,
}

impl ToolOutcome {
    /// Write the outcome to the session: a `tool_execution` event followed
    /// by the output as an assistant message.
    pub fn record(&self, memory: &mut ConversationMemory) -> SessionResult<()> {
        memory.record(LogEvent::tool_execution(
            SHELL_TOOL,
            json!({ "command": self.command }),
            self.success,
            self.output.clone(),
        ))?;

        let mut metadata = serde_json::Map::new();
        metadata.insert("tool".to_string(), json!(SHELL_TOOL));
        metadata.insert("command".to_string(), json!(self.command));
        metadata.insert("success".to_string(), json!(self.success));
        memory.add_message(Role::Assistant, self.output.clone(), Some(metadata))
    }
}

pub struct ToolRunner {
    config: ToolConfig,
    working_dir: PathBuf,
}

impl ToolRunner {
    pub fn new(config: ToolConfig, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            config,
            working_dir: working_dir.into(),
        }
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    pub async fn run(&self, command: &str) -> Result<ToolOutcome> {
        let timeout_secs = self.config.timeout_secs;
        let timeout = tokio::time::Duration::from_secs(timeout_secs);

        tracing::debug!("Executing command with {}s timeout: {}", timeout_secs, command);

        let mut child = Command::new("sh")
            .arg("-c")
            .arg(command)
            .current_dir(&self.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .context("Failed to spawn command")?;

        let mut stdout = child.stdout.take().context("Failed to capture stdout")?;
        let mut stderr = child.stderr.take().context("Failed to capture stderr")?;

        let result = tokio::time::timeout(timeout, async {
            let mut stdout_buf = Vec::new();
            let mut stderr_buf = Vec::new();

            let (stdout_result, stderr_result) = tokio::join!(
                tokio::io::AsyncReadExt::read_to_end(&mut stdout, &mut stdout_buf),
                tokio::io::AsyncReadExt::read_to_end(&mut stderr, &mut stderr_buf)
            );
            stdout_result.context("Failed to read stdout")?;
            stderr_result.context("Failed to read stderr")?;

            let status = child.wait().await.context("Failed to wait for process")?;
            Ok::<_, anyhow::Error>((stdout_buf, stderr_buf, status))
        })
        .await;

        match result {
            Ok(Ok((stdout_buf, stderr_buf, status))) => {
                let stdout_str = String::from_utf8_lossy(&stdout_buf);
                let stderr_str = String::from_utf8_lossy(&stderr_buf);

                let mut output = String::new();
                output.push_str(&stdout_str);
                if !stderr_str.is_empty() {
                    if !output.is_empty() && !output.ends_with('\n') {
                        output.push('\n');
                    }
                    output.push_str(&stderr_str);
                }
                if !status.success() {
                    if !output.is_empty() && !output.ends_with('\n') {
                        output.push('\n');
                    }
                    output.push_str(&format!("[Exit status: {}]", status));
                }

                Ok(ToolOutcome {
                    command: command.to_string(),
                    success: status.success(),
                    timed_out: false,
                    output: truncate_output(output, self.config.max_output_bytes),
                })
            }
            Ok(Err(e)) => Err(e),
            Err(_) => {
                tracing::warn!(
                    "Command timed out after {}s, attempting to kill process: {}",
                    timeout_secs,
                    command
                );
                if let Err(kill_err) = child.kill().await {
                    tracing::error!("Failed to kill timed-out process: {}", kill_err);
                }

                Ok(ToolOutcome {
                    command: command.to_string(),
                    success: false,
                    timed_out: true,
                    output: format!(
                        "⏱️  COMMAND TIMED OUT\n\nThe command '{}' exceeded the timeout of {} seconds and was terminated.\n\
                        Raise [tools] timeout_secs in the config for long-running scans.",
                        command, timeout_secs
                    ),
                })
            }
        }
    }
}

/// Truncate output if it exceeds the maximum size
pub fn truncate_output(output: String, max_bytes: usize) -> String {
    if output.len() <= max_bytes {
        return output;
    }

    let mut safe_end = max_bytes;
    while !output.is_char_boundary(safe_end) {
        safe_end -= 1;
    }

    let mut result = output[..safe_end].to_string();
    result.push_str(&format!(
        "\n\n[OUTPUT TRUNCATED: {} bytes omitted. Total output was {} bytes, limit is {} bytes]",
        output.len() - safe_end,
        output.len(),
        max_bytes
    ));
    result
}
