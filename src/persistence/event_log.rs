//! JSONL Event Logging for Crash-Safe Session Recording
//!
//! Every user/assistant turn and every bookkeeping action is appended to a
//! per-session JSONL file as one self-contained line. A crash can only ever
//! damage the last, partially written line; readers skip it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use super::naming::{log_file_name, sanitize_segment, SessionManifest};
use crate::error::{SessionError, SessionResult};

/// Event types that can be logged to the session JSONL file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LogEvent {
    /// First line of every log written by this crate
    SessionStart {
        timestamp: DateTime<Utc>,
        session_id: String,
        user: String,
    },
    UserMessage {
        timestamp: DateTime<Utc>,
        content: String,
    },
    AssistantMessage {
        timestamp: DateTime<Utc>,
        content: String,
    },
    /// Free-form bookkeeping (system notes, transcript clears, resumes)
    ActionLog {
        timestamp: DateTime<Utc>,
        action: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content: Option<String>,
        #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
        data: serde_json::Value,
    },
    /// Operator answer to a confirmation prompt
    ApprovalDecision {
        timestamp: DateTime<Utc>,
        action: String,
        approved: bool,
    },
    /// An external tool ran
    ToolExecution {
        timestamp: DateTime<Utc>,
        tool: String,
        args: serde_json::Value,
        success: bool,
        output: String,
    },
}

impl LogEvent {
    pub fn user_message(content: impl Into<String>) -> Self {
        Self::UserMessage {
            timestamp: Utc::now(),
            content: content.into(),
        }
    }

    pub fn assistant_message(content: impl Into<String>) -> Self {
        Self::AssistantMessage {
            timestamp: Utc::now(),
            content: content.into(),
        }
    }

    pub fn action(action: impl Into<String>, content: Option<String>) -> Self {
        Self::ActionLog {
            timestamp: Utc::now(),
            action: action.into(),
            content,
            data: serde_json::Value::Null,
        }
    }

    pub fn approval(action: impl Into<String>, approved: bool) -> Self {
        Self::ApprovalDecision {
            timestamp: Utc::now(),
            action: action.into(),
            approved,
        }
    }

    pub fn tool_execution(
        tool: impl Into<String>,
        args: serde_json::Value,
        success: bool,
        output: impl Into<String>,
    ) -> Self {
        Self::ToolExecution {
            timestamp: Utc::now(),
            tool: tool.into(),
            args,
            success,
            output: output.into(),
        }
    }

    /// The `event` tag as written to disk
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SessionStart { .. } => "session_start",
            Self::UserMessage { .. } => "user_message",
            Self::AssistantMessage { .. } => "assistant_message",
            Self::ActionLog { .. } => "action_log",
            Self::ApprovalDecision { .. } => "approval_decision",
            Self::ToolExecution { .. } => "tool_execution",
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::SessionStart { timestamp, .. }
            | Self::UserMessage { timestamp, .. }
            | Self::AssistantMessage { timestamp, .. }
            | Self::ActionLog { timestamp, .. }
            | Self::ApprovalDecision { timestamp, .. }
            | Self::ToolExecution { timestamp, .. } => *timestamp,
        }
    }
}

/// Append-only JSONL event logger for one session.
///
/// Owns the append cursor of its file for as long as it lives.
#[derive(Debug)]
pub struct EventLogger {
    session_id: String,
    log_path: PathBuf,
    file: File,
}

impl EventLogger {
    /// Start a new session log in `logs_dir`, writing the `session_start`
    /// line and the sidecar manifest.
    pub fn create(
        logs_dir: &Path,
        session_id: &str,
        user: &str,
        created_at: DateTime<Utc>,
    ) -> SessionResult<Self> {
        fs::create_dir_all(logs_dir).map_err(|e| SessionError::persistence(logs_dir, e))?;

        let user = sanitize_segment(user);
        let file_name = log_file_name(session_id, created_at, &user);
        let log_path = logs_dir.join(&file_name);

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
            .map_err(|e| SessionError::persistence(&log_path, e))?;

        let mut logger = Self {
            session_id: session_id.to_string(),
            log_path,
            file,
        };

        let is_new = fs::metadata(&logger.log_path)
            .map(|m| m.len() == 0)
            .unwrap_or(true);
        if is_new {
            logger.append(&LogEvent::SessionStart {
                timestamp: created_at,
                session_id: session_id.to_string(),
                user: user.clone(),
            })?;
        }

        SessionManifest::new(session_id, created_at, &user, &file_name).write(logs_dir)?;

        tracing::debug!("Created session log {}", logger.log_path.display());
        Ok(logger)
    }

    /// Re-open an existing session log for appending
    ///
    /// A torn last line left by a crash is terminated first, so the next
    /// event starts on a line of its own.
    pub fn resume(log_path: &Path, session_id: &str) -> SessionResult<Self> {
        let mut file = OpenOptions::new()
            .read(true)
            .append(true)
            .open(log_path)
            .map_err(|e| SessionError::persistence(log_path, e))?;

        terminate_torn_tail(&mut file).map_err(|e| SessionError::persistence(log_path, e))?;

        Ok(Self {
            session_id: session_id.to_string(),
            log_path: log_path.to_path_buf(),
            file,
        })
    }

    /// Append one event. The line is complete on disk when this returns.
    pub fn append(&mut self, event: &LogEvent) -> SessionResult<()> {
        let mut line = serde_json::to_string(event)
            .map_err(|e| SessionError::persistence(&self.log_path, e.into()))?;
        line.push('\n');

        self.file
            .write_all(line.as_bytes())
            .and_then(|_| self.file.flush())
            .map_err(|e| SessionError::persistence(&self.log_path, e))
    }

    pub fn log_user_message(&mut self, content: &str) -> SessionResult<()> {
        self.append(&LogEvent::user_message(content))
    }

    pub fn log_assistant_message(&mut self, content: &str) -> SessionResult<()> {
        self.append(&LogEvent::assistant_message(content))
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }
}

fn terminate_torn_tail(file: &mut File) -> std::io::Result<()> {
    if file.metadata()?.len() == 0 {
        return Ok(());
    }

    let mut last = [0u8; 1];
    file.seek(SeekFrom::End(-1))?;
    file.read_exact(&mut last)?;
    if last[0] != b'\n' {
        tracing::warn!("Session log ends mid-record; starting a new line");
        file.write_all(b"\n")?;
        file.flush()?;
    }
    Ok(())
}
