//! Session lifecycle: the single entry point the interactive shell uses to
//! start, list, search, resume and delete sessions.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fmt;

use crate::config::StorageConfig;
use crate::error::{SessionError, SessionResult};
use crate::permissions::{Operation, Permission, PermissionCheck};
use crate::persistence::naming::new_session_id;
use crate::persistence::{
    ConversationMemory, DeleteReport, EventLogger, LoadedSession, LogEvent, SessionIndex,
    SessionStatistics, SessionSummary,
};

/// What the operator sees after a session is resumed
#[derive(Debug, Clone, PartialEq)]
pub struct ResumeSummary {
    pub session_id: String,
    pub user: String,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub last_activity: DateTime<Utc>,
    pub message_count: usize,
}

impl fmt::Display for ResumeSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "✓ Session loaded: {} ({} messages)", self.session_id, self.message_count)?;
        writeln!(
            f,
            "📅 Created: {}",
            self.started_at
                .unwrap_or(self.created_at)
                .format("%Y-%m-%d %H:%M:%S")
        )?;
        write!(
            f,
            "📝 Last activity: {}",
            self.last_activity.format("%Y-%m-%d %H:%M:%S")
        )
    }
}

pub struct SessionManager {
    storage: StorageConfig,
    index: SessionIndex,
    permissions: Box<dyn PermissionCheck>,
}

impl SessionManager {
    pub fn new(storage: StorageConfig, permissions: Box<dyn PermissionCheck>) -> Self {
        let index = storage.index();
        Self {
            storage,
            index,
            permissions,
        }
    }

    pub fn index(&self) -> &SessionIndex {
        &self.index
    }

    pub fn storage(&self) -> &StorageConfig {
        &self.storage
    }

    pub fn permissions(&self) -> &dyn PermissionCheck {
        self.permissions.as_ref()
    }

    /// Start a fresh session with its own log and memory snapshot
    pub fn start(&self, user: &str) -> SessionResult<ConversationMemory> {
        let now = Utc::now();
        let session_id = new_session_id(now);
        let logger = EventLogger::create(&self.storage.logs_dir, &session_id, user, now)?;
        tracing::info!("Started session {}", session_id);
        ConversationMemory::open(&session_id, &self.storage.memory_dir, Some(logger))
    }

    /// Rebuild a past session from its log and continue appending to it
    pub fn resume(&self, id: &str) -> SessionResult<(ConversationMemory, ResumeSummary)> {
        self.ensure(Operation::ResumeSession(id))?;

        let loaded = self.load(id)?;
        let summary = loaded.summary;
        let message_count = loaded.messages.len();

        let logger = EventLogger::resume(&summary.path, &summary.session_id)?;
        let mut memory =
            ConversationMemory::open(&summary.session_id, &self.storage.memory_dir, Some(logger))?;
        memory.seed(loaded.messages, summary.created_at)?;
        memory.record(LogEvent::action(
            "resume",
            Some(format!("restored {} messages", message_count)),
        ))?;

        tracing::info!("Resumed session {} with {} messages", summary.session_id, message_count);

        let resume = ResumeSummary {
            session_id: summary.session_id,
            user: summary.user,
            created_at: summary.created_at,
            started_at: summary.started_at,
            last_activity: summary.last_activity,
            message_count,
        };
        Ok((memory, resume))
    }

    pub fn list(&self, limit: usize) -> SessionResult<Vec<SessionSummary>> {
        self.ensure(Operation::ListSessions)?;
        Ok(self.index.list_sessions(limit))
    }

    pub fn search(&self, query: &str, limit: usize) -> SessionResult<Vec<SessionSummary>> {
        self.ensure(Operation::ListSessions)?;
        Ok(self.index.search_sessions(query, limit))
    }

    /// Reconstruct a past session without resuming it
    pub fn load(&self, id: &str) -> SessionResult<LoadedSession> {
        self.ensure(Operation::LoadSession(id))?;
        self.index
            .load_session(id)?
            .ok_or_else(|| SessionError::not_found(id))
    }

    /// Delete every artifact of a session. Partial failures are reported in
    /// the returned report; nothing removed at all is `NotFound`.
    pub fn delete(&self, id: &str) -> SessionResult<DeleteReport> {
        self.ensure(Operation::DeleteSession(id))?;
        let report = self.index.delete_session(id);
        if !report.deleted() && report.failed.is_empty() {
            return Err(SessionError::not_found(id));
        }
        Ok(report)
    }

    pub fn statistics(&self) -> SessionStatistics {
        let sessions = self.index.list_sessions(self.storage.stats_window);

        let total_sessions = sessions.len();
        let total_messages: usize = sessions.iter().map(|s| s.total_interactions).sum();
        let mut users: BTreeMap<String, usize> = BTreeMap::new();
        for session in &sessions {
            *users.entry(session.user.clone()).or_insert(0) += 1;
        }

        SessionStatistics {
            total_sessions,
            total_messages,
            users,
            average_messages_per_session: if total_sessions > 0 {
                total_messages as f64 / total_sessions as f64
            } else {
                0.0
            },
        }
    }

    fn ensure(&self, operation: Operation<'_>) -> SessionResult<()> {
        match self.permissions.check(&operation) {
            Permission::Allowed => Ok(()),
            Permission::Denied(reason) => {
                tracing::warn!("Refused {}: {}", operation.name(), reason);
                Err(SessionError::permission_denied(format!(
                    "{} ({})",
                    operation.name(),
                    reason
                )))
            }
        }
    }
}

/// Render summaries as a fixed-width table
pub fn format_sessions_table(sessions: &[SessionSummary]) -> String {
    if sessions.is_empty() {
        return "\n📭 No saved sessions\n".to_string();
    }

    let rule = "=".repeat(100);
    let mut output = String::new();
    output.push_str(&format!("\n{}\n📚 SAVED SESSIONS\n{}\n\n", rule, rule));
    output.push_str(&format!(
        "{:<4} {:<26} {:<18} {:<10} {:<12} {:<30}\n",
        "#", "Session ID", "Date", "Messages", "User", "Preview"
    ));
    output.push_str(&"-".repeat(100));
    output.push('\n');

    for (idx, session) in sessions.iter().enumerate() {
        let id: String = session.session_id.chars().take(26).collect();
        let preview: String = session.last_message_preview.chars().take(30).collect();
        output.push_str(&format!(
            "{:<4} {:<26} {:<18} {:<10} {:<12} {:<30}\n",
            idx + 1,
            id,
            session.created_at.format("%d/%m/%Y %H:%M"),
            session.total_interactions,
            session.user,
            preview
        ));
    }

    output.push_str(&rule);
    output.push('\n');
    output
}
