//! Conversation memory for the active session.
//!
//! The in-memory transcript is mirrored to `{memory_dir}/{session_id}_memory.json`
//! after every mutation. The snapshot is a full overwrite, never a delta, so a
//! successfully returned call always leaves a complete, self-consistent file.
//!
//! Two processes writing the same session id are not coordinated: the last
//! snapshot flush wins and the other process's turns can be lost.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use super::event_log::{EventLogger, LogEvent};
use super::models::{deserialize_timestamp, Message, Role};
use super::naming::memory_file_name;
use crate::error::{SessionError, SessionResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryMetadata {
    pub session_id: String,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub last_updated: DateTime<Utc>,
}

/// On-disk snapshot layout: exactly `metadata` and `messages`
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Snapshot {
    metadata: MemoryMetadata,
    messages: Vec<Message>,
}

/// What the memory last saw on disk, used to notice outside writes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Fingerprint {
    len: u64,
    modified: Option<SystemTime>,
}

impl Fingerprint {
    fn of(path: &Path) -> Option<Self> {
        let meta = fs::metadata(path).ok()?;
        Some(Self {
            len: meta.len(),
            modified: meta.modified().ok(),
        })
    }
}

/// Counts over the current transcript
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemorySummary {
    pub session_id: String,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    pub total_messages: usize,
    pub user_messages: usize,
    pub assistant_messages: usize,
}

/// Live transcript of the current session
#[derive(Debug)]
pub struct ConversationMemory {
    memory_path: PathBuf,
    metadata: MemoryMetadata,
    messages: Vec<Message>,
    logger: Option<EventLogger>,
    fingerprint: Option<Fingerprint>,
}

impl ConversationMemory {
    /// Open the memory for `session_id`, seeding it from an existing snapshot.
    ///
    /// A corrupt snapshot is logged and ignored; the memory starts empty.
    pub fn open(
        session_id: &str,
        memory_dir: &Path,
        logger: Option<EventLogger>,
    ) -> SessionResult<Self> {
        fs::create_dir_all(memory_dir).map_err(|e| SessionError::persistence(memory_dir, e))?;

        let now = Utc::now();
        let mut memory = Self {
            memory_path: memory_dir.join(memory_file_name(session_id)),
            metadata: MemoryMetadata {
                session_id: session_id.to_string(),
                created_at: now,
                last_updated: now,
            },
            messages: Vec::new(),
            logger,
            fingerprint: None,
        };

        if memory.memory_path.exists() {
            match read_snapshot(&memory.memory_path) {
                Ok(snapshot) => {
                    tracing::info!(
                        "Loaded memory for {}: {} messages",
                        session_id,
                        snapshot.messages.len()
                    );
                    memory.metadata = snapshot.metadata;
                    memory.messages = snapshot.messages;
                }
                Err(e) => tracing::warn!("Starting with empty memory: {}", e),
            }
            memory.fingerprint = Fingerprint::of(&memory.memory_path);
        }

        Ok(memory)
    }

    /// Path of the snapshot file for a session
    pub fn snapshot_path(memory_dir: &Path, session_id: &str) -> PathBuf {
        memory_dir.join(memory_file_name(session_id))
    }

    /// Append a message, flush the snapshot and log the matching event.
    ///
    /// On a persistence failure the message is still kept in memory.
    pub fn add_message(
        &mut self,
        role: Role,
        content: impl Into<String>,
        metadata: Option<serde_json::Map<String, serde_json::Value>>,
    ) -> SessionResult<()> {
        self.refresh_if_diverged();

        let mut message = Message::new(role, content);
        if let Some(last) = self.messages.last() {
            message.timestamp = message.timestamp.max(last.timestamp);
        }
        if let Some(metadata) = metadata {
            message = message.with_metadata(metadata);
        }

        let event = match role {
            Role::User => LogEvent::UserMessage {
                timestamp: message.timestamp,
                content: message.content.clone(),
            },
            Role::Assistant => LogEvent::AssistantMessage {
                timestamp: message.timestamp,
                content: message.content.clone(),
            },
            Role::System => LogEvent::ActionLog {
                timestamp: message.timestamp,
                action: "system_message".to_string(),
                content: Some(message.content.clone()),
                data: serde_json::Value::Null,
            },
        };

        self.touch(message.timestamp);
        self.messages.push(message);

        let flushed = self.flush();
        let logged = self.record(event);
        flushed.and(logged)
    }

    /// The last `n` messages, or all of them if there are fewer
    pub fn recent(&self, n: usize) -> &[Message] {
        let start = self.messages.len().saturating_sub(n);
        &self.messages[start..]
    }

    /// Copy of the whole transcript
    pub fn all(&self) -> Vec<Message> {
        self.messages.clone()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Empty the transcript, leaving a valid empty snapshot on disk
    pub fn clear(&mut self) -> SessionResult<()> {
        self.refresh_if_diverged();
        self.messages.clear();
        self.touch(Utc::now());

        let flushed = self.flush();
        let logged = self.record(LogEvent::action("clear", None));
        flushed.and(logged)
    }

    /// Replace the transcript with one reconstructed from a session log.
    ///
    /// The log already holds these turns, so nothing is appended to it.
    pub fn seed(&mut self, messages: Vec<Message>, created_at: DateTime<Utc>) -> SessionResult<()> {
        let newest = messages.last().map(|m| m.timestamp).unwrap_or(created_at);
        self.messages = messages;
        self.metadata.created_at = created_at;
        self.metadata.last_updated = created_at;
        self.touch(newest);
        self.flush()
    }

    /// Append a bookkeeping event to the log without touching the transcript
    pub fn record(&mut self, event: LogEvent) -> SessionResult<()> {
        match self.logger.as_mut() {
            Some(logger) => logger.append(&event),
            None => {
                tracing::debug!("No event log attached; dropping {} event", event.kind());
                Ok(())
            }
        }
    }

    /// Reload from disk if the snapshot changed since this memory last wrote
    /// or read it. Disk wins; a corrupt replacement is reported and ignored.
    pub fn refresh_if_diverged(&mut self) -> bool {
        let current = Fingerprint::of(&self.memory_path);
        if current == self.fingerprint {
            return false;
        }
        self.fingerprint = current;

        if current.is_none() {
            tracing::warn!(
                "Memory snapshot {} disappeared; it will be rewritten on the next change",
                self.memory_path.display()
            );
            return false;
        }

        match read_snapshot(&self.memory_path) {
            Ok(snapshot) => {
                tracing::info!(
                    "Memory snapshot for {} changed on disk; reloaded {} messages",
                    self.metadata.session_id,
                    snapshot.messages.len()
                );
                self.metadata = snapshot.metadata;
                self.messages = snapshot.messages;
                true
            }
            Err(e) => {
                tracing::warn!("Keeping in-memory transcript: {}", e);
                false
            }
        }
    }

    pub fn attach_logger(&mut self, logger: EventLogger) {
        self.logger = Some(logger);
    }

    pub fn logger(&self) -> Option<&EventLogger> {
        self.logger.as_ref()
    }

    pub fn session_id(&self) -> &str {
        &self.metadata.session_id
    }

    pub fn metadata(&self) -> &MemoryMetadata {
        &self.metadata
    }

    pub fn memory_path(&self) -> &Path {
        &self.memory_path
    }

    pub fn summary(&self) -> MemorySummary {
        let count = |role: Role| self.messages.iter().filter(|m| m.role == role).count();
        MemorySummary {
            session_id: self.metadata.session_id.clone(),
            created_at: self.metadata.created_at,
            last_updated: self.metadata.last_updated,
            total_messages: self.messages.len(),
            user_messages: count(Role::User),
            assistant_messages: count(Role::Assistant),
        }
    }

    fn touch(&mut self, at: DateTime<Utc>) {
        self.metadata.last_updated = self.metadata.last_updated.max(at);
    }

    /// Overwrite the snapshot via a temp file + rename
    fn flush(&mut self) -> SessionResult<()> {
        let path = &self.memory_path;
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        let snapshot = Snapshot {
            metadata: self.metadata.clone(),
            messages: self.messages.clone(),
        };
        let json = serde_json::to_vec_pretty(&snapshot)
            .map_err(|e| SessionError::persistence(path, e.into()))?;

        let mut tmp = tempfile::NamedTempFile::new_in(dir)
            .map_err(|e| SessionError::persistence(path, e))?;
        tmp.write_all(&json)
            .and_then(|_| tmp.flush())
            .map_err(|e| SessionError::persistence(path, e))?;
        tmp.persist(path)
            .map_err(|e| SessionError::persistence(path, e.error))?;

        self.fingerprint = Fingerprint::of(path);
        Ok(())
    }
}

fn read_snapshot(path: &Path) -> SessionResult<Snapshot> {
    let content = fs::read_to_string(path).map_err(|e| SessionError::corrupt(path, None, e.to_string()))?;
    serde_json::from_str(&content).map_err(|e| SessionError::corrupt(path, None, e.to_string()))
}
