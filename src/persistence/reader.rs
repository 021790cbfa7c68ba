//! Read side of the session store: discovers session logs, summarizes them
//! and reconstructs transcripts. Never writes, except for explicit deletes.
//!
//! Any log may be mid-write when it is read, so every line is parsed on its
//! own and unparseable lines are skipped. One bad file never hides the others.

use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use super::models::{parse_timestamp, DeleteReport, LoadedSession, Message, Role, SessionSummary};
use super::naming::{
    LogFileName, SessionManifest, LOG_EXTENSION, LOG_PREFIX, MANIFEST_SUFFIX, MEMORY_SUFFIX,
};
use crate::error::{SessionError, SessionResult};

pub const DEFAULT_PREVIEW_CHARS: usize = 100;
pub const DEFAULT_SEARCH_WINDOW: usize = 100;

/// A log file that passed name parsing
#[derive(Debug, Clone)]
struct Candidate {
    name: LogFileName,
    file_name: String,
    path: PathBuf,
}

/// Index over the session logs and memory snapshots on disk
#[derive(Debug, Clone)]
pub struct SessionIndex {
    logs_dir: PathBuf,
    memory_dir: PathBuf,
    preview_chars: usize,
    search_window: usize,
}

impl SessionIndex {
    pub fn new(logs_dir: impl Into<PathBuf>, memory_dir: impl Into<PathBuf>) -> Self {
        Self {
            logs_dir: logs_dir.into(),
            memory_dir: memory_dir.into(),
            preview_chars: DEFAULT_PREVIEW_CHARS,
            search_window: DEFAULT_SEARCH_WINDOW,
        }
    }

    pub fn with_preview_chars(mut self, preview_chars: usize) -> Self {
        self.preview_chars = preview_chars;
        self
    }

    pub fn with_search_window(mut self, search_window: usize) -> Self {
        self.search_window = search_window;
        self
    }

    pub fn logs_dir(&self) -> &Path {
        &self.logs_dir
    }

    pub fn memory_dir(&self) -> &Path {
        &self.memory_dir
    }

    /// Most recent sessions first, at most `limit` of them
    pub fn list_sessions(&self, limit: usize) -> Vec<SessionSummary> {
        let mut sessions = Vec::new();

        for candidate in self.candidates() {
            if sessions.len() >= limit {
                break;
            }
            match self.read_events(&candidate.path, true) {
                Ok(events) => sessions.push(self.summarize(&candidate, &events)),
                Err(e) => tracing::warn!("Skipping session log: {}", e),
            }
        }

        sessions
    }

    /// Reconstruct the first session whose log file name contains `needle`.
    ///
    /// Returns `Ok(None)` when nothing matches and an error only when the
    /// matching file cannot be read at all.
    pub fn load_session(&self, needle: &str) -> SessionResult<Option<LoadedSession>> {
        let needle = needle.trim();
        if needle.is_empty() {
            return Ok(None);
        }

        let Some(candidate) = self
            .candidates()
            .into_iter()
            .find(|c| c.file_name.contains(needle))
        else {
            return Ok(None);
        };

        let events = self.read_events(&candidate.path, false)?;
        let summary = self.summarize(&candidate, &events);

        let mut messages: Vec<Message> = Vec::new();
        for event in &events {
            let role = match event.get("event").and_then(|v| v.as_str()) {
                Some("user_message") => Role::User,
                Some("assistant_message") => Role::Assistant,
                _ => continue,
            };
            let timestamp = event_timestamp(event)
                .or_else(|| messages.last().map(|m| m.timestamp))
                .unwrap_or(summary.created_at);
            let content = event
                .get("content")
                .and_then(|v| v.as_str())
                .unwrap_or_default();

            let mut message = Message::new(role, content);
            message.timestamp = timestamp;
            messages.push(message);
        }

        tracing::debug!(
            "Loaded session {} ({} events, {} messages)",
            summary.session_id,
            events.len(),
            messages.len()
        );

        Ok(Some(LoadedSession {
            summary,
            events,
            messages,
            loaded_at: Utc::now(),
        }))
    }

    /// Sessions whose last user message contains `query`, case-insensitively
    pub fn search_sessions(&self, query: &str, limit: usize) -> Vec<SessionSummary> {
        let query = query.to_lowercase();
        self.list_sessions(self.search_window.max(limit))
            .into_iter()
            .filter(|s| s.last_message_preview.to_lowercase().contains(&query))
            .take(limit)
            .collect()
    }

    /// Ids of the sessions whose files `delete_session(needle)` would touch
    pub fn matching_session_ids(&self, needle: &str) -> BTreeSet<String> {
        let mut ids = BTreeSet::new();
        let needle = needle.trim();
        if needle.is_empty() {
            return ids;
        }

        for dir in [&self.logs_dir, &self.memory_dir] {
            let Ok(entries) = fs::read_dir(dir) else {
                continue;
            };
            for entry in entries.flatten() {
                let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                    continue;
                };
                if !name.contains(needle) || !entry.path().is_file() {
                    continue;
                }
                ids.insert(session_id_of(&name));
            }
        }

        ids
    }

    /// Remove every log, manifest and memory file whose name contains
    /// `session_id`. Best-effort: failures are collected, not rolled back.
    pub fn delete_session(&self, session_id: &str) -> DeleteReport {
        let mut report = DeleteReport::default();
        let session_id = session_id.trim();
        if session_id.is_empty() {
            return report;
        }

        for dir in [&self.logs_dir, &self.memory_dir] {
            let entries = match fs::read_dir(dir) {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => {
                    report.failed.push((dir.clone(), e.to_string()));
                    continue;
                }
            };

            for entry in entries.flatten() {
                let path = entry.path();
                let matches = path.is_file()
                    && entry
                        .file_name()
                        .to_str()
                        .is_some_and(|name| name.contains(session_id));
                if !matches {
                    continue;
                }

                match fs::remove_file(&path) {
                    Ok(()) => {
                        tracing::info!("Deleted {}", path.display());
                        report.removed.push(path);
                    }
                    Err(e) => {
                        tracing::warn!("Failed to delete {}: {}", path.display(), e);
                        report.failed.push((path, e.to_string()));
                    }
                }
            }
        }

        report
    }

    /// Session log files in listing order: newest creation time first,
    /// ties broken by the raw stamp and then the session id
    fn candidates(&self) -> Vec<Candidate> {
        let entries = match fs::read_dir(&self.logs_dir) {
            Ok(entries) => entries,
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!("Cannot read {}: {}", self.logs_dir.display(), e);
                }
                return Vec::new();
            }
        };

        let prefix = format!("{}_", LOG_PREFIX);
        let suffix = format!(".{}", LOG_EXTENSION);
        let mut candidates: Vec<Candidate> = entries
            .flatten()
            .filter_map(|entry| {
                let file_name = entry.file_name().to_str()?.to_string();
                if !file_name.starts_with(&prefix) || !file_name.ends_with(&suffix) {
                    return None;
                }
                match LogFileName::parse(&file_name) {
                    Some(name) => Some(Candidate {
                        name,
                        path: entry.path(),
                        file_name,
                    }),
                    None => {
                        tracing::warn!("Skipping log with unexpected name: {}", file_name);
                        None
                    }
                }
            })
            .collect();

        candidates.sort_by(|a, b| {
            b.name
                .created_at()
                .cmp(&a.name.created_at())
                .then_with(|| b.name.timestamp.cmp(&a.name.timestamp))
                .then_with(|| b.name.session_id.cmp(&a.name.session_id))
        });
        candidates
    }

    /// Parse every line of a log independently.
    ///
    /// With `require_header`, the file must be non-empty and start with a
    /// JSON object; this is the check that lets listing skip a broken file.
    /// Without it, a bad first line is skipped like any other line.
    fn read_events(
        &self,
        path: &Path,
        require_header: bool,
    ) -> SessionResult<Vec<serde_json::Value>> {
        let bytes = fs::read(path).map_err(|e| SessionError::corrupt(path, None, e.to_string()))?;
        let content = String::from_utf8_lossy(&bytes);

        let mut events = Vec::new();
        let lines = content
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty());

        for (index, line) in lines {
            let parsed = match serde_json::from_str::<serde_json::Value>(line) {
                Ok(event) if event.is_object() => Ok(event),
                Ok(_) => Err(SessionError::corrupt(path, Some(index + 1), "not a JSON object")),
                Err(e) => Err(SessionError::corrupt(path, Some(index + 1), e.to_string())),
            };
            match parsed {
                Ok(event) => events.push(event),
                Err(e) if require_header && events.is_empty() => return Err(e),
                Err(e) => tracing::warn!("{}", e),
            }
        }

        if require_header && events.is_empty() {
            return Err(SessionError::corrupt(path, None, "empty log"));
        }

        Ok(events)
    }

    fn summarize(&self, candidate: &Candidate, events: &[serde_json::Value]) -> SessionSummary {
        let manifest = SessionManifest::read(&self.logs_dir, &candidate.name.session_id);

        let mut user_messages = 0;
        let mut assistant_messages = 0;
        let mut latest: Option<DateTime<Utc>> = None;
        let mut last_user_message = "";

        for event in events {
            match event.get("event").and_then(|v| v.as_str()) {
                Some("user_message") => {
                    user_messages += 1;
                    last_user_message = event
                        .get("content")
                        .and_then(|v| v.as_str())
                        .unwrap_or_default();
                }
                Some("assistant_message") => assistant_messages += 1,
                _ => {}
            }
            if let Some(ts) = event_timestamp(event) {
                latest = Some(latest.map_or(ts, |l| l.max(ts)));
            }
        }

        let started_at = events.first().and_then(event_timestamp);
        let created_at = manifest
            .as_ref()
            .map(|m| m.created_at)
            .or_else(|| candidate.name.created_at())
            .or(started_at)
            .or_else(|| file_modified(&candidate.path))
            .unwrap_or_else(|| DateTime::<Utc>::from(std::time::UNIX_EPOCH));

        SessionSummary {
            session_id: candidate.name.session_id.clone(),
            file_name: candidate.file_name.clone(),
            path: candidate.path.clone(),
            timestamp: candidate.name.timestamp.clone(),
            created_at,
            user: manifest
                .map(|m| m.user)
                .unwrap_or_else(|| candidate.name.user.clone()),
            started_at,
            last_activity: latest.map_or(created_at, |l| l.max(created_at)),
            user_messages,
            assistant_messages,
            total_interactions: user_messages + assistant_messages,
            last_message_preview: last_user_message.chars().take(self.preview_chars).collect(),
        }
    }
}

/// Session id a stored file belongs to; unrecognized names stand for themselves
fn session_id_of(file_name: &str) -> String {
    if let Some(name) = LogFileName::parse(file_name) {
        return name.session_id;
    }
    file_name
        .strip_suffix(MANIFEST_SUFFIX)
        .or_else(|| file_name.strip_suffix(MEMORY_SUFFIX))
        .unwrap_or(file_name)
        .to_string()
}

fn event_timestamp(event: &serde_json::Value) -> Option<DateTime<Utc>> {
    event
        .get("timestamp")
        .and_then(|v| v.as_str())
        .and_then(parse_timestamp)
}

fn file_modified(path: &Path) -> Option<DateTime<Utc>> {
    fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .map(DateTime::<Utc>::from)
}
