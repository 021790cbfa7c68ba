//! File naming for session artifacts.
//!
//! Log files pack their metadata positionally into the name:
//!
//! ```text
//! cai_{session_id}_{YYYYMMDDTHHMMSS}_{user}[_{extra}...].jsonl
//! ```
//!
//! Older logs may carry extra trailing segments (host details); they are
//! ignored. Because the positional scheme is fragile, every log written by
//! this crate also gets a sidecar manifest, `{session_id}.manifest.json`,
//! which takes precedence over the file name when present.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{SessionError, SessionResult};

pub const LOG_PREFIX: &str = "cai";
pub const LOG_EXTENSION: &str = "jsonl";
pub const MANIFEST_SUFFIX: &str = ".manifest.json";
pub const MEMORY_SUFFIX: &str = "_memory.json";

const STAMP_FORMAT: &str = "%Y%m%dT%H%M%S";
const MIN_SEGMENTS: usize = 3;

/// Metadata recovered from a log file name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFileName {
    pub session_id: String,
    pub timestamp: String,
    pub user: String,
}

impl LogFileName {
    /// Parse a log file name. Returns `None` for anything that is not a
    /// session log or has fewer than three `_`-separated segments.
    pub fn parse(file_name: &str) -> Option<Self> {
        let stem = file_name.strip_suffix(&format!(".{}", LOG_EXTENSION))?;
        if !stem.starts_with(&format!("{}_", LOG_PREFIX)) {
            return None;
        }

        let parts: Vec<&str> = stem.split('_').collect();
        if parts.len() < MIN_SEGMENTS || parts[1].is_empty() {
            return None;
        }

        Some(Self {
            session_id: parts[1].to_string(),
            timestamp: parts[2].to_string(),
            user: parts
                .get(3)
                .filter(|u| !u.is_empty())
                .map(|u| u.to_string())
                .unwrap_or_else(|| "unknown".to_string()),
        })
    }

    /// Creation time encoded in the name, if the stamp is recognizable
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        parse_stamp(&self.timestamp)
    }
}

/// Build the log file name for a new session
pub fn log_file_name(session_id: &str, created_at: DateTime<Utc>, user: &str) -> String {
    format!(
        "{}_{}_{}_{}.{}",
        LOG_PREFIX,
        session_id,
        format_stamp(created_at),
        sanitize_segment(user),
        LOG_EXTENSION
    )
}

pub fn format_stamp(ts: DateTime<Utc>) -> String {
    ts.format(STAMP_FORMAT).to_string()
}

/// Accepts `YYYYMMDDTHHMMSS`, `YYYYMMDDHHMMSS` and bare `YYYYMMDD`
pub fn parse_stamp(stamp: &str) -> Option<DateTime<Utc>> {
    if let Ok(naive) = NaiveDateTime::parse_from_str(stamp, STAMP_FORMAT) {
        return Some(naive.and_utc());
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(stamp, "%Y%m%d%H%M%S") {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(stamp, "%Y%m%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Make a value safe to embed as one name segment
pub fn sanitize_segment(value: &str) -> String {
    let cleaned: String = value
        .trim()
        .chars()
        .map(|c| {
            if c == '_' || c == '/' || c == '\\' || c.is_whitespace() {
                '-'
            } else {
                c
            }
        })
        .collect();
    if cleaned.is_empty() {
        "unknown".to_string()
    } else {
        cleaned
    }
}

/// New session id: `YYYYMMDD-HHMMSS-xxxxxxxx`, never containing `_`
pub fn new_session_id(now: DateTime<Utc>) -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("{}-{}", now.format("%Y%m%d-%H%M%S"), &suffix[..8])
}

pub fn memory_file_name(session_id: &str) -> String {
    format!("{}{}", session_id, MEMORY_SUFFIX)
}

pub fn manifest_path(logs_dir: &Path, session_id: &str) -> PathBuf {
    logs_dir.join(format!("{}{}", session_id, MANIFEST_SUFFIX))
}

/// Sidecar index record for one session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionManifest {
    pub version: u32,
    pub session_id: String,
    pub created_at: DateTime<Utc>,
    pub user: String,
    pub log_file: String,
}

impl SessionManifest {
    pub fn new(session_id: &str, created_at: DateTime<Utc>, user: &str, log_file: &str) -> Self {
        Self {
            version: 1,
            session_id: session_id.to_string(),
            created_at,
            user: user.to_string(),
            log_file: log_file.to_string(),
        }
    }

    pub fn write(&self, logs_dir: &Path) -> SessionResult<()> {
        let path = manifest_path(logs_dir, &self.session_id);
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| SessionError::persistence(&path, e.into()))?;
        fs::write(&path, json).map_err(|e| SessionError::persistence(&path, e))
    }

    /// Read the manifest for a session. Missing or unparseable manifests
    /// yield `None`; callers then fall back to the file name.
    pub fn read(logs_dir: &Path, session_id: &str) -> Option<Self> {
        let path = manifest_path(logs_dir, session_id);
        let content = fs::read_to_string(&path).ok()?;
        match serde_json::from_str::<Self>(&content) {
            Ok(manifest) if manifest.session_id == session_id => Some(manifest),
            Ok(_) => {
                tracing::warn!("Manifest {} names a different session", path.display());
                None
            }
            Err(e) => {
                tracing::warn!("Ignoring corrupt manifest {}: {}", path.display(), e);
                None
            }
        }
    }
}
