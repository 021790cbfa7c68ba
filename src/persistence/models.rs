use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// Who produced a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }

    /// Label used when printing transcripts
    pub fn label(&self) -> &'static str {
        match self {
            Role::User => "👤 User",
            Role::Assistant => "🤖 Assistant",
            Role::System => "⚙️  System",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One turn of a conversation. Never mutated after it is appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
            metadata: serde_json::Map::new(),
        }
    }

    pub fn with_metadata(mut self, metadata: serde_json::Map<String, serde_json::Value>) -> Self {
        self.metadata = metadata;
        self
    }

    /// Content cut to `max_chars` characters with a trailing ellipsis
    pub fn preview(&self, max_chars: usize) -> String {
        let mut chars = self.content.chars();
        let head: String = chars.by_ref().take(max_chars).collect();
        if chars.next().is_some() {
            format!("{}...", head)
        } else {
            head
        }
    }
}

/// Lightweight projection of a session log used for listing and search.
///
/// Always recomputable from the log file; never authoritative.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub file_name: String,
    pub path: PathBuf,
    /// Raw creation stamp as embedded in the file name
    pub timestamp: String,
    pub created_at: DateTime<Utc>,
    pub user: String,
    /// Timestamp of the first event in the log, if it had one
    pub started_at: Option<DateTime<Utc>>,
    /// Latest timestamp seen in the log; never earlier than `created_at`
    pub last_activity: DateTime<Utc>,
    pub user_messages: usize,
    pub assistant_messages: usize,
    pub total_interactions: usize,
    pub last_message_preview: String,
}

/// A historical session reconstructed from its event log
#[derive(Debug, Clone)]
pub struct LoadedSession {
    pub summary: SessionSummary,
    /// Every parseable event, including bookkeeping ones
    pub events: Vec<serde_json::Value>,
    /// Only the user/assistant turns, in log order
    pub messages: Vec<Message>,
    pub loaded_at: DateTime<Utc>,
}

impl LoadedSession {
    pub fn message_count(&self) -> usize {
        self.messages.len()
    }
}

/// Aggregate numbers over every stored session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionStatistics {
    pub total_sessions: usize,
    pub total_messages: usize,
    pub users: BTreeMap<String, usize>,
    pub average_messages_per_session: f64,
}

impl SessionStatistics {
    pub fn format(&self) -> String {
        let mut output = String::new();
        output.push_str("📊 Session Statistics\n");
        output.push_str("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n\n");
        output.push_str(&format!("🗂️  Sessions: {}\n", self.total_sessions));
        output.push_str(&format!("💬 Messages: {}\n", self.total_messages));
        output.push_str(&format!(
            "📈 Average per session: {:.1}\n\n",
            self.average_messages_per_session
        ));

        if !self.users.is_empty() {
            output.push_str("👤 Sessions per user:\n");
            for (user, count) in &self.users {
                output.push_str(&format!("   {:<15} {}\n", user, count));
            }
        }

        output
    }
}

/// Result of a best-effort delete across the log and memory directories
#[derive(Debug, Default)]
pub struct DeleteReport {
    pub removed: Vec<PathBuf>,
    pub failed: Vec<(PathBuf, String)>,
}

impl DeleteReport {
    /// True when at least one file was actually removed
    pub fn deleted(&self) -> bool {
        !self.removed.is_empty()
    }
}

/// Parse the timestamp formats found in session files.
///
/// Accepts RFC 3339 (what this crate writes) and naive ISO-8601 without an
/// offset (older logs), the latter read as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Serde adapter for timestamps written by either format `parse_timestamp` accepts
pub(crate) fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {}", raw)))
}
