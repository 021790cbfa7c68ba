use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::persistence::SessionIndex;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub approval: ApprovalConfig,
    #[serde(default)]
    pub tools: ToolConfig,
    #[serde(default)]
    pub permissions: PermissionConfig,
}

/// Where session artifacts live and how much of them listing reads
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory of per-session JSONL event logs (default: logs)
    #[serde(default = "default_logs_dir")]
    pub logs_dir: PathBuf,

    /// Directory of per-session memory snapshots (default: memory)
    #[serde(default = "default_memory_dir")]
    pub memory_dir: PathBuf,

    /// Characters kept in the last-message preview (default: 100)
    #[serde(default = "default_preview_chars")]
    pub preview_chars: usize,

    /// Sessions scanned by a search before filtering (default: 100)
    #[serde(default = "default_search_window")]
    pub search_window: usize,

    /// Sessions scanned when computing statistics (default: 1000)
    #[serde(default = "default_stats_window")]
    pub stats_window: usize,
}

fn default_logs_dir() -> PathBuf {
    PathBuf::from("logs")
}

fn default_memory_dir() -> PathBuf {
    PathBuf::from("memory")
}

fn default_preview_chars() -> usize {
    100
}

fn default_search_window() -> usize {
    100
}

fn default_stats_window() -> usize {
    1000
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            logs_dir: default_logs_dir(),
            memory_dir: default_memory_dir(),
            preview_chars: default_preview_chars(),
            search_window: default_search_window(),
            stats_window: default_stats_window(),
        }
    }
}

impl StorageConfig {
    /// Session index over the configured directories
    pub fn index(&self) -> SessionIndex {
        SessionIndex::new(&self.logs_dir, &self.memory_dir)
            .with_preview_chars(self.preview_chars)
            .with_search_window(self.search_window)
    }

    /// Resolve relative directories against `base`
    pub fn rooted_at(mut self, base: &Path) -> Self {
        if self.logs_dir.is_relative() {
            self.logs_dir = base.join(&self.logs_dir);
        }
        if self.memory_dir.is_relative() {
            self.memory_dir = base.join(&self.memory_dir);
        }
        self
    }
}

/// Which actions need an explicit yes from the operator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalConfig {
    /// Ask before sensitive actions (default: true)
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Words that mark a command as sensitive (case-insensitive substring)
    #[serde(default = "default_sensitive_keywords")]
    pub sensitive_keywords: Vec<String>,

    /// Tool names that always need confirmation
    #[serde(default = "default_sensitive_tools")]
    pub sensitive_tools: Vec<String>,
}

fn default_sensitive_keywords() -> Vec<String> {
    [
        "nmap",
        "tcpdump",
        "wireshark",
        "metasploit",
        "exploit",
        "attack",
        "scan",
        "penetration",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_sensitive_tools() -> Vec<String> {
    ["nmap_scan_tool", "network_sniffer_tool", "exploit_tool"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Default for ApprovalConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sensitive_keywords: default_sensitive_keywords(),
            sensitive_tools: default_sensitive_tools(),
        }
    }
}

/// Configuration for external tool execution limits and behavior
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolConfig {
    /// Timeout for external commands in seconds (default: 120)
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Maximum output size in bytes before truncation (default: 1MB)
    #[serde(default = "default_max_output_bytes")]
    pub max_output_bytes: usize,

    /// Command patterns that are refused outright (regexes)
    #[serde(default = "default_blocked_patterns")]
    pub blocked_patterns: Vec<String>,
}

fn default_timeout() -> u64 {
    120
}

fn default_max_output_bytes() -> usize {
    1_048_576 // 1MB
}

fn default_blocked_patterns() -> Vec<String> {
    vec![
        r"rm\s+-rf\s+/".to_string(),
        r"rm\s+-rf\s+~".to_string(),
        r":()\s*\{\s*:\|\:&\s*\}".to_string(), // Fork bomb
        r"dd\s+if=.*of=/dev/".to_string(),
        r"mkfs\.".to_string(),
    ]
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout(),
            max_output_bytes: default_max_output_bytes(),
            blocked_patterns: default_blocked_patterns(),
        }
    }
}

/// Coarse capability switches consulted before an operation runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PermissionConfig {
    #[serde(default = "default_true")]
    pub allow_delete: bool,
    #[serde(default = "default_true")]
    pub allow_resume: bool,
    #[serde(default = "default_true")]
    pub allow_tool_execution: bool,
}

impl Default for PermissionConfig {
    fn default() -> Self {
        Self {
            allow_delete: true,
            allow_resume: true,
            allow_tool_execution: true,
        }
    }
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load from the default location, falling back to defaults
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file {}", config_path.display()))?;

        toml::from_str(&content).context("Failed to parse config file")
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(config_path, content)?;

        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().context("Could not determine config directory")?;
        Ok(config_dir.join("secshell").join("config.toml"))
    }
}
