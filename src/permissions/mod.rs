//! Capability checks consulted before the shell runs an operation.
//!
//! A check is a pure query: it never prompts, logs to the session, or
//! mutates anything. Interactive confirmation lives in `approval`.

use regex::Regex;

use crate::config::{PermissionConfig, ToolConfig};

/// Operations the shell may ask about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation<'a> {
    ListSessions,
    LoadSession(&'a str),
    ResumeSession(&'a str),
    DeleteSession(&'a str),
    ExecuteTool { tool: &'a str, command: &'a str },
}

impl Operation<'_> {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::ListSessions => "list sessions",
            Operation::LoadSession(_) => "load session",
            Operation::ResumeSession(_) => "resume session",
            Operation::DeleteSession(_) => "delete session",
            Operation::ExecuteTool { .. } => "execute tool",
        }
    }
}

/// Permission decision for an operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Permission {
    Allowed,
    Denied(String),
}

impl Permission {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Permission::Allowed)
    }
}

/// Read-only capability query
pub trait PermissionCheck: Send + Sync {
    fn check(&self, operation: &Operation<'_>) -> Permission;
}

/// Config-driven permission checks
#[derive(Debug)]
pub struct PermissionManager {
    config: PermissionConfig,
    blocked_patterns: Vec<Regex>,
}

impl PermissionManager {
    pub fn new(config: PermissionConfig, tools: &ToolConfig) -> Self {
        let blocked_patterns = tools
            .blocked_patterns
            .iter()
            .filter_map(|p| match Regex::new(p) {
                Ok(re) => Some(re),
                Err(e) => {
                    tracing::warn!("Ignoring invalid blocked pattern {:?}: {}", p, e);
                    None
                }
            })
            .collect();

        Self {
            config,
            blocked_patterns,
        }
    }

    /// Whether the process runs with root privileges
    pub fn is_root() -> bool {
        nix::unistd::geteuid().is_root()
    }

    /// One-line description of the current privilege level
    pub fn privilege_summary() -> &'static str {
        if Self::is_root() {
            "root"
        } else {
            "regular user"
        }
    }

    fn blocked_by(&self, command: &str) -> Option<&Regex> {
        self.blocked_patterns.iter().find(|re| re.is_match(command))
    }
}

impl Default for PermissionManager {
    fn default() -> Self {
        Self::new(PermissionConfig::default(), &ToolConfig::default())
    }
}

impl PermissionCheck for PermissionManager {
    fn check(&self, operation: &Operation<'_>) -> Permission {
        match operation {
            Operation::ListSessions | Operation::LoadSession(_) => Permission::Allowed,
            Operation::ResumeSession(_) if !self.config.allow_resume => {
                Permission::Denied("resuming sessions is disabled in the configuration".into())
            }
            Operation::ResumeSession(_) => Permission::Allowed,
            Operation::DeleteSession(_) if !self.config.allow_delete => {
                Permission::Denied("deleting sessions is disabled in the configuration".into())
            }
            Operation::DeleteSession(_) => Permission::Allowed,
            Operation::ExecuteTool { .. } if !self.config.allow_tool_execution => {
                Permission::Denied("tool execution is disabled in the configuration".into())
            }
            Operation::ExecuteTool { command, .. } => match self.blocked_by(command) {
                Some(re) => Permission::Denied(format!("command matches blocked pattern {}", re)),
                None => Permission::Allowed,
            },
        }
    }
}
