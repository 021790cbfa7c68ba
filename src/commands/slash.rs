use anyhow::Result;

use crate::approval::RiskLevel;
use crate::commands::{CommandResult, ShellState};
use crate::error::SessionError;
use crate::permissions::PermissionManager;
use crate::session::format_sessions_table;

const DEFAULT_LIST_LIMIT: usize = 10;
const DEFAULT_HISTORY_LIMIT: usize = 20;
const LOAD_PREVIEW_MESSAGES: usize = 5;
const LOAD_PREVIEW_CHARS: usize = 80;

/// Slash command types
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlashCommand {
    Help,
    Quit,
    Clear,
    Info,
    Stats,
    Sessions(usize),
    Load(String),
    Search(String),
    Delete(String),
    History(usize),
    Unknown(String),
}

impl SlashCommand {
    /// Parse a slash command from input
    pub fn parse(input: &str) -> Self {
        let input = input.trim_start_matches('/').trim();
        let parts: Vec<&str> = input.split_whitespace().collect();

        if parts.is_empty() {
            return SlashCommand::Unknown(String::new());
        }

        let cmd = parts[0].to_lowercase();
        let args = &parts[1..];

        match cmd.as_str() {
            "help" | "?" => SlashCommand::Help,
            "quit" | "exit" => SlashCommand::Quit,
            "clear" => SlashCommand::Clear,
            "info" => SlashCommand::Info,
            "stats" => SlashCommand::Stats,
            "sessions" => SlashCommand::Sessions(parse_limit(args, DEFAULT_LIST_LIMIT)),
            "history" => SlashCommand::History(parse_limit(args, DEFAULT_HISTORY_LIMIT)),
            "load" | "resume" => match args.first() {
                Some(id) => SlashCommand::Load(id.to_string()),
                None => SlashCommand::Unknown("load requires a session ID".to_string()),
            },
            "delete" => match args.first() {
                Some(id) => SlashCommand::Delete(id.to_string()),
                None => SlashCommand::Unknown("delete requires a session ID".to_string()),
            },
            "search" => {
                if args.is_empty() {
                    SlashCommand::Unknown("search requires a query".to_string())
                } else {
                    SlashCommand::Search(args.join(" "))
                }
            }
            _ => SlashCommand::Unknown(input.to_string()),
        }
    }
}

fn parse_limit(args: &[&str], default: usize) -> usize {
    args.first()
        .and_then(|s| s.parse().ok())
        .filter(|n| *n > 0)
        .unwrap_or(default)
}

/// Execute a slash command
pub fn execute_slash_command(cmd: SlashCommand, state: &mut ShellState) -> Result<CommandResult> {
    match cmd {
        SlashCommand::Help => Ok(CommandResult::Message(get_help_text())),
        SlashCommand::Quit => Ok(CommandResult::Exit),
        SlashCommand::Clear => {
            state.memory.clear()?;
            Ok(CommandResult::Message("✓ Conversation memory cleared".to_string()))
        }
        SlashCommand::Info => Ok(CommandResult::Message(session_info(state))),
        SlashCommand::Stats => Ok(CommandResult::Message(state.manager.statistics().format())),
        SlashCommand::Sessions(limit) => {
            let sessions = state.manager.list(limit)?;
            Ok(CommandResult::Message(format_sessions_table(&sessions)))
        }
        SlashCommand::Search(query) => {
            let sessions = state.manager.search(&query, DEFAULT_LIST_LIMIT)?;
            if sessions.is_empty() {
                return Ok(CommandResult::Message(format!(
                    "🔍 No sessions mention '{}'",
                    query
                )));
            }
            Ok(CommandResult::Message(format_sessions_table(&sessions)))
        }
        SlashCommand::Load(id) => load_session(&id, state),
        SlashCommand::Delete(id) => delete_session(&id, state),
        SlashCommand::History(limit) => Ok(CommandResult::Message(history(state, limit))),
        SlashCommand::Unknown(cmd) => Ok(CommandResult::Message(format!(
            "Unknown command: /{}. Type /help for available commands.",
            cmd
        ))),
    }
}

fn load_session(id: &str, state: &mut ShellState) -> Result<CommandResult> {
    let (memory, summary) = match state.manager.resume(id) {
        Ok(resumed) => resumed,
        Err(SessionError::NotFound { id }) => {
            return Ok(CommandResult::Message(format!("❌ Session not found: {}", id)));
        }
        Err(e) => return Err(e.into()),
    };
    state.memory = memory;

    let mut output = format!("{}\n", summary);
    let recent = state.memory.recent(LOAD_PREVIEW_MESSAGES);
    if !recent.is_empty() {
        output.push_str("\n💬 Recent messages:\n");
        for message in recent {
            output.push_str(&format!(
                "  {}: {}\n",
                message.role.label(),
                message.preview(LOAD_PREVIEW_CHARS)
            ));
        }
    }
    Ok(CommandResult::Message(output))
}

fn delete_session(id: &str, state: &mut ShellState) -> Result<CommandResult> {
    // Sessions whose files a substring delete of `id` would remove
    let matched = state.manager.index().matching_session_ids(id);
    if matched.is_empty() {
        return Ok(CommandResult::Message(format!("❌ Session not found: {}", id)));
    }
    if matched.contains(state.session_id()) {
        return Ok(CommandResult::Message(
            "❌ Cannot delete the active session".to_string(),
        ));
    }
    if matched.len() > 1 {
        let ids: Vec<&str> = matched.iter().map(String::as_str).collect();
        return Ok(CommandResult::Message(format!(
            "⚠️  '{}' matches {} sessions, use a full session ID:\n  {}",
            id,
            matched.len(),
            ids.join("\n  ")
        )));
    }

    let risks = vec!["the session log and memory snapshot are removed permanently".to_string()];
    let approved = state.gate.request_confirmation(
        state.confirmer.as_mut(),
        &mut state.memory,
        &format!("delete session {}", id),
        RiskLevel::Medium,
        &risks,
    )?;
    if !approved {
        return Ok(CommandResult::Message("Deletion cancelled.".to_string()));
    }

    match state.manager.delete(id) {
        Ok(report) => {
            let mut output = format!("🗑️  Deleted {} file(s)", report.removed.len());
            for (path, err) in &report.failed {
                output.push_str(&format!("\n⚠️  Could not delete {}: {}", path.display(), err));
            }
            Ok(CommandResult::Message(output))
        }
        Err(SessionError::NotFound { id }) => {
            Ok(CommandResult::Message(format!("❌ Session not found: {}", id)))
        }
        Err(e) => Err(e.into()),
    }
}

fn history(state: &ShellState, limit: usize) -> String {
    let recent = state.memory.recent(limit);
    if recent.is_empty() {
        return "📭 No messages in this session yet".to_string();
    }

    let mut output = format!("📜 Last {} message(s):\n", recent.len());
    for message in recent {
        output.push_str(&format!(
            "\n[{}] {}\n{}\n",
            message.timestamp.format("%H:%M:%S"),
            message.role.label(),
            message.content
        ));
    }
    output
}

fn session_info(state: &ShellState) -> String {
    let summary = state.memory.summary();
    format!(
        "📋 Session: {}\n👤 User: {}\n🔐 Privileges: {}\n📅 Created: {}\n📝 Last updated: {}\n💬 Messages: {} ({} user, {} assistant)\n📁 Log: {}\n🧠 Memory: {}",
        summary.session_id,
        state.user,
        PermissionManager::privilege_summary(),
        summary.created_at.format("%Y-%m-%d %H:%M:%S"),
        summary.last_updated.format("%Y-%m-%d %H:%M:%S"),
        summary.total_messages,
        summary.user_messages,
        summary.assistant_messages,
        state
            .memory
            .logger()
            .map(|l| l.log_path().display().to_string())
            .unwrap_or_else(|| "-".to_string()),
        state.memory.memory_path().display(),
    )
}

fn get_help_text() -> String {
    r#"secshell - Available Commands

SESSIONS
  /sessions [n]       List the n most recent sessions (default 10)
  /search <text>      Find sessions whose last request mentions <text>
  /load <id>          Resume a session (id or any part of it)
  /delete <id>        Delete a session's log and memory
  /stats              Statistics over saved sessions

CURRENT SESSION
  /history [n]        Show the last n messages (default 20)
  /info               Show session details
  /clear              Clear the conversation memory

TOOLS
  !<command>          Run a command; scans and captures ask for confirmation

OTHER
  /help, /?           Show this help message
  /quit, /exit        Exit the shell
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support;
    use crate::persistence::Role;
    use tempfile::tempdir;

    fn message(result: CommandResult) -> String {
        match result {
            CommandResult::Message(m) => m,
            other => panic!("expected message, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(SlashCommand::parse("/HELP"), SlashCommand::Help);
        assert_eq!(SlashCommand::parse("/sessions"), SlashCommand::Sessions(10));
        assert_eq!(SlashCommand::parse("/sessions 3"), SlashCommand::Sessions(3));
        assert_eq!(SlashCommand::parse("/history x"), SlashCommand::History(20));
        assert_eq!(
            SlashCommand::parse("/search google .com"),
            SlashCommand::Search("google .com".to_string())
        );
        assert_eq!(
            SlashCommand::parse("/load 20240101"),
            SlashCommand::Load("20240101".to_string())
        );
        assert!(matches!(SlashCommand::parse("/delete"), SlashCommand::Unknown(_)));
        assert!(matches!(SlashCommand::parse("/frobnicate"), SlashCommand::Unknown(_)));
    }

    #[test]
    fn test_load_switches_active_session() {
        let dir = tempdir().unwrap();
        let mut state = test_support::state(dir.path(), vec![]);
        let first = state.session_id().to_string();
        let long = "x".repeat(200);
        state.memory.add_message(Role::User, long.as_str(), None).unwrap();

        state.memory = state.manager.start("tester").unwrap();
        assert_ne!(state.session_id(), first);

        let output = message(
            execute_slash_command(SlashCommand::Load(first.clone()), &mut state).unwrap(),
        );
        assert_eq!(state.session_id(), first);
        assert!(output.contains("1 messages"));
        assert!(output.contains(&format!("{}...", "x".repeat(80))));
    }

    #[test]
    fn test_load_unknown_reports_not_found() {
        let dir = tempdir().unwrap();
        let mut state = test_support::state(dir.path(), vec![]);
        let output = message(
            execute_slash_command(SlashCommand::Load("nope".to_string()), &mut state).unwrap(),
        );
        assert!(output.contains("not found"));
    }

    #[test]
    fn test_delete_requires_confirmation() {
        let dir = tempdir().unwrap();
        let mut state = test_support::state(dir.path(), vec!["n", "y"]);
        let old = state.session_id().to_string();
        state.memory = state.manager.start("tester").unwrap();

        let output = message(
            execute_slash_command(SlashCommand::Delete(old.clone()), &mut state).unwrap(),
        );
        assert!(output.contains("cancelled"));
        assert_eq!(state.manager.list(10).unwrap().len(), 2);

        let output = message(
            execute_slash_command(SlashCommand::Delete(old), &mut state).unwrap(),
        );
        assert!(output.contains("Deleted"));
        assert_eq!(state.manager.list(10).unwrap().len(), 1);
    }

    #[test]
    fn test_cannot_delete_active_session() {
        let dir = tempdir().unwrap();
        let mut state = test_support::state(dir.path(), vec!["y"]);
        let active = state.session_id().to_string();
        let output = message(
            execute_slash_command(SlashCommand::Delete(active), &mut state).unwrap(),
        );
        assert!(output.contains("active session"));
        assert_eq!(state.manager.list(10).unwrap().len(), 1);
    }

    #[test]
    fn test_delete_fragment_matching_active_session_is_refused() {
        let dir = tempdir().unwrap();
        let mut state = test_support::state(dir.path(), vec!["y"]);
        state.memory.add_message(Role::User, "whois google.com", None).unwrap();
        let log = state.memory.logger().unwrap().log_path().to_path_buf();

        let output = message(
            execute_slash_command(SlashCommand::Delete("cai".to_string()), &mut state).unwrap(),
        );
        assert!(output.contains("active session"));
        assert!(log.exists());
        assert_eq!(state.manager.list(10).unwrap().len(), 1);
    }

    #[test]
    fn test_delete_ambiguous_fragment_asks_for_full_id() {
        let dir = tempdir().unwrap();
        let mut state = test_support::state(dir.path(), vec!["y"]);
        state.manager.start("tester").unwrap();
        state.manager.start("tester").unwrap();
        state.memory = state.manager.start("operator").unwrap();

        let output = message(
            execute_slash_command(SlashCommand::Delete("tester".to_string()), &mut state)
                .unwrap(),
        );
        assert!(output.contains("matches 3 sessions"));
        assert_eq!(state.manager.list(10).unwrap().len(), 4);
    }

    #[test]
    fn test_history_and_clear() {
        let dir = tempdir().unwrap();
        let mut state = test_support::state(dir.path(), vec![]);
        assert!(message(execute_slash_command(SlashCommand::History(5), &mut state).unwrap())
            .contains("No messages"));

        state.memory.add_message(Role::User, "ping 8.8.8.8", None).unwrap();
        state.memory.add_message(Role::Assistant, "reachable", None).unwrap();
        let output = message(execute_slash_command(SlashCommand::History(1), &mut state).unwrap());
        assert!(output.contains("reachable"));
        assert!(!output.contains("ping 8.8.8.8"));

        execute_slash_command(SlashCommand::Clear, &mut state).unwrap();
        assert!(state.memory.is_empty());
    }

    #[test]
    fn test_quit_exits() {
        let dir = tempdir().unwrap();
        let mut state = test_support::state(dir.path(), vec![]);
        assert_eq!(
            execute_slash_command(SlashCommand::Quit, &mut state).unwrap(),
            CommandResult::Exit
        );
    }
}
