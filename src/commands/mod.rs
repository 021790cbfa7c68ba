mod parser;
mod shell;
mod slash;

pub use parser::{CommandParser, ParsedCommand};
pub use shell::ShellPassthrough;
pub use slash::SlashCommand;

use anyhow::Result;

use crate::approval::{ApprovalGate, Confirmer};
use crate::persistence::{ConversationMemory, Role};
use crate::session::SessionManager;
use crate::tools::ToolRunner;

/// Command execution result
#[derive(Debug, Clone, PartialEq)]
pub enum CommandResult {
    /// Continue the session normally
    Continue,
    /// Display a message to the user
    Message(String),
    /// Exit the session
    Exit,
}

/// Everything a shell command can act on
pub struct ShellState {
    pub manager: SessionManager,
    pub memory: ConversationMemory,
    pub gate: ApprovalGate,
    pub runner: ToolRunner,
    pub confirmer: Box<dyn Confirmer>,
    pub user: String,
}

impl ShellState {
    /// Start a new session for `user`
    pub fn start(
        manager: SessionManager,
        gate: ApprovalGate,
        runner: ToolRunner,
        confirmer: Box<dyn Confirmer>,
        user: &str,
    ) -> Result<Self> {
        let memory = manager.start(user)?;
        Ok(Self {
            manager,
            memory,
            gate,
            runner,
            confirmer,
            user: user.to_string(),
        })
    }

    pub fn session_id(&self) -> &str {
        self.memory.session_id()
    }
}

/// Execute a parsed command
pub async fn execute_command(cmd: ParsedCommand, state: &mut ShellState) -> Result<CommandResult> {
    match cmd {
        ParsedCommand::Slash(slash_cmd) => slash::execute_slash_command(slash_cmd, state),
        ParsedCommand::ShellPassthrough(shell_cmd) => {
            shell::execute_shell_command(shell_cmd, state).await
        }
        ParsedCommand::Regular(text) => {
            if text.trim().is_empty() {
                return Ok(CommandResult::Continue);
            }
            state.memory.add_message(Role::User, text.trim(), None)?;
            Ok(CommandResult::Message(
                "📝 Noted. Run a tool with !<command> or type /help.".to_string(),
            ))
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::approval::ScriptedConfirmer;
    use crate::config::{ApprovalConfig, StorageConfig, ToolConfig};
    use crate::permissions::PermissionManager;
    use std::path::Path;

    pub fn state(root: &Path, answers: Vec<&str>) -> ShellState {
        let storage = StorageConfig::default().rooted_at(root);
        let manager = SessionManager::new(storage, Box::new(PermissionManager::default()));
        ShellState::start(
            manager,
            ApprovalGate::new(ApprovalConfig::default()),
            ToolRunner::new(ToolConfig::default(), root),
            Box::new(ScriptedConfirmer::new(answers)),
            "tester",
        )
        .unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_regular_text_is_recorded_as_user_message() {
        let dir = tempdir().unwrap();
        let mut state = test_support::state(dir.path(), vec![]);

        let result = execute_command(CommandParser::parse("check google.com"), &mut state)
            .await
            .unwrap();
        assert!(matches!(result, CommandResult::Message(_)));
        assert_eq!(state.memory.len(), 1);
        assert_eq!(state.memory.all()[0].content, "check google.com");

        let result = execute_command(CommandParser::parse("   "), &mut state)
            .await
            .unwrap();
        assert_eq!(result, CommandResult::Continue);
        assert_eq!(state.memory.len(), 1);
    }
}
